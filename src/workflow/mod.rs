//! The workflow data model: the lenient wire document, the typed definition
//! it converts into, and the graph helpers shared by the validator, the
//! interpreter and the source compiler.

pub mod branch;
pub mod condition;
pub mod conversion;
pub mod definition;
pub mod document;
pub mod graph;
pub mod operators;
pub mod template;

pub use branch::*;
pub use condition::*;
pub use conversion::*;
pub use definition::*;
pub use document::*;
pub use graph::*;
pub use operators::*;

/// Lower-cases `text`, maps runs of non-alphanumerics to a single `_` and trims them from both ends.
///
/// `"Body Mass Index"` becomes `body_mass_index`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}
