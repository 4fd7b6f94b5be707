use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([^{}]+)\}").unwrap();
}

/// A piece of an output template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// Placeholder name with surrounding whitespace trimmed.
    Placeholder(&'a str),
}

/// Splits a template such as `"BMI is {bmi}"` into text and placeholder segments.
pub fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut result = Vec::new();
    let mut last = 0;
    for captures in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            result.push(Segment::Text(&template[last..whole.start()]));
        }
        result.push(Segment::Placeholder(name.as_str().trim()));
        last = whole.end();
    }
    if last < template.len() {
        result.push(Segment::Text(&template[last..]));
    }
    result
}

pub fn placeholders(template: &str) -> Vec<&str> {
    segments(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            Segment::Text(_) => None,
        })
        .collect()
}

/// The placeholder name when the whole template is exactly one `{name}`.
pub fn single_placeholder(template: &str) -> Option<&str> {
    match segments(template.trim()).as_slice() {
        [Segment::Placeholder(name)] => Some(*name),
        _ => None,
    }
}

/// Fills placeholders through `lookup`; unresolved ones are kept verbatim.
pub fn render<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    segments(template)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text.to_string(),
            Segment::Placeholder(name) => lookup(name).unwrap_or_else(|| format!("{{{}}}", name)),
        })
        .collect()
}
