use ahash::AHashSet;

const PYTHON_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "match", "case", "nonlocal", "not", "or", "pass", "raise",
    "return", "try", "while", "with", "yield",
];

/// Builtins and imported modules the generated code relies on.
const RESERVED: &[&str] = &[
    "abs", "bool", "dict", "float", "int", "len", "list", "max", "min", "object", "print",
    "range", "round", "set", "str", "sum", "type", "math", "json", "statistics", "datetime",
];

/// Turns arbitrary text into a lower-case Python identifier.
///
/// `"Body Mass Index"` becomes `body_mass_index`, `"2nd dose"` becomes
/// `v_2nd_dose` and `"class"` becomes `class_`.
pub fn to_identifier(text: &str) -> String {
    let mut ident = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            ident.push(ch.to_ascii_lowercase());
        } else if !ident.is_empty() && !ident.ends_with('_') {
            ident.push('_');
        }
    }
    while ident.ends_with('_') {
        ident.pop();
    }

    if ident.is_empty() {
        return "value".to_string();
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert_str(0, "v_");
    }
    if PYTHON_KEYWORDS.contains(&ident.as_str()) || RESERVED.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// Hands out identifiers that are unique within one Python scope.
#[derive(Debug, Default)]
pub(super) struct NameTable {
    used: AHashSet<String>,
}

impl NameTable {
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    /// An identifier for `text`; clashes get `_2`, `_3`, ... appended.
    pub fn claim(&mut self, text: &str) -> String {
        self.claim_identifier(to_identifier(text))
    }

    pub fn claim_identifier(&mut self, base: String) -> String {
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
