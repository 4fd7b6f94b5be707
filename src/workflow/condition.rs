use crate::ast::Value;
use crate::workflow::VariableType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A structured decision condition: `{input_id, comparator, value, value2?}`.
///
/// The comparator is kept as written so that an unknown name surfaces as an
/// evaluation error at the node rather than failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(alias = "inputId")]
    pub input_id: String,
    pub comparator: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<Value>,
}

/// The comparator families, one per declared variable type group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparatorFamily {
    Numeric,
    Boolean,
    String,
    Enum,
    Date,
}

impl ComparatorFamily {
    pub fn for_type(var_type: VariableType) -> Self {
        match var_type {
            VariableType::Int | VariableType::Float => ComparatorFamily::Numeric,
            VariableType::Bool => ComparatorFamily::Boolean,
            VariableType::String => ComparatorFamily::String,
            VariableType::Enum => ComparatorFamily::Enum,
            VariableType::Date => ComparatorFamily::Date,
        }
    }

    pub fn comparators(&self) -> &'static [Comparator] {
        use Comparator::*;
        match self {
            ComparatorFamily::Numeric => &[Eq, Neq, Lt, Lte, Gt, Gte, WithinRange],
            ComparatorFamily::Boolean => &[IsTrue, IsFalse],
            ComparatorFamily::String => &[StrEq, StrNeq, StrContains, StrStartsWith, StrEndsWith],
            ComparatorFamily::Enum => &[
                EnumEq,
                EnumNeq,
                EnumContains,
                EnumStartsWith,
                EnumEndsWith,
            ],
            ComparatorFamily::Date => &[DateEq, DateBefore, DateAfter, DateBetween],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    WithinRange,
    IsTrue,
    IsFalse,
    StrEq,
    StrNeq,
    StrContains,
    StrStartsWith,
    StrEndsWith,
    EnumEq,
    EnumNeq,
    EnumContains,
    EnumStartsWith,
    EnumEndsWith,
    DateEq,
    DateBefore,
    DateAfter,
    DateBetween,
}

/// Text operation shared by the string and enum families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
}

const ALL_COMPARATORS: [Comparator; 23] = {
    use Comparator::*;
    [
        Eq,
        Neq,
        Lt,
        Lte,
        Gt,
        Gte,
        WithinRange,
        IsTrue,
        IsFalse,
        StrEq,
        StrNeq,
        StrContains,
        StrStartsWith,
        StrEndsWith,
        EnumEq,
        EnumNeq,
        EnumContains,
        EnumStartsWith,
        EnumEndsWith,
        DateEq,
        DateBefore,
        DateAfter,
        DateBetween,
    ]
};

impl Comparator {
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        ALL_COMPARATORS
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Neq => "neq",
            Comparator::Lt => "lt",
            Comparator::Lte => "lte",
            Comparator::Gt => "gt",
            Comparator::Gte => "gte",
            Comparator::WithinRange => "within_range",
            Comparator::IsTrue => "is_true",
            Comparator::IsFalse => "is_false",
            Comparator::StrEq => "str_eq",
            Comparator::StrNeq => "str_neq",
            Comparator::StrContains => "str_contains",
            Comparator::StrStartsWith => "str_starts_with",
            Comparator::StrEndsWith => "str_ends_with",
            Comparator::EnumEq => "enum_eq",
            Comparator::EnumNeq => "enum_neq",
            Comparator::EnumContains => "enum_contains",
            Comparator::EnumStartsWith => "enum_starts_with",
            Comparator::EnumEndsWith => "enum_ends_with",
            Comparator::DateEq => "date_eq",
            Comparator::DateBefore => "date_before",
            Comparator::DateAfter => "date_after",
            Comparator::DateBetween => "date_between",
        }
    }

    pub fn family(&self) -> ComparatorFamily {
        use Comparator::*;
        match self {
            Eq | Neq | Lt | Lte | Gt | Gte | WithinRange => ComparatorFamily::Numeric,
            IsTrue | IsFalse => ComparatorFamily::Boolean,
            StrEq | StrNeq | StrContains | StrStartsWith | StrEndsWith => ComparatorFamily::String,
            EnumEq | EnumNeq | EnumContains | EnumStartsWith | EnumEndsWith => {
                ComparatorFamily::Enum
            }
            DateEq | DateBefore | DateAfter | DateBetween => ComparatorFamily::Date,
        }
    }

    /// Range comparators read both `value` and `value2`.
    pub fn needs_second_value(&self) -> bool {
        matches!(self, Comparator::WithinRange | Comparator::DateBetween)
    }

    pub fn text_match(&self) -> Option<TextMatch> {
        use Comparator::*;
        match self {
            StrEq | EnumEq => Some(TextMatch::Equals),
            StrNeq | EnumNeq => Some(TextMatch::NotEquals),
            StrContains | EnumContains => Some(TextMatch::Contains),
            StrStartsWith | EnumStartsWith => Some(TextMatch::StartsWith),
            StrEndsWith | EnumEndsWith => Some(TextMatch::EndsWith),
            _ => None,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
