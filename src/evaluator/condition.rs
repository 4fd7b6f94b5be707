use crate::ast::Value;
use crate::error::EvaluationError;
use crate::workflow::{Comparator, ComparatorFamily, Condition, TextMatch};
use ahash::AHashMap;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Evaluates a structured condition against an id-keyed context.
///
/// The result depends only on `context[input_id]` and the values carried by
/// the condition itself.
pub fn evaluate_condition(
    condition: &Condition,
    context: &AHashMap<String, Value>,
) -> Result<bool, EvaluationError> {
    let actual = context
        .get(&condition.input_id)
        .ok_or_else(|| EvaluationError::VariableNotFound(condition.input_id.clone()))?;
    let comparator = Comparator::parse(&condition.comparator)
        .ok_or_else(|| EvaluationError::UnknownComparator(condition.comparator.clone()))?;

    let second = || {
        condition
            .value2
            .as_ref()
            .filter(|value| !value.is_null())
            .ok_or_else(|| EvaluationError::MissingSecondValue(comparator.as_str().to_string()))
    };

    match comparator.family() {
        ComparatorFamily::Numeric => {
            let x = expect_number(comparator, actual)?;
            let v1 = expect_number(comparator, &condition.value)?;
            Ok(match comparator {
                Comparator::Eq => x == v1,
                Comparator::Neq => x != v1,
                Comparator::Lt => x < v1,
                Comparator::Lte => x <= v1,
                Comparator::Gt => x > v1,
                Comparator::Gte => x >= v1,
                _ => {
                    let v2 = expect_number(comparator, second()?)?;
                    v1 <= x && x <= v2
                }
            })
        }
        ComparatorFamily::Boolean => {
            let flag = actual.as_bool().ok_or_else(|| EvaluationError::TypeMismatch {
                operation: comparator.as_str().to_string(),
                expected: "a boolean".to_string(),
                found: actual.clone(),
            })?;
            Ok(match comparator {
                Comparator::IsTrue => flag,
                _ => !flag,
            })
        }
        ComparatorFamily::String | ComparatorFamily::Enum => {
            let haystack = as_text(actual).to_lowercase();
            let needle = as_text(&condition.value).to_lowercase();
            Ok(match comparator.text_match() {
                Some(TextMatch::Equals) => haystack == needle,
                Some(TextMatch::NotEquals) => haystack != needle,
                Some(TextMatch::Contains) => haystack.contains(&needle),
                Some(TextMatch::StartsWith) => haystack.starts_with(&needle),
                Some(TextMatch::EndsWith) => haystack.ends_with(&needle),
                None => false,
            })
        }
        ComparatorFamily::Date => {
            let x = parse_date_value(actual)?;
            let v1 = parse_date_value(&condition.value)?;
            Ok(match comparator {
                Comparator::DateEq => x == v1,
                Comparator::DateBefore => x < v1,
                Comparator::DateAfter => x > v1,
                _ => {
                    let v2 = parse_date_value(second()?)?;
                    v1 <= x && x <= v2
                }
            })
        }
    }
}

fn expect_number(comparator: Comparator, value: &Value) -> Result<f64, EvaluationError> {
    match value {
        Value::Bool(_) => Err(EvaluationError::BooleanInNumericComparison {
            comparator: comparator.as_str().to_string(),
            found: value.clone(),
        }),
        other => other.as_f64().ok_or_else(|| EvaluationError::TypeMismatch {
            operation: comparator.as_str().to_string(),
            expected: "a number".to_string(),
            found: other.clone(),
        }),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_date_value(value: &Value) -> Result<NaiveDateTime, EvaluationError> {
    match value {
        Value::String(s) => parse_date(s),
        other => Err(EvaluationError::InvalidDate(other.to_string())),
    }
}

/// Parses an ISO-8601 date or date-time. Offsets are normalised to UTC.
pub fn parse_date(text: &str) -> Result<NaiveDateTime, EvaluationError> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| EvaluationError::InvalidDate(text.to_string()))
}
