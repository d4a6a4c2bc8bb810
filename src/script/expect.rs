//! Assertion matchers for the `pm.expect` chain.
//!
//! Each matcher checks the asserted value and produces a failure message in
//! the `expected <actual> to <relation> <expected>` shape. Negation flips
//! the outcome and inserts `not` into the message.

use super::value::Value;

/// Outcome of one matcher evaluation.
pub type MatchResult = Result<(), String>;

/// Applies negation to a raw matcher outcome.
fn finish(passed: bool, negated: bool, message: String) -> MatchResult {
    if passed != negated {
        Ok(())
    } else {
        Err(message)
    }
}

fn relation(negated: bool, rel: &str) -> String {
    if negated {
        format!("to not {}", rel)
    } else {
        format!("to {}", rel)
    }
}

/// `equal(expected)`: deep equality.
pub fn equal(actual: &Value, expected: &Value, negated: bool) -> MatchResult {
    finish(
        actual.equals(expected),
        negated,
        format!(
            "expected {} {} {}",
            actual.inspect_string(),
            relation(negated, "equal"),
            expected.inspect_string()
        ),
    )
}

/// `above(bound)`: strictly greater, numbers only.
pub fn above(actual: &Value, bound: &Value, negated: bool) -> MatchResult {
    let (a, b) = numeric_pair(actual, bound, "above")?;
    finish(
        a > b,
        negated,
        format!(
            "expected {} {} {}",
            actual.inspect_string(),
            relation(negated, "be above"),
            bound.inspect_string()
        ),
    )
}

/// `below(bound)`: strictly less, numbers only.
pub fn below(actual: &Value, bound: &Value, negated: bool) -> MatchResult {
    let (a, b) = numeric_pair(actual, bound, "below")?;
    finish(
        a < b,
        negated,
        format!(
            "expected {} {} {}",
            actual.inspect_string(),
            relation(negated, "be below"),
            bound.inspect_string()
        ),
    )
}

/// `a(type)` / `an(type)`: type check against the value's type name.
pub fn a_type(actual: &Value, expected_type: &Value, negated: bool) -> MatchResult {
    let expected_type = match expected_type {
        Value::Str(s) => s.as_str(),
        other => {
            return Err(format!(
                "a() expects a type name string, got {}",
                other.inspect_string()
            ))
        }
    };
    finish(
        actual.type_name() == expected_type,
        negated,
        format!(
            "expected {} {} a {}",
            actual.inspect_string(),
            relation(negated, "be"),
            expected_type
        ),
    )
}

/// `have.property(name)`: object key presence.
pub fn have_property(actual: &Value, name: &Value, negated: bool) -> MatchResult {
    let name = match name {
        Value::Str(s) => s.as_str(),
        other => {
            return Err(format!(
                "property() expects a name string, got {}",
                other.inspect_string()
            ))
        }
    };
    let has = actual.get_property(name).is_some();
    finish(
        has,
        negated,
        format!(
            "expected {} {} property '{}'",
            actual.inspect_string(),
            relation(negated, "have"),
            name
        ),
    )
}

/// `include(needle)`: substring for strings, element for arrays.
pub fn include(actual: &Value, needle: &Value, negated: bool) -> MatchResult {
    let found = match (actual, needle) {
        (Value::Str(haystack), Value::Str(sub)) => haystack.contains(sub.as_str()),
        (Value::Array(items), needle) => items.iter().any(|item| item.equals(needle)),
        _ => {
            return Err(format!(
                "cannot check inclusion of {} in {}",
                needle.inspect_string(),
                actual.inspect_string()
            ))
        }
    };
    finish(
        found,
        negated,
        format!(
            "expected {} {} {}",
            actual.inspect_string(),
            relation(negated, "include"),
            needle.inspect_string()
        ),
    )
}

/// `have.lengthOf(n)`: length of a string, array, or object.
pub fn have_length_of(actual: &Value, expected: &Value, negated: bool) -> MatchResult {
    let expected_len = match expected {
        Value::Number(n) => *n as usize,
        other => {
            return Err(format!(
                "lengthOf() expects a number, got {}",
                other.inspect_string()
            ))
        }
    };
    let actual_len = match actual {
        Value::Str(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(props) => props.len(),
        other => {
            return Err(format!(
                "expected {} to have a length",
                other.inspect_string()
            ))
        }
    };
    finish(
        actual_len == expected_len,
        negated,
        format!(
            "expected {} {} a length of {} but got {}",
            actual.inspect_string(),
            relation(negated, "have"),
            expected_len,
            actual_len
        ),
    )
}

/// Boolean-style terminal getters: `true`, `false`, `null`, `empty`, `ok`.
pub fn terminal_getter(actual: &Value, name: &str, negated: bool) -> MatchResult {
    let passed = match name {
        "true" => matches!(actual, Value::Bool(true)),
        "false" => matches!(actual, Value::Bool(false)),
        "null" => matches!(actual, Value::Null),
        "ok" => actual.truthy(),
        "empty" => match actual {
            Value::Str(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(props) => props.is_empty(),
            _ => false,
        },
        _ => return Err(format!("unknown matcher: {}", name)),
    };
    finish(
        passed,
        negated,
        format!(
            "expected {} {} {}",
            actual.inspect_string(),
            relation(negated, "be"),
            name
        ),
    )
}

fn numeric_pair(actual: &Value, bound: &Value, matcher: &str) -> Result<(f64, f64), String> {
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(format!(
            "{}() compares numbers, got {} and {}",
            matcher,
            actual.inspect_string(),
            bound.inspect_string()
        )),
    }
}
