//! Dynamic variable resolution.
//!
//! Dynamic variables are resolved at substitution time rather than looked up
//! in a scope: {{$guid}} yields a fresh UUID, {{$timestamp}} the current Unix
//! time, and {{$randomInt min max}} a uniform random integer.

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

/// Resolves a dynamic variable by name and arguments.
///
/// The name is given without the `$` prefix. Returns `None` for unknown
/// names or malformed arguments, in which case the placeholder is left
/// verbatim like any other unresolved variable.
///
/// # Examples
///
/// ```
/// use collection_runner::variables::system::resolve_dynamic_variable;
///
/// // {{$guid}}
/// assert!(resolve_dynamic_variable("guid", &[]).is_some());
///
/// // {{$timestamp}}
/// assert!(resolve_dynamic_variable("timestamp", &[]).is_some());
///
/// // {{$randomInt 1 100}}
/// assert!(resolve_dynamic_variable("randomInt", &["1", "100"]).is_some());
/// ```
pub fn resolve_dynamic_variable(name: &str, args: &[&str]) -> Option<String> {
    match name {
        "guid" => Some(Uuid::new_v4().to_string()),
        "timestamp" => Some(Utc::now().timestamp().to_string()),
        "randomInt" => resolve_random_int(args),
        _ => None,
    }
}

/// Resolves {{$randomInt min max}} to a uniform integer in `[min, max]`.
/// Defaults to `[0, 1000]` when no bounds are given.
fn resolve_random_int(args: &[&str]) -> Option<String> {
    let (min, max) = match args {
        [] => (0i64, 1000i64),
        [min, max] => {
            let min = min.parse::<i64>().ok()?;
            let max = max.parse::<i64>().ok()?;
            (min, max)
        }
        _ => return None,
    };

    if min > max {
        return None;
    }

    let value = rand::thread_rng().gen_range(min..=max);
    Some(value.to_string())
}
