//! Variable resolution engine.
//!
//! This module merges the four variable scopes (global, collection,
//! environment, local) into one lookup table and substitutes `{{name}}`
//! placeholders in request text. Resolution is best-effort: a placeholder
//! with no matching variable is left verbatim, never an error.

use crate::models::request::{HeaderEntry, RequestBody};
use crate::store::VariableStore;
use crate::variables::system::resolve_dynamic_variable;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Cached regex pattern for matching {{variableName}} with optional
/// whitespace, compiled once and reused.
static VARIABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("Failed to compile variable regex"));

/// Substitutes every `{{name}}` occurrence in `text` using the merged map.
///
/// Names starting with `$` are dynamic variables ({{$guid}}, {{$timestamp}},
/// {{$randomInt min max}}) resolved at call time. Placeholders that resolve
/// to nothing (unknown names, unknown dynamic variables, malformed dynamic
/// arguments) are left verbatim.
pub fn substitute(text: &str, variables: &HashMap<String, String>) -> String {
    // Fast path: no variable markers at all.
    if !text.contains("{{") {
        return text.to_string();
    }

    let re = &*VARIABLE_REGEX;
    let mut result = String::with_capacity(text.len() + text.len() / 4);
    let mut last_match_end = 0;

    for cap in re.captures_iter(text) {
        let full_match = cap.get(0).unwrap();
        let name = cap.get(1).unwrap().as_str().trim();

        result.push_str(&text[last_match_end..full_match.start()]);

        let replacement = if let Some(dynamic) = name.strip_prefix('$') {
            let parts: Vec<&str> = dynamic.split_whitespace().collect();
            match parts.split_first() {
                Some((var_name, args)) => resolve_dynamic_variable(var_name, args),
                None => None,
            }
        } else {
            variables.get(name).cloned()
        };

        match replacement {
            Some(value) => result.push_str(&value),
            None => result.push_str(full_match.as_str()),
        }

        last_match_end = full_match.end();
    }

    result.push_str(&text[last_match_end..]);
    result
}

/// Resolves variables against the scoped stores.
///
/// Borrows the variable store and rebuilds the merged map per call; callers
/// that resolve many strings against the same scopes should build the map
/// once with [`VariableResolver::build_variable_map`] and use
/// [`substitute`] directly.
pub struct VariableResolver<'a> {
    store: &'a dyn VariableStore,
}

impl<'a> VariableResolver<'a> {
    /// Creates a resolver over the given variable store.
    pub fn new(store: &'a dyn VariableStore) -> Self {
        Self { store }
    }

    /// Merges the four scopes into one lookup table.
    ///
    /// Scopes are applied lowest precedence first (global, collection,
    /// environment, then the caller-supplied local map), so later scopes
    /// silently overwrite earlier ones on key collision. Disabled variables
    /// are excluded from their scope entirely.
    ///
    /// # Arguments
    ///
    /// * `team_id` - Team whose global variables apply
    /// * `collection_id` - Collection scope, if any
    /// * `environment_id` - Environment scope, if any
    /// * `local` - Run-scoped overlay, if any
    pub fn build_variable_map(
        &self,
        team_id: &str,
        collection_id: Option<&str>,
        environment_id: Option<&str>,
        local: Option<&HashMap<String, String>>,
    ) -> HashMap<String, String> {
        let mut merged = HashMap::new();

        for variable in self.store.global_variables(team_id) {
            if variable.enabled {
                merged.insert(variable.key, variable.value);
            }
        }

        if let Some(collection_id) = collection_id {
            for variable in self.store.collection_variables(collection_id) {
                if variable.enabled {
                    merged.insert(variable.key, variable.value);
                }
            }
        }

        if let Some(environment_id) = environment_id {
            for variable in self.store.environment_variables(environment_id) {
                if variable.enabled {
                    merged.insert(variable.key, variable.value);
                }
            }
        }

        if let Some(local) = local {
            for (key, value) in local {
                merged.insert(key.clone(), value.clone());
            }
        }

        merged
    }

    /// Substitutes `{{name}}` placeholders in `text` against the merged
    /// scopes. Empty input is returned unchanged.
    pub fn resolve_variables(
        &self,
        text: &str,
        team_id: &str,
        collection_id: Option<&str>,
        environment_id: Option<&str>,
        local: Option<&HashMap<String, String>>,
    ) -> String {
        if text.is_empty() {
            return text.to_string();
        }

        let map = self.build_variable_map(team_id, collection_id, environment_id, local);
        substitute(text, &map)
    }

    /// Resolves variables in a URL.
    pub fn resolve_url(
        &self,
        url: &str,
        team_id: &str,
        collection_id: Option<&str>,
        environment_id: Option<&str>,
        local: Option<&HashMap<String, String>>,
    ) -> String {
        self.resolve_variables(url, team_id, collection_id, environment_id, local)
    }

    /// Resolves variables in header names and values, skipping disabled
    /// entries, and returns the result as a map.
    pub fn resolve_headers(
        &self,
        headers: &[HeaderEntry],
        team_id: &str,
        collection_id: Option<&str>,
        environment_id: Option<&str>,
        local: Option<&HashMap<String, String>>,
    ) -> HashMap<String, String> {
        let map = self.build_variable_map(team_id, collection_id, environment_id, local);

        headers
            .iter()
            .filter(|h| h.enabled)
            .map(|h| (substitute(&h.name, &map), substitute(&h.value, &map)))
            .collect()
    }

    /// Resolves variables in the raw body content.
    pub fn resolve_body(
        &self,
        body: Option<&RequestBody>,
        team_id: &str,
        collection_id: Option<&str>,
        environment_id: Option<&str>,
        local: Option<&HashMap<String, String>>,
    ) -> Option<String> {
        body.map(|b| {
            self.resolve_variables(&b.content, team_id, collection_id, environment_id, local)
        })
    }
}
