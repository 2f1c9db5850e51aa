//! Environment variable expansion for configuration values.

use serde_yaml::Value;

/// Expand `${NAME}` and `$NAME` references from the process environment.
/// Unset variables expand to the empty string.
#[must_use]
pub fn expand_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand references using `lookup` instead of the process environment.
///
/// Names starting with a digit are not variables, so `$5` stays literal, as
/// do a lone `$` and an unclosed `${`.
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    shellexpand::env_with_context_no_errors(input, |name: &str| {
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            None
        } else {
            Some(lookup(name).unwrap_or_default())
        }
    })
    .into_owned()
}

/// Expand every string scalar in a YAML tree, skipping `template` mappings
/// whose content is rendered from secret data instead.
pub(crate) fn expand_tree<F>(value: &mut Value, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(text) => *text = expand_with(text, lookup),
        Value::Sequence(items) => {
            for item in items {
                expand_tree(item, lookup);
            }
        }
        Value::Mapping(map) => {
            for (key, item) in map.iter_mut() {
                if key.as_str() != Some("template") {
                    expand_tree(item, lookup);
                }
            }
        }
        Value::Tagged(tagged) => expand_tree(&mut tagged.value, lookup),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
