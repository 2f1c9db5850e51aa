//! Shared proptest generators.

use proptest::prelude::*;
use std::time::Duration;

/// Generate template-addressable field names (`.name` syntax).
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,15}"
}

/// Generate field names that need `index . "name"` syntax.
pub fn dotted_field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}[.-][a-z]{1,6}"
}

/// Generate secret values, including braces and newlines.
pub fn secret_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9+/=]{1,64}",
        "[ -~]{0,40}",
        Just("-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n".to_string()),
    ]
}

/// Generate literal template text that contains no `{{`.
pub fn literal_text_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 :=,\\n-]{0,20}"
}

/// Generate namespaces, empty half of the time.
pub fn namespace_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-z][a-z0-9-]{0,12}(/[a-z][a-z0-9-]{0,8})?"]
}

/// Generate permission bits.
pub fn file_mode_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(0o600), Just(0o640), Just(0o644), Just(0o400), 0o400u32..=0o777]
}

/// Generate durations together with their Go-style spelling.
pub fn duration_string_strategy() -> impl Strategy<Value = (String, Duration)> {
    (0u64..48, 0u64..60, 0u64..60, 0u64..1000).prop_filter_map(
        "zero duration",
        |(h, m, s, ms)| {
            let total = Duration::from_millis(((h * 60 + m) * 60 + s) * 1000 + ms);
            if total.is_zero() {
                return None;
            }
            let mut text = String::new();
            for (value, unit) in [(h, "h"), (m, "m"), (s, "s"), (ms, "ms")] {
                if value > 0 {
                    text.push_str(&format!("{value}{unit}"));
                }
            }
            Some((text, total))
        },
    )
}
