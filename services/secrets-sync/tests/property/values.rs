//! Config Value Property Tests
//!
//! Tests validate:
//! - Duration strings parse to the duration they spell
//! - Octal mode strings and chmod-style integers parse to the same bits

use proptest::prelude::*;
use secrets_sync::config::{mode_from_integer, parse_duration, parse_mode};
use test_utils::{duration_string_strategy, file_mode_strategy};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_duration_strings_parse((text, expected) in duration_string_strategy()) {
        prop_assert_eq!(parse_duration(&text), Ok(expected));
    }

    #[test]
    fn prop_mode_spellings_agree(mode in file_mode_strategy()) {
        prop_assert_eq!(parse_mode(&format!("{mode:04o}")), Ok(mode));
        prop_assert_eq!(parse_mode(&format!("{mode:o}")), Ok(mode));
        let digits: u64 = format!("{mode:o}").parse().unwrap();
        prop_assert_eq!(mode_from_integer(digits), Ok(mode));
    }
}
