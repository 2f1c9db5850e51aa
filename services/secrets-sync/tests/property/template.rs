//! Template Property Tests
//!
//! Tests validate:
//! - Field references render to the fetched values surrounded by literal text
//! - `index` reaches fields that are not identifiers
//! - Unknown fields always fail with MissingField
//! - Trim markers remove exactly the adjacent whitespace

use proptest::prelude::*;
use secrets_sync::{Template, TemplateError};
use std::collections::BTreeMap;
use test_utils::{
    dotted_field_name_strategy, field_name_strategy, literal_text_strategy, secret_value_strategy,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Literal text is copied and each `{{ .field }}` is replaced by its value.
    #[test]
    fn prop_fields_substituted_in_place(
        values in prop::collection::btree_map(field_name_strategy(), secret_value_strategy(), 1..5),
        literals in prop::collection::vec(literal_text_strategy(), 6),
    ) {
        let mut source = String::new();
        let mut expected = String::new();
        for (i, (field, value)) in values.iter().enumerate() {
            source.push_str(&literals[i]);
            source.push_str(&format!("{{{{ .{field} }}}}"));
            expected.push_str(&literals[i]);
            expected.push_str(value);
        }
        source.push_str(&literals[5]);
        expected.push_str(&literals[5]);

        let template = Template::parse(&source).unwrap();
        prop_assert_eq!(template.render(&values).unwrap(), expected);
    }

    /// `index . "name"` resolves names containing dots and dashes.
    #[test]
    fn prop_index_reaches_any_name(
        field in dotted_field_name_strategy(),
        value in secret_value_strategy(),
    ) {
        let template = Template::parse(&format!("{{{{ index . \"{field}\" }}}}")).unwrap();
        let values = BTreeMap::from([(field.clone(), value.clone())]);
        prop_assert_eq!(template.render(&values).unwrap(), value);
    }

    /// A field absent from the secret is reported by name.
    #[test]
    fn prop_unknown_field_is_missing(
        values in prop::collection::btree_map(field_name_strategy(), secret_value_strategy(), 0..4),
        field in field_name_strategy(),
    ) {
        prop_assume!(!values.contains_key(&field));
        let template = Template::parse(&format!("{{{{ .{field} }}}}")).unwrap();
        prop_assert_eq!(
            template.render(&values),
            Err(TemplateError::MissingField { field })
        );
    }

    /// `{{-` trims trailing whitespace before, `-}}` trims leading whitespace after.
    #[test]
    fn prop_trim_markers(
        before in literal_text_strategy(),
        after in literal_text_strategy(),
        field in field_name_strategy(),
        value in secret_value_strategy(),
    ) {
        let leading = format!("{before} \n\t");
        let trailing = format!("\n  {after}");
        let source = format!("{leading}{{{{- .{field} -}}}}{trailing}");
        let values = BTreeMap::from([(field, value.clone())]);

        let rendered = Template::parse(&source).unwrap().render(&values).unwrap();
        prop_assert_eq!(
            rendered,
            format!("{}{}{}", leading.trim_end(), value, trailing.trim_start())
        );
    }

    /// Text without actions renders unchanged.
    #[test]
    fn prop_literal_only_is_identity(text in literal_text_strategy()) {
        let template = Template::parse(&text).unwrap();
        prop_assert_eq!(template.render(&BTreeMap::new()).unwrap(), text);
        prop_assert_eq!(template.fields().count(), 0);
    }
}
