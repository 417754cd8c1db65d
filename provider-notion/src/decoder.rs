//! Flattening of tagged property values
//!
//! [`decode`] turns a [`PropertyValue`] into a plain JSON scalar or list,
//! with `null` standing for "no value". Title and rich-text never decode to
//! `null`, multi-select never decodes to `null`, so column types stay stable
//! across rows.

use serde_json::Value;

use crate::types::{PropertyKind, PropertyValue, SelectOption, TextRun};

pub fn decode(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Title(runs) | PropertyValue::RichText(runs) => first_run(runs),
        PropertyValue::Number(number) => number.clone().map_or(Value::Null, Value::Number),
        PropertyValue::Select(choice) | PropertyValue::Status(choice) => option_name(choice.as_ref()),
        PropertyValue::MultiSelect(choices) => Value::Array(
            choices
                .iter()
                .map(|c| Value::String(c.name.clone()))
                .collect(),
        ),
        PropertyValue::Date(range) => range
            .as_ref()
            .and_then(|r| r.start.clone())
            .map_or(Value::Null, Value::String),
        PropertyValue::Checkbox(checked) => Value::Bool(checked.unwrap_or(false)),
        PropertyValue::Url(text) | PropertyValue::Email(text) | PropertyValue::PhoneNumber(text) => {
            text.clone().map_or(Value::Null, Value::String)
        }
        PropertyValue::Other(raw) => raw.clone(),
    }
}

/// Value of a column the record does not carry
pub fn decode_absent(kind: Option<&PropertyKind>) -> Value {
    match kind {
        Some(PropertyKind::Title | PropertyKind::RichText) => Value::String(String::new()),
        Some(PropertyKind::MultiSelect) => Value::Array(Vec::new()),
        Some(PropertyKind::Checkbox) => Value::Bool(false),
        _ => Value::Null,
    }
}

/// Parse and decode a raw tagged object in one step
pub fn decode_json(raw: &Value) -> Value {
    decode(&PropertyValue::from_json(raw))
}

fn first_run(runs: &[TextRun]) -> Value {
    Value::String(
        runs.first()
            .map(|run| run.plain_text.clone())
            .unwrap_or_default(),
    )
}

fn option_name(choice: Option<&SelectOption>) -> Value {
    choice.map_or(Value::Null, |c| Value::String(c.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DateRange;
    use serde_json::json;

    #[test]
    fn test_title_and_rich_text() {
        assert_eq!(
            decode_json(&json!({
                "type": "title",
                "title": [{"plain_text": "Hello"}, {"plain_text": " world"}]
            })),
            json!("Hello")
        );
        assert_eq!(decode_json(&json!({"type": "title", "title": []})), json!(""));
        assert_eq!(decode_json(&json!({"type": "rich_text", "rich_text": []})), json!(""));
    }

    #[test]
    fn test_number_keeps_integer() {
        let decoded = decode_json(&json!({"type": "number", "number": 42}));
        assert!(decoded.is_i64());
        assert_eq!(decoded, json!(42));
        assert_eq!(decode_json(&json!({"type": "number", "number": 1.5})), json!(1.5));
        assert_eq!(decode_json(&json!({"type": "number", "number": null})), Value::Null);
    }

    #[test]
    fn test_select_and_status() {
        assert_eq!(
            decode_json(&json!({"type": "select", "select": {"id": "x", "name": "High"}})),
            json!("High")
        );
        assert_eq!(decode_json(&json!({"type": "select", "select": null})), Value::Null);
        assert_eq!(
            decode_json(&json!({"type": "status", "status": {"name": "In progress"}})),
            json!("In progress")
        );
    }

    #[test]
    fn test_multi_select_order_and_empty() {
        assert_eq!(
            decode_json(&json!({
                "type": "multi_select",
                "multi_select": [{"name": "b"}, {"name": "a"}]
            })),
            json!(["b", "a"])
        );
        assert_eq!(
            decode_json(&json!({"type": "multi_select", "multi_select": []})),
            json!([])
        );
    }

    #[test]
    fn test_date_uses_start_only() {
        let raw = json!({
            "type": "date",
            "date": {"start": "2024-05-01", "end": "2024-05-03"}
        });
        assert_eq!(decode_json(&raw), json!("2024-05-01"));

        match PropertyValue::from_json(&raw) {
            PropertyValue::Date(Some(range)) => assert_eq!(range.end.as_deref(), Some("2024-05-03")),
            other => panic!("unexpected value: {other:?}"),
        }
        assert_eq!(decode_json(&json!({"type": "date", "date": null})), Value::Null);
    }

    #[test]
    fn test_date_without_start_is_null() {
        let raw = json!({"type": "date", "date": {"start": null, "end": "2024-05-03"}});
        assert!(matches!(
            PropertyValue::from_json(&raw),
            PropertyValue::Date(Some(DateRange { start: None, .. }))
        ));
        assert_eq!(decode_json(&raw), Value::Null);
        assert_eq!(decode_json(&json!({"type": "date", "date": {}})), Value::Null);
    }

    #[test]
    fn test_checkbox_defaults_to_false() {
        assert_eq!(decode_json(&json!({"type": "checkbox", "checkbox": true})), json!(true));
        assert_eq!(decode_json(&json!({"type": "checkbox"})), json!(false));
    }

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(
            decode_json(&json!({"type": "url", "url": "https://example.com"})),
            json!("https://example.com")
        );
        assert_eq!(decode_json(&json!({"type": "email", "email": null})), Value::Null);
        assert_eq!(
            decode_json(&json!({"type": "phone_number", "phone_number": "+1 555"})),
            json!("+1 555")
        );
    }

    #[test]
    fn test_unknown_kind_passes_through() {
        let raw = json!({"type": "formula", "formula": {"type": "number", "number": 3}});
        assert_eq!(decode_json(&raw), raw);
    }

    #[test]
    fn test_redecoding_wrapped_value_is_identity() {
        let samples = [
            json!({"type": "title", "title": [{"plain_text": "T"}]}),
            json!({"type": "multi_select", "multi_select": [{"name": "a"}]}),
            json!({"type": "number", "number": 7}),
            json!({"type": "checkbox", "checkbox": false}),
            json!({"type": "rollup", "rollup": {"array": []}}),
        ];
        for raw in samples {
            let once = decode_json(&raw);
            assert_eq!(decode(&PropertyValue::Other(once.clone())), once);
        }
    }

    #[test]
    fn test_absent_defaults() {
        assert_eq!(decode_absent(Some(&PropertyKind::Title)), json!(""));
        assert_eq!(decode_absent(Some(&PropertyKind::RichText)), json!(""));
        assert_eq!(decode_absent(Some(&PropertyKind::MultiSelect)), json!([]));
        assert_eq!(decode_absent(Some(&PropertyKind::Checkbox)), json!(false));
        assert_eq!(decode_absent(Some(&PropertyKind::Number)), Value::Null);
        assert_eq!(
            decode_absent(Some(&PropertyKind::Other("people".to_string()))),
            Value::Null
        );
        assert_eq!(decode_absent(None), Value::Null);
    }
}
