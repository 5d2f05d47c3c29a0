// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Change detection between a stored row and an incoming record.
//!
//! The update statement runs unconditionally, so "one row affected" says
//! nothing about content. [`row_changed`] decides whether anything the remote
//! sent actually differs from what was stored before the write.
//!
//! Only columns present on both sides are compared. A column that exists
//! only in the incoming record (a new remote field) never counts as a change
//! on its own.

use serde_json::{Map, Value};

/// Columns that churn on the remote without meaning anything locally.
pub const IGNORED_COLUMNS: &[&str] = &["inbox_project"];

/// Stored column name, and the name the remote still uses for it.
pub const LEGACY_RENAMES: &[(&str, &str)] = &[("task_id", "item_id"), ("task_order", "item_order")];

/// True if any column shared by `before` and `incoming` differs under loose
/// equality, after normalizing the stored row.
#[must_use]
pub fn row_changed(before: &Map<String, Value>, incoming: &Map<String, Value>) -> bool {
    normalize(before, incoming)
        .iter()
        .any(|(column, stored)| match incoming.get(column) {
            Some(value) => !loose_eq(stored, value),
            None => false,
        })
}

/// Apply null normalization, drop ignored columns and rename legacy columns.
///
/// A renamed column takes the incoming value under its new name, so it
/// never registers as a change.
fn normalize(before: &Map<String, Value>, incoming: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(before.len());
    for (column, value) in before {
        if IGNORED_COLUMNS.contains(&column.as_str()) {
            continue;
        }
        if let Some((_, current)) = LEGACY_RENAMES.iter().find(|(old, _)| *old == column) {
            let carried = incoming.get(*current).cloned().unwrap_or(Value::Null);
            out.insert((*current).to_string(), carried);
            continue;
        }
        let value = match value {
            Value::String(s) if s == "null" => Value::Null,
            other => other.clone(),
        };
        out.insert(column.clone(), value);
    }
    out
}

/// Type-coercing equality in the manner of a weakly typed comparison:
/// `0 == false`, `"5" == 5`, `null == ""`, `"1.0" == "1"`.
#[must_use]
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    use Value::{Bool, Null, Number, String as Str};

    match (a, b) {
        (Null, Null) => true,
        (Bool(x), other) | (other, Bool(x)) => *x == crate::record::truthy(other),
        (Null, Str(s)) | (Str(s), Null) => s.is_empty(),
        (Null, Number(n)) | (Number(n), Null) => n.as_f64() == Some(0.0),
        (Number(x), Number(y)) => x.as_f64() == y.as_f64(),
        (Number(n), Str(s)) | (Str(s), Number(n)) => match numeric(s) {
            Some(parsed) => n.as_f64() == Some(parsed),
            None => n.to_string() == *s,
        },
        (Str(x), Str(y)) => match (numeric(x), numeric(y)) {
            (Some(l), Some(r)) => l == r,
            _ => x == y,
        },
        (Null, other) | (other, Null) => !crate::record::truthy(other),
        (x, y) => x == y,
    }
}

fn numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_identical_rows_are_unchanged() {
        let row = map(json!({"id": 1, "name": "Inbox", "color": 30}));
        assert!(!row_changed(&row, &row));
    }

    #[test]
    fn test_shared_column_difference_is_a_change() {
        let before = map(json!({"id": 1, "name": "Inbox"}));
        let incoming = map(json!({"id": 1, "name": "Work"}));
        assert!(row_changed(&before, &incoming));
    }

    #[test]
    fn test_write_time_columns_do_not_count() {
        let before = map(json!({
            "id": 1, "name": "Inbox",
            "created": "2024-01-01 00:00:00",
            "modified": "2024-01-02 00:00:00",
            "last_synced": "2024-01-03 00:00:00"
        }));
        let incoming = map(json!({"id": 1, "name": "Inbox"}));
        assert!(!row_changed(&before, &incoming));
    }

    #[test]
    fn test_stored_integers_match_remote_booleans() {
        let before = map(json!({"id": 7, "checked": 0, "is_deleted": 1, "priority": "4"}));
        let incoming = map(json!({"id": 7, "checked": false, "is_deleted": true, "priority": 4}));
        assert!(!row_changed(&before, &incoming));
    }

    #[test]
    fn test_literal_null_string_is_null() {
        let before = map(json!({"id": 7, "section_id": "null"}));
        assert!(!row_changed(&before, &map(json!({"id": 7, "section_id": null}))));
        assert!(row_changed(&before, &map(json!({"id": 7, "section_id": 12}))));
    }

    #[test]
    fn test_inbox_project_is_ignored() {
        let before = map(json!({"id": 100, "inbox_project": 1}));
        let incoming = map(json!({"id": 100, "inbox_project": 0}));
        assert!(!row_changed(&before, &incoming));
    }

    #[test]
    fn test_legacy_columns_take_incoming_value() {
        let before = map(json!({"id": 70, "task_id": 7, "content": "hi"}));
        let incoming = map(json!({"id": 70, "item_id": 8, "content": "hi"}));
        assert!(!row_changed(&before, &incoming));

        let before = map(json!({"id": 3, "task_order": 1}));
        let incoming = map(json!({"id": 3, "item_order": 2}));
        assert!(!row_changed(&before, &incoming));
    }

    // New remote columns are invisible to change detection; only shared
    // columns are compared.
    #[test]
    fn test_columns_only_in_incoming_are_not_compared() {
        let before = map(json!({"id": 1, "name": "Inbox"}));
        let incoming = map(json!({"id": 1, "name": "Inbox", "view_style": "board"}));
        assert!(!row_changed(&before, &incoming));
    }

    #[test]
    fn test_columns_only_in_before_are_not_compared() {
        let before = map(json!({"id": 1, "name": "Inbox", "legacy_flag": 1}));
        let incoming = map(json!({"id": 1, "name": "Inbox"}));
        assert!(!row_changed(&before, &incoming));
    }

    #[test]
    fn test_empty_before_is_never_changed() {
        assert!(!row_changed(&Map::new(), &map(json!({"id": 1, "name": "x"}))));
    }

    #[test]
    fn test_loose_eq_table() {
        let equal = [
            (json!(null), json!(null)),
            (json!(0), json!(false)),
            (json!(1), json!(true)),
            (json!("1"), json!(true)),
            (json!(""), json!(false)),
            (json!(null), json!("")),
            (json!(null), json!(0)),
            (json!(null), json!(false)),
            (json!("5"), json!(5)),
            (json!(2.0), json!(2)),
            (json!("1.0"), json!("1")),
            (json!("abc"), json!("abc")),
            (json!([1]), json!([1])),
        ];
        for (a, b) in &equal {
            assert!(loose_eq(a, b), "{a} should equal {b}");
            assert!(loose_eq(b, a), "{b} should equal {a}");
        }

        let different = [
            (json!(null), json!("0")),
            (json!(null), json!(1)),
            (json!(0), json!(true)),
            (json!("abc"), json!("abd")),
            (json!("abc"), json!(0)),
            (json!(1), json!(2)),
            (json!("2024-01-01"), json!("2024-01-02")),
        ];
        for (a, b) in &different {
            assert!(!loose_eq(a, b), "{a} should differ from {b}");
            assert!(!loose_eq(b, a), "{b} should differ from {a}");
        }
    }
}
