//! Flattening of nested extraction metadata into dotted-path rows.
//!
//! Nested records are walked depth-first in field order and spliced into the
//! parent's output under `parent.child` paths. Sequences are not expanded:
//! each becomes one `"; "`-joined value, with nested elements rendered as
//! compact JSON.

use crate::domain::model::{FlatRow, MetadataRecord, MetadataValue};

const SEQUENCE_SEPARATOR: &str = "; ";

pub fn flatten(record: &MetadataRecord) -> FlatRow {
    let mut row = FlatRow::new();
    flatten_into(record, "", &mut row);
    row
}

fn flatten_into(record: &MetadataRecord, parent: &str, row: &mut FlatRow) {
    for (key, value) in record.iter() {
        let path = if parent.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", parent, key)
        };

        match value {
            MetadataValue::Record(nested) => flatten_into(nested, &path, row),
            MetadataValue::Sequence(items) => row.insert(path, Some(join_sequence(items))),
            scalar => row.insert(path, scalar_text(scalar)),
        }
    }
}

fn join_sequence(items: &[MetadataValue]) -> String {
    items
        .iter()
        .map(|item| match item {
            MetadataValue::Record(_) | MetadataValue::Sequence(_) | MetadataValue::Null => {
                compact_json(item)
            }
            scalar => scalar_text(scalar).unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(SEQUENCE_SEPARATOR)
}

fn scalar_text(value: &MetadataValue) -> Option<String> {
    match value {
        MetadataValue::Null => None,
        MetadataValue::Bool(b) => Some(b.to_string()),
        MetadataValue::Number(n) => Some(canonical_number(n)),
        MetadataValue::Text(s) => Some(s.clone()),
        MetadataValue::Record(_) | MetadataValue::Sequence(_) => Some(compact_json(value)),
    }
}

/// Compact JSON whose numbers use the same text as top-level scalars.
fn compact_json(value: &MetadataValue) -> String {
    let mut out = String::new();
    write_json(value, &mut out);
    out
}

fn write_json(value: &MetadataValue, out: &mut String) {
    match value {
        MetadataValue::Null => out.push_str("null"),
        MetadataValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        MetadataValue::Number(n) => out.push_str(&canonical_number(n)),
        MetadataValue::Text(s) => out.push_str(&serde_json::Value::from(s.as_str()).to_string()),
        MetadataValue::Record(record) => {
            out.push('{');
            for (index, (key, nested)) in record.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::from(key).to_string());
                out.push(':');
                write_json(nested, out);
            }
            out.push('}');
        }
        MetadataValue::Sequence(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_json(item, out);
            }
            out.push(']');
        }
    }
}

/// Number text as JavaScript prints it: integral floats drop the fraction
/// (`2.0` -> `"2"`), and magnitudes at or above `1e21` or below `1e-6` use
/// exponent form (`1e+21`, `1.5e-7`).
fn canonical_number(number: &serde_json::Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.abs() >= 1e21 || f.abs() < 1e-6 => {
            let text = format!("{:e}", f);
            match text.split_once('e') {
                Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                    format!("{}e+{}", mantissa, exponent)
                }
                _ => text,
            }
        }
        // Display never uses exponent form and omits `.0` on integral values.
        Some(f) => format!("{}", f),
        None => number.to_string(),
    }
}
