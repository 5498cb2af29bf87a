use crate::domain::model::{ExportTable, FlatRow};
use std::collections::HashSet;

/// Aligns flat rows to the ordered union of their paths.
///
/// Columns appear in first-seen order, scanning rows in sequence. Paths a row
/// lacks, and null values, become empty strings.
pub fn project(rows: &[FlatRow]) -> ExportTable {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for path in rows.iter().flat_map(FlatRow::paths) {
        if seen.insert(path) {
            columns.push(path.to_string());
        }
    }

    let rows = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| {
                    row.get(column)
                        .flatten()
                        .map(str::to_string)
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    ExportTable { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Option<&str>)]) -> FlatRow {
        pairs
            .iter()
            .map(|(path, value)| (*path, value.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_disjoint_rows_share_one_column_universe() {
        let table = project(&[row(&[("a", Some("1"))]), row(&[("b", Some("2"))])]);

        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.row(0).unwrap(), vec![("a", "1"), ("b", "")]);
        assert_eq!(table.row(1).unwrap(), vec![("a", ""), ("b", "2")]);
    }

    #[test]
    fn test_first_seen_order_across_rows() {
        let table = project(&[
            row(&[("File Name", Some("a.pdf")), ("Date", Some("2024-01-02"))]),
            row(&[("Date", Some("2024-03-04")), ("Doctor", Some("Lee")), ("File Name", Some("b.pdf"))]),
        ]);

        assert_eq!(table.columns, vec!["File Name", "Date", "Doctor"]);
        assert_eq!(table.rows[1], vec!["b.pdf", "2024-03-04", "Lee"]);
    }

    #[test]
    fn test_null_values_project_to_blank() {
        let table = project(&[row(&[("Physician Signature", None), ("x", Some("1"))])]);
        assert_eq!(table.value(0, "Physician Signature"), Some(""));
        assert_eq!(table.value(0, "x"), Some("1"));
    }

    #[test]
    fn test_projection_is_stable() {
        let input = vec![
            row(&[("b", Some("1")), ("a", Some("2"))]),
            row(&[("c", Some("3")), ("a", Some("4"))]),
        ];
        assert_eq!(project(&input), project(&input));
    }

    #[test]
    fn test_no_rows() {
        let table = project(&[]);
        assert!(table.columns.is_empty());
        assert!(table.is_empty());
    }
}
