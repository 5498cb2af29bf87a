use crate::adapters::signature::SignatureResolver;
use crate::domain::model::FlatRow;

const EMPTY_MARKER: &str = "-";

/// Two-column Field/Value table for one file.
///
/// Empty or null values show as `-`. With a resolver, signature references
/// are printed as absolute URLs.
pub fn render_flat_row(file_name: &str, row: &FlatRow, resolver: Option<&SignatureResolver>) -> String {
    let lines: Vec<(String, String)> = row
        .iter()
        .map(|(path, value)| (path.to_string(), display_value(path, value, resolver)))
        .collect();

    let width = lines
        .iter()
        .map(|(path, _)| path.chars().count())
        .chain(std::iter::once("Field".len()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    out.push_str(&format!("📄 {}\n", file_name));
    out.push_str(&format!("{:<width$} | Value\n", "Field", width = width));
    out.push_str(&format!("{}-+-{}\n", "-".repeat(width), "-".repeat(5)));
    for (path, value) in lines {
        out.push_str(&format!("{:<width$} | {}\n", path, value, width = width));
    }
    out
}

fn display_value(path: &str, value: Option<&str>, resolver: Option<&SignatureResolver>) -> String {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return EMPTY_MARKER.to_string();
    };
    if let Some(resolver) = resolver {
        if SignatureResolver::is_signature_ref(path, Some(value)) {
            if let Ok(url) = resolver.resolve(value) {
                return url.to_string();
            }
        }
    }
    value.to_string()
}
