//! Spreadsheet and flat-file writers for projected tables.
//!
//! The XLSX writer emits a minimal SpreadsheetML package (one sheet, inline
//! strings, bold header row) directly into a ZIP archive.

use crate::domain::model::{ExportTable, FlatRow};
use crate::utils::error::{EtlError, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const DEFAULT_EXPORT_FILENAME: &str = "metadata_output.xlsx";
pub const SHEET_NAME: &str = "Metadata";

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;
/// Excel's cell text limit, counted in UTF-16 code units.
const MAX_CELL_UNITS: usize = 32_767;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// Style 1 is the bold header font.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Serializes `table` into XLSX bytes.
pub fn write_xlsx(table: &ExportTable) -> Result<Vec<u8>> {
    check_writable(table)?;

    tracing::debug!(
        "Writing XLSX with {} columns and {} rows",
        table.columns.len(),
        table.rows.len()
    );

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    add_part(&mut zip, "[Content_Types].xml", CONTENT_TYPES)?;
    add_part(&mut zip, "_rels/.rels", ROOT_RELS)?;
    add_part(&mut zip, "docProps/core.xml", &core_properties())?;
    add_part(&mut zip, "xl/workbook.xml", &workbook())?;
    add_part(&mut zip, "xl/_rels/workbook.xml.rels", WORKBOOK_RELS)?;
    add_part(&mut zip, "xl/styles.xml", STYLES)?;
    add_part(&mut zip, "xl/worksheets/sheet1.xml", &worksheet(table))?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Same table as CSV, header first.
pub fn write_csv(table: &ExportTable) -> Result<Vec<u8>> {
    check_writable(table)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::SerializationError {
            message: format!("failed to flush CSV output: {}", e),
        })
}

#[derive(Serialize)]
struct FileEntry<'a> {
    file_name: &'a str,
    fields: &'a FlatRow,
}

/// Per-file flat rows as pretty JSON, keyed by file name.
pub fn write_flat_rows_json(file_names: &[String], rows: &[FlatRow]) -> Result<Vec<u8>> {
    if rows.is_empty() {
        return Err(EtlError::SerializationError {
            message: "no extracted rows to export".to_string(),
        });
    }
    let entries: Vec<FileEntry<'_>> = file_names
        .iter()
        .zip(rows)
        .map(|(file_name, fields)| FileEntry { file_name, fields })
        .collect();
    Ok(serde_json::to_vec_pretty(&entries)?)
}

fn check_writable(table: &ExportTable) -> Result<()> {
    if table.columns.is_empty() {
        return Err(EtlError::SerializationError {
            message: "table has no columns".to_string(),
        });
    }
    if table.rows.is_empty() {
        return Err(EtlError::SerializationError {
            message: "table has no rows".to_string(),
        });
    }
    if table.columns.len() > MAX_COLUMNS {
        return Err(EtlError::SerializationError {
            message: format!(
                "{} columns exceed the sheet limit of {}",
                table.columns.len(),
                MAX_COLUMNS
            ),
        });
    }
    // One sheet row is taken by the header.
    if table.rows.len() + 1 > MAX_ROWS {
        return Err(EtlError::SerializationError {
            message: format!(
                "{} rows exceed the sheet limit of {}",
                table.rows.len(),
                MAX_ROWS - 1
            ),
        });
    }
    if let Some(position) = table.rows.iter().position(|row| row.len() != table.columns.len()) {
        return Err(EtlError::SerializationError {
            message: format!(
                "row {} has {} values but the table has {} columns",
                position + 1,
                table.rows[position].len(),
                table.columns.len()
            ),
        });
    }
    Ok(())
}

fn add_part<W: Write + std::io::Seek>(zip: &mut ZipWriter<W>, name: &str, content: &str) -> Result<()> {
    zip.start_file::<_, ()>(name, FileOptions::default())?;
    zip.write_all(content.as_bytes())?;
    Ok(())
}

fn core_properties() -> String {
    let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<dc:creator>ocr-etl</dc:creator>"#,
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{created}</dcterms:created>"#,
            r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{created}</dcterms:modified>"#,
            r#"</cp:coreProperties>"#
        ),
        created = created
    )
}

fn workbook() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            r#"<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
        ),
        SHEET_NAME
    )
}

fn worksheet(table: &ExportTable) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#
    ));

    let header = table.columns.iter().map(String::as_str);
    push_row(&mut xml, 1, header, Some(1));
    for (index, row) in table.rows.iter().enumerate() {
        push_row(&mut xml, index + 2, row.iter().map(String::as_str), None);
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn push_row<'a>(
    xml: &mut String,
    row_number: usize,
    values: impl Iterator<Item = &'a str>,
    style: Option<u32>,
) {
    xml.push_str(&format!(r#"<row r="{}">"#, row_number));
    for (column, value) in values.enumerate() {
        // Blank cells are omitted.
        if value.is_empty() {
            continue;
        }
        let reference = format!("{}{}", column_name(column), row_number);
        let style_attr = style.map(|s| format!(r#" s="{}""#, s)).unwrap_or_default();
        xml.push_str(&format!(
            r#"<c r="{}"{} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            reference,
            style_attr,
            escape_xml(&cell_text(value, &reference))
        ));
    }
    xml.push_str("</row>");
}

fn cell_text<'a>(value: &'a str, reference: &str) -> std::borrow::Cow<'a, str> {
    if value.encode_utf16().count() <= MAX_CELL_UNITS {
        return std::borrow::Cow::Borrowed(value);
    }
    tracing::warn!(
        "Cell {} exceeds {} UTF-16 units and was truncated",
        reference,
        MAX_CELL_UNITS
    );

    let mut units = 0;
    let end = value
        .char_indices()
        .find(|(_, ch)| {
            units += ch.len_utf16();
            units > MAX_CELL_UNITS
        })
        .map(|(index, _)| index)
        .unwrap_or(value.len());
    std::borrow::Cow::Owned(value[..end].to_string())
}

/// Zero-based column index to spreadsheet letters (`0` -> `A`, `26` -> `AA`).
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(ch),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => escaped.push(c),
        }
    }
    escaped
}
