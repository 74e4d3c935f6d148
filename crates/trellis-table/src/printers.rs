//! Pure formatting of tables to delimited text, aligned text, and Markdown.
//!
//! Printers consume only column slugs and rows; they never reach into the
//! column store, so any row-shaped data can be rendered. Error sentinels
//! export as empty cells in delimited output and as their short codes in the
//! human-oriented formats.

use trellis_model::TableValue;

use crate::store::Row;

/// Escape one cell for CSV-style output: quote when the value contains the
/// delimiter, a quote, or a line break, doubling interior quotes.
pub fn csv_escape(value: &str, delimiter: char) -> String {
    if value.contains(delimiter) || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn delimited_cell(value: Option<&TableValue>, delimiter: char) -> String {
    match value {
        Some(TableValue::Error(_)) | None => String::new(),
        Some(v) => csv_escape(&v.to_string(), delimiter),
    }
}

fn display_cell(value: Option<&TableValue>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Render rows as delimited text with a header row.
pub fn to_delimited(delimiter: char, slugs: &[String], rows: &[Row]) -> String {
    let mut out = String::new();
    let header: Vec<String> = slugs.iter().map(|s| csv_escape(s, delimiter)).collect();
    out.push_str(&header.join(&delimiter.to_string()));
    for row in rows {
        out.push('\n');
        let cells: Vec<String> = slugs
            .iter()
            .map(|slug| delimited_cell(row.get(slug), delimiter))
            .collect();
        out.push_str(&cells.join(&delimiter.to_string()));
    }
    out
}

/// Options for the aligned fixed-width printer.
#[derive(Clone, Copy, Debug)]
pub struct AlignedTextOptions {
    /// Hard cap on cell width; longer cells are truncated with an ellipsis.
    pub max_cell_width: usize,
    pub align_right: bool,
}

impl Default for AlignedTextOptions {
    fn default() -> Self {
        AlignedTextOptions {
            max_cell_width: 30,
            align_right: false,
        }
    }
}

fn truncate(value: &str, max_width: usize) -> String {
    if value.chars().count() <= max_width {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_width.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Render rows as an aligned fixed-width text table for consoles.
pub fn to_aligned_text_table(
    slugs: &[String],
    rows: &[Row],
    options: AlignedTextOptions,
) -> String {
    let cells: Vec<Vec<String>> = std::iter::once(slugs.to_vec())
        .chain(rows.iter().map(|row| {
            slugs
                .iter()
                .map(|slug| display_cell(row.get(slug)))
                .collect()
        }))
        .map(|row: Vec<String>| {
            row.iter()
                .map(|cell| truncate(cell, options.max_cell_width))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = slugs
        .iter()
        .enumerate()
        .map(|(i, _)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    cells
        .iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|(cell, &width)| {
                    if options.align_right {
                        format!("{cell:>width$}")
                    } else {
                        format!("{cell:<width$}")
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render rows as a Markdown table.
pub fn to_markdown_table(slugs: &[String], rows: &[Row]) -> String {
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", slugs.join(" | ")));
    out.push_str(&format!(
        "|{}\n",
        slugs.iter().map(|_| " --- |").collect::<String>()
    ));
    for row in rows {
        let cells: Vec<String> = slugs
            .iter()
            .map(|slug| display_cell(row.get(slug)))
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}
