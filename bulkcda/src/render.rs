//! Text and JSON rendering for CLI output

use bulkcdalib::ReportTable;
use console::{measure_text_width, pad_str, Alignment, Style};
use serde::Serialize;

/// Output format selected with `--output`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    pub fn from_arg(value: Option<&str>) -> Self {
        match value {
            Some("json") => OutputMode::Json,
            _ => OutputMode::Text,
        }
    }

    pub fn is_structured(self) -> bool {
        self == OutputMode::Json
    }
}

/// Create the header style
fn header_style() -> Style {
    Style::new().bold()
}

/// Numeric-looking cells are right-aligned
fn alignment_for(cell: &str) -> Alignment {
    let numeric = !cell.is_empty()
        && cell
            .trim_end_matches('%')
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b'.' || b == b'-');
    if numeric {
        Alignment::Right
    } else {
        Alignment::Left
    }
}

/// Render a ReportTable as aligned text
pub fn render_table(table: &ReportTable) -> String {
    let columns = table.headers.len().max(1);
    let mut lines: Vec<Vec<&str>> = Vec::with_capacity(table.rows.len() + 1);
    for row in table.rows.iter().chain(table.footer.iter()) {
        let mut cells = vec![row.label.as_str()];
        cells.extend(row.values.iter().map(String::as_str));
        lines.push(cells);
    }

    let mut widths: Vec<usize> = table.headers.iter().map(|h| measure_text_width(h)).collect();
    widths.resize(columns, 0);
    for cells in &lines {
        for (i, cell) in cells.iter().enumerate().take(columns) {
            widths[i] = widths[i].max(measure_text_width(cell));
        }
    }

    let join = |cells: &[&str], header: bool| -> String {
        cells
            .iter()
            .enumerate()
            .take(columns)
            .map(|(i, cell)| {
                let align = if header || i == 0 {
                    Alignment::Left
                } else {
                    alignment_for(cell)
                };
                pad_str(cell, widths[i], align, None).into_owned()
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    if let Some(title) = &table.title {
        out.push_str(&format!("{}\n", header_style().apply_to(title)));
    }

    let headers: Vec<&str> = table.headers.iter().map(String::as_str).collect();
    out.push_str(&format!("{}\n", header_style().apply_to(join(&headers, true))));
    let total_width = widths.iter().sum::<usize>() + 2 * (columns - 1);
    let separator = "-".repeat(total_width);
    out.push_str(&separator);
    out.push('\n');

    for (i, cells) in lines.iter().enumerate() {
        if table.footer.is_some() && i == table.rows.len() {
            out.push_str(&separator);
            out.push('\n');
        }
        out.push_str(&join(cells, false));
        out.push('\n');
    }

    if let Some(legend) = &table.legend {
        out.push_str(legend);
        out.push('\n');
    }
    out
}

/// Render several tables separated by blank lines
pub fn render_tables(tables: &[ReportTable]) -> String {
    tables
        .iter()
        .map(render_table)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a value as pretty JSON
pub fn render_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
