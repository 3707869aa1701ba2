//! Excel backend (`.xlsx`/`.xls`) for site-list import, using `calamine`.
//!
//! Cells are stringified eagerly so the shared validation pass in
//! `import::parse_import_file` can stay backend-agnostic, mirroring how
//! `batch_parser.py` normalizes everything through `pandas` before its own
//! per-row loop.

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

use super::RawRow;

pub(super) fn read_rows(path: &Path) -> Result<(Vec<String>, Vec<RawRow>)> {
    let mut workbook = open_workbook_auto(path).with_context(|| format!("open {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook has no sheets")?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("read sheet {sheet_name}"))?;

    let mut rows_iter = range.rows();
    let Some(header_row) = rows_iter.next() else {
        bail!("sheet {sheet_name} is empty");
    };
    let headers: Vec<String> = header_row.iter().map(|c| cell_to_string(c).to_lowercase().trim().to_string()).collect();

    let mut rows = Vec::new();
    for data_row in rows_iter {
        let mut row = RawRow::new();
        for (col, cell) in headers.iter().zip(data_row.iter()) {
            row.insert(col.clone(), cell_to_string(cell));
        }
        rows.push(row);
    }

    Ok((headers, rows))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}
