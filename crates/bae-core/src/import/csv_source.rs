//! CSV backend for site-list import, using the `csv` crate directly (no
//! derive) since rows are untyped until the shared validation pass.

use anyhow::Result;
use std::path::Path;

use super::RawRow;

pub(super) fn read_rows(path: &Path) -> Result<(Vec<String>, Vec<RawRow>)> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase().trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = RawRow::new();
        for (col, value) in headers.iter().zip(record.iter()) {
            row.insert(col.clone(), value.to_string());
        }
        rows.push(row);
    }

    Ok((headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_header_and_rows() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "Name,Lat,Lon").unwrap();
        writeln!(f, "A,40.0,-111.0").unwrap();
        f.flush().unwrap();

        let (headers, rows) = read_rows(f.path()).unwrap();
        assert_eq!(headers, vec!["name", "lat", "lon"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name").unwrap(), "A");
    }
}
