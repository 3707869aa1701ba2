//! Site-list import: parses a CSV or Excel file into `ParsedSite` rows.
//!
//! Grounded on `batch_parser.py::parse_import_file`: column discovery by
//! alias, per-row validation with the row kept (errored, not dropped) on
//! failure, and file-level errors/warnings collected separately from
//! per-row ones.

mod aliases;
mod csv_source;
mod xlsx_source;

use std::path::Path;

use crate::geo::validate_coordinates;

/// A site parsed from an import file, possibly carrying a validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSite {
    /// 1-indexed spreadsheet row, header row counted (`row_num = idx + 2`),
    /// used only for error reporting.
    pub row_number: u64,
    pub site_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub custom_radius_km: Option<f64>,
    pub custom_date_start: Option<String>,
    pub custom_date_end: Option<String>,
    pub custom_hour_start: Option<u32>,
    pub custom_hour_end: Option<u32>,
    pub custom_max_cloud: Option<f64>,
    pub custom_max_sza: Option<f64>,
    pub error: Option<String>,
}

impl ParsedSite {
    fn blank(row_number: u64) -> Self {
        ParsedSite {
            row_number,
            site_name: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            custom_radius_km: None,
            custom_date_start: None,
            custom_date_end: None,
            custom_hour_start: None,
            custom_hour_end: None,
            custom_max_cloud: None,
            custom_max_sza: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub sites: Vec<ParsedSite>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub file_path: Option<String>,
}

impl ParseResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn valid_sites(&self) -> Vec<&ParsedSite> {
        self.sites.iter().filter(|s| s.error.is_none()).collect()
    }

    pub fn invalid_sites(&self) -> Vec<&ParsedSite> {
        self.sites.iter().filter(|s| s.error.is_some()).collect()
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_sites().len()
    }
}

/// A raw, untyped spreadsheet row: header-normalized column name -> cell
/// text, as produced by either backend before the shared validation pass.
pub(crate) type RawRow = std::collections::HashMap<String, String>;

/// Parses `.csv`, `.xlsx`, or `.xls` into a `ParseResult`.
pub fn parse_import_file(file_path: &Path) -> ParseResult {
    let mut result = ParseResult {
        file_path: Some(file_path.display().to_string()),
        ..Default::default()
    };

    if !file_path.exists() {
        result.errors.push(format!("File not found: {}", file_path.display()));
        return result;
    }

    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let (headers, rows) = match extension.as_str() {
        "csv" => match csv_source::read_rows(file_path) {
            Ok(v) => v,
            Err(e) => {
                result.errors.push(format!("Failed to read file: {e}"));
                return result;
            }
        },
        "xlsx" | "xls" => match xlsx_source::read_rows(file_path) {
            Ok(v) => v,
            Err(e) => {
                result.errors.push(format!("Failed to read file: {e}"));
                return result;
            }
        },
        other => {
            result
                .errors
                .push(format!("Unsupported file format: .{other}. Use .xlsx, .xls, or .csv"));
            return result;
        }
    };

    if rows.is_empty() {
        result.errors.push("File is empty or has no data rows".into());
        return result;
    }

    let name_col = aliases::find_column(&headers, aliases::NAME_ALIASES);
    let lat_col = aliases::find_column(&headers, aliases::LATITUDE_ALIASES);
    let lon_col = aliases::find_column(&headers, aliases::LONGITUDE_ALIASES);

    let mut missing = Vec::new();
    if name_col.is_none() {
        missing.push("name (or site_name, site, location)");
    }
    if lat_col.is_none() {
        missing.push("latitude (or lat, y)");
    }
    if lon_col.is_none() {
        missing.push("longitude (or lon, long, x)");
    }
    if !missing.is_empty() {
        result.errors.push(format!("Missing required columns: {}", missing.join(", ")));
        result.errors.push(format!("Found columns: {}", headers.join(", ")));
        return result;
    }
    let name_col = name_col.unwrap();
    let lat_col = lat_col.unwrap();
    let lon_col = lon_col.unwrap();

    let radius_col = aliases::find_column(&headers, aliases::RADIUS_ALIASES);
    let date_start_col = aliases::find_column(&headers, aliases::DATE_START_ALIASES);
    let date_end_col = aliases::find_column(&headers, aliases::DATE_END_ALIASES);
    let hour_start_col = aliases::find_column(&headers, aliases::HOUR_START_ALIASES);
    let hour_end_col = aliases::find_column(&headers, aliases::HOUR_END_ALIASES);
    let max_cloud_col = aliases::find_column(&headers, aliases::MAX_CLOUD_ALIASES);
    let max_sza_col = aliases::find_column(&headers, aliases::MAX_SZA_ALIASES);

    for (idx, row) in rows.iter().enumerate() {
        let row_num = idx as u64 + 2;
        let mut site = ParsedSite::blank(row_num);

        site.site_name = row.get(&name_col).map(|s| s.trim().to_string()).unwrap_or_default();
        if site.site_name.is_empty() {
            site.error = Some("Missing site name".into());
            result.sites.push(site);
            continue;
        }

        match row.get(&lat_col).and_then(|v| v.trim().parse::<f64>().ok()) {
            Some(v) => site.latitude = v,
            None => {
                site.error = Some(format!(
                    "Invalid latitude: {}",
                    row.get(&lat_col).map(String::as_str).unwrap_or("")
                ));
                result.sites.push(site);
                continue;
            }
        }

        match row.get(&lon_col).and_then(|v| v.trim().parse::<f64>().ok()) {
            Some(v) => site.longitude = v,
            None => {
                site.error = Some(format!(
                    "Invalid longitude: {}",
                    row.get(&lon_col).map(String::as_str).unwrap_or("")
                ));
                result.sites.push(site);
                continue;
            }
        }

        if let Err(e) = validate_coordinates(site.latitude, site.longitude) {
            site.error = Some(e.to_string());
            result.sites.push(site);
            continue;
        }

        if let Some(col) = &radius_col {
            if let Some(raw) = row.get(col).filter(|v| !v.trim().is_empty()) {
                match raw.trim().parse::<f64>() {
                    Ok(v) => site.custom_radius_km = Some(v),
                    Err(_) => result
                        .warnings
                        .push(format!("Row {row_num}: Invalid radius_km, using default")),
                }
            }
        }

        if let Some(col) = &date_start_col {
            if let Some(raw) = row.get(col).filter(|v| !v.trim().is_empty()) {
                site.custom_date_start = Some(raw.trim().to_string());
            }
        }
        if let Some(col) = &date_end_col {
            if let Some(raw) = row.get(col).filter(|v| !v.trim().is_empty()) {
                site.custom_date_end = Some(raw.trim().to_string());
            }
        }

        if let Some(col) = &hour_start_col {
            if let Some(raw) = row.get(col).filter(|v| !v.trim().is_empty()) {
                match raw.trim().parse::<i64>() {
                    Ok(v) if (0..=23).contains(&v) => site.custom_hour_start = Some(v as u32),
                    Ok(_) => result
                        .warnings
                        .push(format!("Row {row_num}: Hour start must be 0-23, using default")),
                    Err(_) => result
                        .warnings
                        .push(format!("Row {row_num}: Invalid hour_start, using default")),
                }
            }
        }
        if let Some(col) = &hour_end_col {
            if let Some(raw) = row.get(col).filter(|v| !v.trim().is_empty()) {
                match raw.trim().parse::<i64>() {
                    Ok(v) if (0..=23).contains(&v) => site.custom_hour_end = Some(v as u32),
                    Ok(_) => result
                        .warnings
                        .push(format!("Row {row_num}: Hour end must be 0-23, using default")),
                    Err(_) => result
                        .warnings
                        .push(format!("Row {row_num}: Invalid hour_end, using default")),
                }
            }
        }

        if let Some(col) = &max_cloud_col {
            if let Some(raw) = row.get(col).filter(|v| !v.trim().is_empty()) {
                match raw.trim().parse::<f64>() {
                    Ok(v) => site.custom_max_cloud = Some(v),
                    Err(_) => result
                        .warnings
                        .push(format!("Row {row_num}: Invalid max_cloud, using default")),
                }
            }
        }
        if let Some(col) = &max_sza_col {
            if let Some(raw) = row.get(col).filter(|v| !v.trim().is_empty()) {
                match raw.trim().parse::<f64>() {
                    Ok(v) => site.custom_max_sza = Some(v),
                    Err(_) => result
                        .warnings
                        .push(format!("Row {row_num}: Invalid max_sza, using default")),
                }
            }
        }

        result.sites.push(site);
    }

    if result.sites.is_empty() {
        result.errors.push("No sites found in file".into());
    }

    result
}
