//! Combiner: fuses every per-hour granule file of one site into a single
//! time-indexed artifact with a derived ratio field (`spec.md` §4.6).
//!
//! `(date, hour)` comes from the filename, never from file internals — the
//! remote service's own internal timestamps are unreliable
//! (`spec.md` §8 "Filename as authoritative timestamp", grounded on
//! `processor.py::process_dataset`'s `_parse_filename_timestamp`). A
//! `GranuleFileCodec` abstracts the on-disk container the way `fetch`'s
//! `GranulePayload` abstracts the wire container (`DESIGN.md` Open Question
//! Decision #2): no crate in the retrieved pack wraps NetCDF, and the wire/
//! file format is explicitly out of the engine's scope, so BAE reads each
//! file through a pluggable trait instead of a fixed binding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};

/// Guard thresholds for the RATIO field (`spec.md` §4.6 step 5), carried
/// over verbatim from `processor.py`'s FNR formula.
const RATIO_DENOMINATOR_FLOOR: f64 = 1e-12;
const RATIO_NUMERATOR_FLOOR: f64 = -9e30;

pub const RATIO_VARIABLE: &str = "RATIO";

/// A fused, time-sorted in-memory dataset: one `NaiveDateTime` per input
/// file, and one flat `Vec<f64>` per variable, index-aligned with `times`.
#[derive(Debug, Clone, Default)]
pub struct CombinedDataset {
    pub times: Vec<NaiveDateTime>,
    pub variables: HashMap<String, Vec<f64>>,
}

impl CombinedDataset {
    fn len(&self) -> usize {
        self.times.len()
    }
}

/// One file's variables, as read off disk before it is folded into a
/// `CombinedDataset`. Any variable named after the filename-derived time
/// coordinate is dropped by the caller before folding (`spec.md` §4.6 step 2)
/// — a codec has no notion of which name that is, so it always returns
/// whatever it finds.
pub type GranuleVariables = HashMap<String, f64>;

/// Reads one saved granule file's scalar variables, and writes a combined
/// dataset back out to disk. Kept as a trait so the actual on-disk container
/// (NetCDF, JSON, anything a real remote service might return) is swappable
/// without touching the fold/sort/ratio algorithm below.
pub trait GranuleFileCodec {
    fn read_variables(path: &Path) -> Result<GranuleVariables>;
    fn write_combined(path: &Path, dataset: &CombinedDataset) -> Result<()>;
}

/// Parses `tempo_<YYYY-MM-DD>_<HH>.nc` — the only part of the filename the
/// Combiner trusts for scheduling purposes (`spec.md` §4.6 step 1).
pub fn parse_filename_timestamp(path: &Path) -> Result<NaiveDateTime> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("non-UTF8 filename: {}", path.display()))?;

    let rest = stem
        .strip_prefix("tempo_")
        .ok_or_else(|| anyhow!("filename missing 'tempo_' prefix: {stem}"))?;
    let (date_part, hour_part) = rest
        .rsplit_once('_')
        .ok_or_else(|| anyhow!("filename missing date/hour separator: {stem}"))?;

    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .with_context(|| format!("unparseable date in filename: {stem}"))?;
    let hour: u32 = hour_part
        .parse()
        .with_context(|| format!("unparseable hour in filename: {stem}"))?;
    if hour > 23 {
        bail!("hour {hour} out of range in filename: {stem}");
    }

    date.and_hms_opt(hour, 0, 0)
        .ok_or_else(|| anyhow!("invalid hour {hour} in filename: {stem}"))
}

/// Combines every file in `files` into one `CombinedDataset`
/// (`spec.md` §4.6). A per-file read failure is logged by the caller and
/// skipped — the combine only fails if every file fails.
pub fn combine<C: GranuleFileCodec>(files: &[PathBuf]) -> Result<CombinedDataset> {
    let mut rows: Vec<(NaiveDateTime, GranuleVariables)> = Vec::with_capacity(files.len());
    let mut last_err: Option<anyhow::Error> = None;

    for path in files {
        let outcome = parse_filename_timestamp(path).and_then(|time| {
            let vars = C::read_variables(path)?;
            Ok((time, vars))
        });
        match outcome {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable granule file in combine");
                last_err = Some(e);
            }
        }
    }

    if rows.is_empty() {
        return Err(last_err.unwrap_or_else(|| anyhow!("no input files to combine")));
    }

    rows.sort_by_key(|(time, _)| *time);

    let mut dataset = CombinedDataset {
        times: rows.iter().map(|(t, _)| *t).collect(),
        variables: HashMap::new(),
    };

    let all_names: std::collections::BTreeSet<&str> = rows
        .iter()
        .flat_map(|(_, vars)| vars.keys().map(|k| k.as_str()))
        .collect();

    for name in all_names {
        let column: Vec<f64> = rows
            .iter()
            .map(|(_, vars)| vars.get(name).copied().unwrap_or(f64::NAN))
            .collect();
        dataset.variables.insert(name.to_string(), column);
    }

    Ok(dataset)
}

/// Computes `RATIO = numerator_var / denominator_var` per-row, honouring the
/// guard condition exactly (`spec.md` §4.6 step 5): `NaN` unless the
/// denominator clears the floor and the numerator is in range.
pub fn compute_ratio(dataset: &mut CombinedDataset, numerator_var: &str, denominator_var: &str) {
    let len = dataset.len();
    let numerator = dataset.variables.get(numerator_var).cloned();
    let denominator = dataset.variables.get(denominator_var).cloned();

    let ratio = match (numerator, denominator) {
        (Some(num), Some(den)) => (0..len)
            .map(|i| {
                let n = num[i];
                let d = den[i];
                if d > RATIO_DENOMINATOR_FLOOR && n > RATIO_NUMERATOR_FLOOR {
                    n / d
                } else {
                    f64::NAN
                }
            })
            .collect(),
        _ => vec![f64::NAN; len],
    };

    dataset.variables.insert(RATIO_VARIABLE.to_string(), ratio);
}

/// Full combine-and-derive pipeline: combine `files`, compute RATIO, write
/// the result to `output_path` (`spec.md` §4.7 step h).
pub fn process_site_files<C: GranuleFileCodec>(
    files: &[PathBuf],
    output_path: &Path,
    numerator_var: &str,
    denominator_var: &str,
) -> Result<CombinedDataset> {
    let mut dataset = combine::<C>(files)?;
    compute_ratio(&mut dataset, numerator_var, denominator_var);
    C::write_combined(output_path, &dataset)?;
    Ok(dataset)
}

/// In-repo default codec: each granule file is a small JSON object of
/// `{variable: number}`, and the combined artifact is written the same way —
/// a minimal, testable stand-in for whatever container the real remote
/// service uses (`spec.md` §6 leaves the wire/file format unspecified).
pub struct JsonGranuleCodec;

impl GranuleFileCodec for JsonGranuleCodec {
    fn read_variables(path: &Path) -> Result<GranuleVariables> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading granule file {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing granule file {}", path.display()))?;
        let object = value
            .as_object()
            .ok_or_else(|| anyhow!("granule file {} is not a JSON object", path.display()))?;

        let mut vars = GranuleVariables::new();
        for (key, val) in object {
            if let Some(n) = val.as_f64() {
                vars.insert(key.clone(), n);
            }
        }
        Ok(vars)
    }

    fn write_combined(path: &Path, dataset: &CombinedDataset) -> Result<()> {
        let times: Vec<String> = dataset
            .times
            .iter()
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
            .collect();
        let payload = serde_json::json!({
            "time": times,
            "variables": dataset.variables,
        });
        let bytes = serde_json::to_vec_pretty(&payload)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("writing combined dataset {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_well_formed_filename() {
        let path = PathBuf::from("/tmp/site/tempo_2024-06-01_16.nc");
        let time = parse_filename_timestamp(&path).unwrap();
        assert_eq!(time.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-06-01 16:00:00");
    }

    #[test]
    fn rejects_out_of_range_hour() {
        let path = PathBuf::from("tempo_2024-06-01_24.nc");
        assert!(parse_filename_timestamp(&path).is_err());
    }

    #[test]
    fn rejects_missing_prefix() {
        let path = PathBuf::from("granule_2024-06-01_16.nc");
        assert!(parse_filename_timestamp(&path).is_err());
    }

    #[test]
    fn combine_sorts_by_filename_time_and_fills_missing_with_nan() {
        let dir = tempfile::tempdir().unwrap();
        let late = dir.path().join("tempo_2024-06-01_18.nc");
        let early = dir.path().join("tempo_2024-06-01_15.nc");
        std::fs::write(&late, r#"{"NO2_TropVCD": 2.0}"#).unwrap();
        std::fs::write(&early, r#"{"NO2_TropVCD": 1.0, "HCHO_TotVCD": 5.0}"#).unwrap();

        let dataset = combine::<JsonGranuleCodec>(&[late, early]).unwrap();
        assert_eq!(dataset.times.len(), 2);
        assert_eq!(dataset.times[0].hour(), 15);
        assert_eq!(dataset.times[1].hour(), 18);

        let no2 = &dataset.variables["NO2_TropVCD"];
        assert_eq!(no2, &vec![1.0, 2.0]);
        let hcho = &dataset.variables["HCHO_TotVCD"];
        assert_eq!(hcho[0], 5.0);
        assert!(hcho[1].is_nan());
    }

    #[test]
    fn combine_fails_only_when_every_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("not_a_granule.nc");
        std::fs::write(&bad, b"garbage").unwrap();
        assert!(combine::<JsonGranuleCodec>(&[bad]).is_err());
    }

    #[test]
    fn ratio_is_nan_below_denominator_floor() {
        let mut dataset = CombinedDataset {
            times: vec![NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()],
            variables: HashMap::from([
                ("HCHO_TotVCD".to_string(), vec![2.0]),
                ("NO2_TropVCD".to_string(), vec![1e-13]),
            ]),
        };
        compute_ratio(&mut dataset, "HCHO_TotVCD", "NO2_TropVCD");
        assert!(dataset.variables[RATIO_VARIABLE][0].is_nan());
    }

    #[test]
    fn ratio_is_nan_below_numerator_floor() {
        let mut dataset = CombinedDataset {
            times: vec![NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()],
            variables: HashMap::from([
                ("HCHO_TotVCD".to_string(), vec![-9.5e30]),
                ("NO2_TropVCD".to_string(), vec![1.0]),
            ]),
        };
        compute_ratio(&mut dataset, "HCHO_TotVCD", "NO2_TropVCD");
        assert!(dataset.variables[RATIO_VARIABLE][0].is_nan());
    }

    #[test]
    fn ratio_divides_when_within_guard() {
        let mut dataset = CombinedDataset {
            times: vec![NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()],
            variables: HashMap::from([
                ("HCHO_TotVCD".to_string(), vec![4.0]),
                ("NO2_TropVCD".to_string(), vec![2.0]),
            ]),
        };
        compute_ratio(&mut dataset, "HCHO_TotVCD", "NO2_TropVCD");
        assert_eq!(dataset.variables[RATIO_VARIABLE][0], 2.0);
    }

    #[test]
    fn process_site_files_writes_combined_json() {
        let dir = tempfile::tempdir().unwrap();
        let f1 = dir.path().join("tempo_2024-06-01_15.nc");
        std::fs::write(&f1, r#"{"HCHO_TotVCD": 4.0, "NO2_TropVCD": 2.0}"#).unwrap();
        let out = dir.path().join("site_processed.nc");

        let dataset =
            process_site_files::<JsonGranuleCodec>(&[f1], &out, "HCHO_TotVCD", "NO2_TropVCD").unwrap();
        assert_eq!(dataset.variables[RATIO_VARIABLE][0], 2.0);
        assert!(out.exists());
    }
}
