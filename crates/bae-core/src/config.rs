use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/bae/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaeConfig {
    /// Directory under which per-job site data and combined artifacts live.
    pub data_dir: PathBuf,
    /// Default per-site concurrent fetch cap (`W`), used when a job does not
    /// override it.
    pub default_site_workers: usize,
    /// Default job-level concurrent-site cap (`batch_size`), used when a job
    /// does not override it.
    pub default_batch_size: usize,
    /// API key sent to the remote granule service, if required.
    pub api_key: String,
    /// Per-fetch hard timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Base URL of the remote granule service (`spec.md` §6's abstract
    /// `fetch(productId, bboxOrGrid, bdate, edate, filters, apiKey)`
    /// interface, made concrete as a query-string GET against this base).
    #[serde(default = "default_remote_base_url")]
    pub remote_base_url: String,
}

fn default_remote_base_url() -> String {
    "https://granules.example.invalid/api/v1/granule".into()
}

impl Default for BaeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_site_workers: 4,
            default_batch_size: 5,
            api_key: String::new(),
            request_timeout_secs: 180,
            remote_base_url: default_remote_base_url(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    xdg::BaseDirectories::with_prefix("bae")
        .map(|dirs| dirs.get_data_home())
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bae")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BaeConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BaeConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: BaeConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = BaeConfig::default();
        assert_eq!(cfg.default_site_workers, 4);
        assert_eq!(cfg.default_batch_size, 5);
        assert_eq!(cfg.request_timeout_secs, 180);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = BaeConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: BaeConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.default_site_workers, cfg.default_site_workers);
        assert_eq!(parsed.default_batch_size, cfg.default_batch_size);
        assert_eq!(parsed.request_timeout_secs, cfg.request_timeout_secs);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            data_dir = "/tmp/bae-data"
            default_site_workers = 2
            default_batch_size = 3
            api_key = "secret"
            request_timeout_secs = 60
        "#;
        let cfg: BaeConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.default_site_workers, 2);
        assert_eq!(cfg.default_batch_size, 3);
        assert_eq!(cfg.api_key, "secret");
        assert_eq!(cfg.request_timeout_secs, 60);
    }
}
