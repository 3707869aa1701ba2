//! Save discipline for one fetched granule file.
//!
//! Grounded on `downloader.py::_save_granule`: delete any existing file
//! first (retrying once after a short sleep if the OS reports the file is
//! still in use), write the new bytes, then reject and delete anything
//! under the minimum valid size.

use anyhow::{bail, Result};
use std::fs;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

pub(super) fn save_granule_file(path: &Path, bytes: &[u8], min_valid_bytes: u64) -> Result<u64> {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            sleep(Duration::from_millis(500));
            if let Err(e2) = fs::remove_file(path) {
                bail!("cannot replace locked file {}: {e} (retry: {e2})", path.display());
            }
        }
    }

    fs::write(path, bytes)?;

    let size = fs::metadata(path)?.len();
    if size < min_valid_bytes {
        fs::remove_file(path)?;
        bail!("saved file too small: {size} bytes (minimum {min_valid_bytes})");
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_and_deletes_undersized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempo_2024-06-01_16.nc");
        let result = save_granule_file(&path, b"tiny", 1000);
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn accepts_and_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempo_2024-06-01_16.nc");
        let big = vec![0u8; 2000];
        fs::write(&path, b"old").unwrap();

        let size = save_granule_file(&path, &big, 1000).unwrap();
        assert_eq!(size, 2000);
        assert_eq!(fs::read(&path).unwrap(), big);
    }
}
