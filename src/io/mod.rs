//! File contracts consumed and produced by the pipeline
//!
//! - `npz` - canonical record (`data`, `fs`) and spectral (`f`, `t`, `Zxx`) containers
//! - `mat` - MATLAB v5 and v7.3 records and their conversion to NPZ
//! - `export` - band-power CSV tables and filter-response JSON
//!
//! Every writer goes through [`write_atomic`], so a failure never leaves a
//! truncated file at the destination path.

mod export;
mod mat;
mod npz;

pub use export::{
    read_filter_response_json, write_band_power_csv, write_filter_response_json,
    FilterResponseExport,
};
pub use mat::{convert_mat_to_npz, read_mat_record};
pub use npz::{read_record, read_spectral, write_record, write_spectral};

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Sibling path used while a file is being written
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Write through a `*.partial` sibling and rename it into place on success.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    let tmp = partial_path(path);
    let outcome = File::create(&tmp)
        .map_err(Into::into)
        .and_then(write)
        .and_then(|_| fs::rename(&tmp, path).map_err(Into::into));
    if outcome.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    outcome
}
