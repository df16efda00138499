// src/io/mat.rs
//
// MATLAB `.mat` records (`data` as [channels, samples], `fs`), v5 or
// HDF5-based v7.3, and their conversion to the canonical NPZ container.

use matfile::{MatFile, NumericData};
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::npz::write_record;
use crate::core::analysis::notch_filter;
use crate::core::params::FilterSpec;
use crate::core::record::TimeSeriesRecord;
use crate::error::{ElecPhysError, Result};

fn numeric_values(data: &NumericData) -> Option<Vec<f64>> {
    let values = match data {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        _ => return None,
    };
    Some(values)
}

/// Superblock signature of an HDF5 container (MAT v7.3)
const HDF5_SIGNATURE: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// The HDF5 superblock sits at offset 0 or 512 * 2^k; MATLAB writes a
/// 512-byte user block in front of it.
fn is_hdf5(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut signature = [0u8; 8];
    let mut offset = 0u64;
    while offset + 8 <= len {
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut signature)?;
        if &signature == HDF5_SIGNATURE {
            return Ok(true);
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    Ok(false)
}

fn missing(path: &Path, name: &str) -> ElecPhysError {
    ElecPhysError::format(format!("{}: missing '{}' variable", path.display(), name))
}

/// One row per channel from a column-major `rows x cols` matrix.
fn column_major_record(path: &Path, flat: &[f64], rows: usize, cols: usize, fs: f64) -> Result<TimeSeriesRecord> {
    if flat.len() != rows * cols {
        return Err(ElecPhysError::format(format!(
            "{}: 'data' holds {} values, expected {}x{}",
            path.display(),
            flat.len(),
            rows,
            cols
        )));
    }
    let samples = (0..rows)
        .map(|row| (0..cols).map(|col| flat[col * rows + row]).collect())
        .collect();
    TimeSeriesRecord::new(samples, fs)
        .map_err(|e| ElecPhysError::format(format!("{}: {}", path.display(), e)))
}

/// Load `data` (`[channels, samples]` in MATLAB) and `fs` from a `.mat`
/// file. Both MAT v5 and HDF5-based v7.3 files are recognised.
pub fn read_mat_record(path: &Path) -> Result<TimeSeriesRecord> {
    if is_hdf5(path)? {
        read_mat73_record(path)
    } else {
        read_mat5_record(path)
    }
}

fn read_mat5_record(path: &Path) -> Result<TimeSeriesRecord> {
    let file = File::open(path)?;
    let mat = MatFile::parse(BufReader::new(file)).map_err(|e| {
        ElecPhysError::format(format!("{}: not a readable MAT v5 file: {}", path.display(), e))
    })?;

    let fs_arr = mat.find_by_name("fs").ok_or_else(|| missing(path, "fs"))?;
    let fs = numeric_values(fs_arr.data())
        .and_then(|v| v.first().copied())
        .ok_or_else(|| missing(path, "fs"))?;

    let data_arr = mat.find_by_name("data").ok_or_else(|| missing(path, "data"))?;
    let size = data_arr.size();
    if size.len() != 2 {
        return Err(ElecPhysError::format(format!(
            "{}: 'data' must be 2-D, found {} dimensions",
            path.display(),
            size.len()
        )));
    }
    let flat = numeric_values(data_arr.data()).ok_or_else(|| {
        ElecPhysError::format(format!("{}: unsupported 'data' element type", path.display()))
    })?;
    column_major_record(path, &flat, size[0], size[1], fs)
}

/// MAT v7.3: `data` is stored transposed, as an HDF5 `[samples, channels]`
/// dataset.
#[cfg(feature = "mat73")]
fn read_mat73_record(path: &Path) -> Result<TimeSeriesRecord> {
    let h5_error = |e: hdf5::Error| {
        ElecPhysError::format(format!("{}: not a readable MAT v7.3 (HDF5) file: {}", path.display(), e))
    };
    let file = hdf5::File::open(path).map_err(h5_error)?;

    let fs = file
        .dataset("fs")
        .and_then(|ds| ds.read_raw::<f64>())
        .ok()
        .and_then(|v| v.first().copied())
        .ok_or_else(|| missing(path, "fs"))?;

    let data = file.dataset("data").map_err(|_| missing(path, "data"))?;
    let shape = data.shape();
    if shape.len() != 2 {
        return Err(ElecPhysError::format(format!(
            "{}: 'data' must be 2-D, found {} dimensions",
            path.display(),
            shape.len()
        )));
    }
    let flat = data.read_raw::<f64>().map_err(h5_error)?;
    column_major_record(path, &flat, shape[1], shape[0], fs)
}

#[cfg(not(feature = "mat73"))]
fn read_mat73_record(path: &Path) -> Result<TimeSeriesRecord> {
    Err(ElecPhysError::format(format!(
        "{}: MAT v7.3 (HDF5) support not enabled. Rebuild with --features mat73",
        path.display()
    )))
}

/// Convert a MAT record into `<output_dir>/<stem>.npz`, notch filtering at
/// `notch_freq` first unless it is 0.
pub fn convert_mat_to_npz(
    mat_path: &Path,
    output_dir: &Path,
    notch_freq: f64,
    quality: f64,
) -> Result<PathBuf> {
    let mut record = read_mat_record(mat_path)?;
    if notch_freq != 0.0 {
        let spec = FilterSpec::notch(notch_freq, quality)?;
        record = notch_filter(&record, &spec)?;
    }

    fs::create_dir_all(output_dir)?;
    let stem = mat_path
        .file_stem()
        .ok_or_else(|| ElecPhysError::validation(format!("{} has no file name", mat_path.display())))?;
    let out = output_dir.join(format!("{}.npz", stem.to_string_lossy()));
    write_record(&out, &record)?;
    log::info!("Converted {} -> {}", mat_path.display(), out.display());
    Ok(out)
}
