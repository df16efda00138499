// src/io/npz.rs
//
// NumPy `.npz` containers for records (`data`, `fs`) and spectral frames
// (`f`, `t`, `Zxx`).

use ndarray::{arr0, Array0, Array1, Array2, Array3, Dimension, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError, ReadableElement};
use num_complex::Complex64;
use std::fs::File;
use std::path::Path;

use super::write_atomic;
use crate::core::record::{SpectralFrame, TimeSeriesRecord};
use crate::error::{ElecPhysError, Result};

fn open(path: &Path) -> Result<NpzReader<File>> {
    let file = File::open(path)?;
    NpzReader::new(file).map_err(|e| npz_error(path, e))
}

fn npz_error(path: &Path, err: ReadNpzError) -> ElecPhysError {
    ElecPhysError::format(format!("{}: {}", path.display(), err))
}

/// Archive entry for `name`, with or without the `.npy` suffix
fn entry_name(npz: &mut NpzReader<File>, path: &Path, name: &str) -> Result<String> {
    let names = npz.names().map_err(|e| npz_error(path, e))?;
    let with_suffix = format!("{}.npy", name);
    names
        .into_iter()
        .find(|n| n == name || *n == with_suffix)
        .ok_or_else(|| {
            ElecPhysError::format(format!("{}: missing '{}' array", path.display(), name))
        })
}

fn read_array<A, D>(
    npz: &mut NpzReader<File>,
    path: &Path,
    name: &str,
) -> Result<ndarray::ArrayBase<OwnedRepr<A>, D>>
where
    A: ReadableElement,
    D: Dimension,
{
    let entry = entry_name(npz, path, name)?;
    npz.by_name(&entry)
        .map_err(|e| ElecPhysError::format(format!("{}: '{}': {}", path.display(), name, e)))
}

/// Sampling rate stored as a 0-d or single-element array of float or int.
fn read_fs(npz: &mut NpzReader<File>, path: &Path) -> Result<f64> {
    if let Ok(v) = read_array::<f64, _>(npz, path, "fs").map(|a: Array0<f64>| a.into_scalar()) {
        return Ok(v);
    }
    if let Ok(v) = read_array::<i64, _>(npz, path, "fs").map(|a: Array0<i64>| a.into_scalar()) {
        return Ok(v as f64);
    }
    let arr: Array1<f64> = read_array(npz, path, "fs")?;
    match arr.as_slice() {
        Some([v]) => Ok(*v),
        _ => Err(ElecPhysError::format(format!(
            "{}: 'fs' must be a scalar, found {} values",
            path.display(),
            arr.len()
        ))),
    }
}

/// Load a record from an `.npz` holding `data` (`[channels, samples]`) and `fs`.
pub fn read_record(path: &Path) -> Result<TimeSeriesRecord> {
    let mut npz = open(path)?;
    let data: Array2<f64> = match read_array(&mut npz, path, "data") {
        Ok(data) => data,
        Err(_) => read_array::<f32, _>(&mut npz, path, "data")
            .map(|a: Array2<f32>| a.mapv(f64::from))?,
    };
    let fs = read_fs(&mut npz, path)?;

    let samples = data.outer_iter().map(|row| row.to_vec()).collect();
    let record = TimeSeriesRecord::new(samples, fs)
        .map_err(|e| ElecPhysError::format(format!("{}: {}", path.display(), e)))?;
    log::debug!(
        "Loaded {}: {} channel(s) x {} sample(s) at {} Hz",
        path.display(),
        record.channel_count(),
        record.sample_count(),
        fs
    );
    Ok(record)
}

pub fn write_record(path: &Path, record: &TimeSeriesRecord) -> Result<()> {
    let flat: Vec<f64> = record.channels().iter().flatten().copied().collect();
    let data = Array2::from_shape_vec((record.channel_count(), record.sample_count()), flat)
        .map_err(|e| ElecPhysError::format(e.to_string()))?;

    write_atomic(path, |file| {
        let mut npz = NpzWriter::new(file);
        npz.add_array("data", &data)?;
        npz.add_array("fs", &arr0(record.fs()))?;
        npz.finish()?;
        Ok(())
    })
}

/// Load a spectral frame from an `.npz` holding `f`, `t` and complex `Zxx`
/// (`[channels, f, t]`).
pub fn read_spectral(path: &Path) -> Result<SpectralFrame> {
    let mut npz = open(path)?;
    let f: Array1<f64> = read_array(&mut npz, path, "f")?;
    let t: Array1<f64> = read_array(&mut npz, path, "t")?;
    let zxx: Array3<Complex64> = read_array(&mut npz, path, "Zxx")?;

    let values = zxx
        .outer_iter()
        .map(|ch| ch.outer_iter().map(|row| row.to_vec()).collect())
        .collect();
    SpectralFrame::new(f.to_vec(), t.to_vec(), values)
        .map_err(|e| ElecPhysError::format(format!("{}: {}", path.display(), e)))
}

pub fn write_spectral(path: &Path, frame: &SpectralFrame) -> Result<()> {
    let shape = (frame.channel_count(), frame.bin_count(), frame.frame_count());
    let flat: Vec<Complex64> = frame
        .values()
        .iter()
        .flat_map(|ch| ch.iter().flatten().copied())
        .collect();
    let zxx = Array3::from_shape_vec(shape, flat)
        .map_err(|e| ElecPhysError::format(e.to_string()))?;
    let f = Array1::from(frame.frequencies().to_vec());
    let t = Array1::from(frame.times().to_vec());

    write_atomic(path, |file| {
        let mut npz = NpzWriter::new(file);
        npz.add_array("f", &f)?;
        npz.add_array("t", &t)?;
        npz.add_array("Zxx", &zxx)?;
        npz.finish()?;
        Ok(())
    })
}
