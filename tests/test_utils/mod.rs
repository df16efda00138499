#![allow(dead_code)]

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use elecphys::TimeSeriesRecord;

pub fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_elecphys"))
}

pub fn run_elecphys<I, S>(args: I) -> std::process::Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(get_binary_path())
        .args(args)
        .output()
        .expect("Failed to execute elecphys")
}

/// `amplitude * sin(2π f t)` sampled at `fs`
pub fn sine(freq: f64, amplitude: f64, fs: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / fs).sin())
        .collect()
}

/// Sum of sinusoids given as `(freq, amplitude)` pairs
pub fn mixture(components: &[(f64, f64)], fs: f64, n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n];
    for &(freq, amp) in components {
        for (o, s) in out.iter_mut().zip(sine(freq, amp, fs, n)) {
            *o += s;
        }
    }
    out
}

/// One channel per component list
pub fn sine_record(channels: &[&[(f64, f64)]], fs: f64, n: usize) -> TimeSeriesRecord {
    let samples = channels.iter().map(|c| mixture(c, fs, n)).collect();
    TimeSeriesRecord::new(samples, fs).expect("valid synthetic record")
}

/// Energy `|X(f)|²` of a single DFT bin at `freq`, computed directly
pub fn bin_energy(signal: &[f64], fs: f64, freq: f64) -> f64 {
    let (mut re, mut im) = (0.0, 0.0);
    for (i, &x) in signal.iter().enumerate() {
        let phase = 2.0 * PI * freq * i as f64 / fs;
        re += x * phase.cos();
        im -= x * phase.sin();
    }
    re * re + im * im
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn push_element(buf: &mut Vec<u8>, data_type: u32, payload: &[u8]) {
    buf.extend_from_slice(&data_type.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    while buf.len() % 8 != 0 {
        buf.push(0);
    }
}

fn matrix_element(name: &str, rows: usize, cols: usize, column_major: &[f64]) -> Vec<u8> {
    const MI_INT8: u32 = 1;
    const MI_INT32: u32 = 5;
    const MI_UINT32: u32 = 6;
    const MI_DOUBLE: u32 = 9;
    const MX_DOUBLE_CLASS: u32 = 6;

    let mut body = Vec::new();
    let flags: Vec<u8> = [MX_DOUBLE_CLASS, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
    push_element(&mut body, MI_UINT32, &flags);
    let dims: Vec<u8> = [rows as i32, cols as i32]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    push_element(&mut body, MI_INT32, &dims);
    push_element(&mut body, MI_INT8, name.as_bytes());
    let real: Vec<u8> = column_major.iter().flat_map(|v| v.to_le_bytes()).collect();
    push_element(&mut body, MI_DOUBLE, &real);
    body
}

/// Write a little-endian MATLAB v5 file holding `data` (`[channels, samples]`)
/// and a scalar `fs`.
pub fn write_mat_v5(path: &Path, channels: &[Vec<f64>], fs: f64) {
    const MI_MATRIX: u32 = 14;

    let mut out = Vec::with_capacity(256);
    let mut text = b"MATLAB 5.0 MAT-file, written by elecphys tests".to_vec();
    text.resize(116, b' ');
    out.extend_from_slice(&text);
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&0x0100u16.to_le_bytes());
    out.extend_from_slice(b"IM");

    let rows = channels.len();
    let cols = channels.first().map_or(0, Vec::len);
    let column_major: Vec<f64> = (0..cols)
        .flat_map(|c| channels.iter().map(move |ch| ch[c]))
        .collect();
    push_element(&mut out, MI_MATRIX, &matrix_element("data", rows, cols, &column_major));
    push_element(&mut out, MI_MATRIX, &matrix_element("fs", 1, 1, &[fs]));

    fs::write(path, out).expect("write MAT fixture");
}

/// Write a MATLAB v7.3 (HDF5) file. MATLAB stores the `[channels, samples]`
/// matrix transposed, as a `[samples, channels]` dataset.
#[cfg(feature = "mat73")]
pub fn write_mat_v73(path: &Path, channels: &[Vec<f64>], fs: f64) {
    let rows = channels.len();
    let cols = channels.first().map_or(0, Vec::len);
    let column_major: Vec<f64> = (0..cols)
        .flat_map(|c| channels.iter().map(move |ch| ch[c]))
        .collect();

    let file = hdf5::File::create(path).expect("create HDF5 fixture");
    file.new_dataset::<f64>()
        .shape([cols, rows])
        .create("data")
        .expect("create data")
        .write_raw(&column_major)
        .expect("write data");
    file.new_dataset::<f64>()
        .shape([1, 1])
        .create("fs")
        .expect("create fs")
        .write_raw(&[fs])
        .expect("write fs");
}

/// Bytes laid out like a MAT v7.3 file: a 512-byte user block, then the
/// HDF5 signature, then `body`.
pub fn hdf5_shaped_bytes(body: &[u8]) -> Vec<u8> {
    let mut out = b"MATLAB 7.3 MAT-file, written by elecphys tests".to_vec();
    out.resize(512, 0);
    out.extend_from_slice(b"\x89HDF\r\n\x1a\n");
    out.extend_from_slice(body);
    out
}
