// src/io/export.rs
//
// Tabular band-power export and filter-response JSON.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::write_atomic;
use crate::core::dsp::FrequencyResponse;
use crate::core::params::FilterSpec;
use crate::core::record::BandPowerSeries;
use crate::error::{ElecPhysError, Result};

/// Write band-power series as a CSV table: a `time` column followed by one
/// column per series. All series must share one time axis.
pub fn write_band_power_csv(path: &Path, series: &[BandPowerSeries]) -> Result<()> {
    let first = series
        .first()
        .ok_or_else(|| ElecPhysError::validation("no band-power series to export"))?;
    if let Some(other) = series.iter().find(|s| s.times != first.times) {
        return Err(ElecPhysError::validation(format!(
            "series '{}' does not share the time axis of '{}'",
            other.column_name(),
            first.column_name()
        )));
    }

    write_atomic(path, |file| {
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));
        let mut header = vec!["time".to_string()];
        header.extend(series.iter().map(|s| s.column_name()));
        writer.write_record(&header)?;

        for (row, t) in first.times.iter().enumerate() {
            let mut record = vec![t.to_string()];
            record.extend(series.iter().map(|s| s.power[row].to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// JSON document written for a filter response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResponseExport {
    pub frequency_grid: Vec<f64>,
    pub magnitude_db: Vec<f64>,
    pub filter: FilterSpec,
    pub fs: f64,
}

impl FilterResponseExport {
    pub fn new(filter: FilterSpec, fs: f64, response: FrequencyResponse) -> Self {
        Self {
            frequency_grid: response.frequency_grid,
            magnitude_db: response.magnitude_db,
            filter,
            fs,
        }
    }
}

pub fn write_filter_response_json(path: &Path, export: &FilterResponseExport) -> Result<()> {
    write_atomic(path, |file| {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, export)?;
        writer.flush()?;
        Ok(())
    })
}

pub fn read_filter_response_json(path: &Path) -> Result<FilterResponseExport> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(label: &str, channel: Option<usize>, power: Vec<f64>) -> BandPowerSeries {
        BandPowerSeries {
            band_label: label.to_string(),
            channel,
            times: vec![0.5, 1.0],
            power,
        }
    }

    #[test]
    fn test_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bp.csv");
        let rows = vec![
            series("alpha", Some(0), vec![1.0, 2.0]),
            series("alpha", Some(3), vec![0.25, 0.5]),
        ];
        write_band_power_csv(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,ch0_alpha,ch3_alpha");
        assert_eq!(lines[1], "0.5,1,0.25");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_csv_rejects_mismatched_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bp.csv");
        let mut b = series("beta", None, vec![1.0]);
        b.times = vec![0.5];
        let err = write_band_power_csv(&path, &[series("alpha", None, vec![1.0, 2.0]), b])
            .unwrap_err();
        assert!(err.is_validation());
        assert!(!path.exists());
    }
}
