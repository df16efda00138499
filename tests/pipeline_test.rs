// tests/pipeline_test.rs
//
// End-to-end numerical properties of the conditioning, spectral and
// band-power stages on synthetic records.

mod test_utils;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use test_utils::*;

use elecphys::core::analysis::{
    butterworth_filter, dft, normalize_min_max, notch_filter, re_reference, stft,
    stft_frame_count, zscore_normalize,
};
use elecphys::core::dsp::WindowFunction;
use elecphys::{
    AggregationMode, BandPowerAggregator, BandPreset, FilterSpec, FrequencyBand, PipelineBuilder,
    ReferenceSpec, WindowSpec,
};

#[test]
fn test_notch_removes_line_noise_and_keeps_signal() {
    let fs = 1000.0;
    let record = sine_record(&[&[(50.0, 1.0)], &[(10.0, 1.0)]], fs, 1000);
    let spec = FilterSpec::notch(50.0, 30.0).unwrap();
    let filtered = notch_filter(&record, &spec).unwrap();

    let hum_before = bin_energy(record.channel(0).unwrap(), fs, 50.0);
    let hum_after = bin_energy(filtered.channel(0).unwrap(), fs, 50.0);
    assert!(
        hum_after < 0.1 * hum_before,
        "50 Hz energy only dropped from {:.3} to {:.3}",
        hum_before,
        hum_after
    );

    let alpha_before = bin_energy(record.channel(1).unwrap(), fs, 10.0);
    let alpha_after = bin_energy(filtered.channel(1).unwrap(), fs, 10.0);
    assert_relative_eq!(alpha_after, alpha_before, max_relative = 0.02);
}

#[test]
fn test_notch_on_mixture_reduces_interference_by_order_of_magnitude() {
    let fs = 500.0;
    let record = sine_record(&[&[(60.0, 2.0), (7.0, 1.0)]], fs, 2500);
    let spec = FilterSpec::notch(60.0, 30.0).unwrap();
    let filtered = notch_filter(&record, &spec).unwrap();
    let before = record.channel(0).unwrap();
    let after = filtered.channel(0).unwrap();

    assert!(bin_energy(after, fs, 60.0) * 10.0 < bin_energy(before, fs, 60.0));
    assert_relative_eq!(
        bin_energy(after, fs, 7.0),
        bin_energy(before, fs, 7.0),
        max_relative = 0.02
    );
}

#[test]
fn test_normalize_is_idempotent() {
    let record = sine_record(&[&[(3.0, 5.0), (11.0, 0.7)], &[(20.0, 0.1)]], 200.0, 400);
    let once = normalize_min_max(&record, -1.0, 1.0).unwrap();
    let twice = normalize_min_max(&once, -1.0, 1.0).unwrap();

    for (a, b) in once.channels().iter().zip(twice.channels()) {
        for (x, y) in a.iter().zip(b) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }
    let ch0 = once.channel(0).unwrap();
    assert_abs_diff_eq!(ch0.iter().copied().fold(f64::INFINITY, f64::min), -1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(ch0.iter().copied().fold(f64::NEG_INFINITY, f64::max), 1.0, epsilon = 1e-12);
}

#[test]
fn test_zscore_gives_unit_statistics() {
    let mut record = sine_record(&[&[(4.0, 3.0)], &[(9.0, 0.2), (1.0, 1.5)]], 128.0, 512);
    let shifted: Vec<Vec<f64>> = record
        .channels()
        .iter()
        .map(|ch| ch.iter().map(|v| v + 40.0).collect())
        .collect();
    record = elecphys::TimeSeriesRecord::new(shifted, 128.0).unwrap();

    let z = zscore_normalize(&record).unwrap();
    for ch in z.channels() {
        assert_abs_diff_eq!(mean(ch), 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(population_std(ch), 1.0, epsilon = 1e-10);
    }
}

#[test]
fn test_constant_channel_cannot_be_normalized() {
    let record = elecphys::TimeSeriesRecord::new(vec![vec![2.0; 64], sine(5.0, 1.0, 64.0, 64)], 64.0)
        .unwrap();
    assert!(zscore_normalize(&record).unwrap_err().is_validation());
    assert!(normalize_min_max(&record, -1.0, 1.0).unwrap_err().is_validation());
}

#[test]
fn test_reference_channel_becomes_zero() {
    let record = sine_record(&[&[(5.0, 1.0)], &[(7.0, 2.0)], &[(13.0, 0.5)]], 100.0, 300);
    let out = re_reference(&record, &ReferenceSpec::to_channel(1)).unwrap();
    assert!(out.channel(1).unwrap().iter().all(|&v| v == 0.0));

    for i in [0, 2] {
        let expected: Vec<f64> = record
            .channel(i)
            .unwrap()
            .iter()
            .zip(record.channel(1).unwrap())
            .map(|(a, b)| a - b)
            .collect();
        for (x, y) in out.channel(i).unwrap().iter().zip(&expected) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_dft_peak_tracks_frequency_and_amplitude() {
    let fs = 256.0;
    for &amp in &[0.5, 2.0] {
        let record = sine_record(&[&[(16.0, amp)]], fs, 256);
        let frame = dft(&record).unwrap();
        assert_eq!(frame.frame_count(), 1);

        let magnitudes: Vec<f64> = frame.values()[0].iter().map(|row| row[0].norm()).collect();
        let (peak, value) = magnitudes
            .iter()
            .enumerate()
            .fold((0, 0.0), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        assert_eq!(frame.frequencies()[peak], 16.0);
        assert_abs_diff_eq!(value, amp / 2.0, epsilon = 1e-9);
    }
}

#[test]
fn test_stft_frame_count_matches_formula() {
    let record = sine_record(&[&[(10.0, 1.0)], &[(3.0, 1.0)]], 100.0, 1000);
    let window = WindowSpec::new(1.0, 0.5, WindowFunction::Hann).unwrap();
    let frame = stft(&record, &window).unwrap();

    assert_eq!(stft_frame_count(1000, 100, 50).unwrap(), 19);
    assert_eq!(frame.frame_count(), 19);
    assert_eq!(frame.channel_count(), 2);
    assert_eq!(frame.bin_count(), 51);
    assert_abs_diff_eq!(frame.times()[0], 0.5, epsilon = 1e-12);

    assert!(stft_frame_count(50, 100, 50).unwrap_err().is_validation());
    let short = sine_record(&[&[(10.0, 1.0)]], 100.0, 50);
    assert!(stft(&short, &window).unwrap_err().is_validation());
}

#[test]
fn test_band_power_grows_with_band_width() {
    let record = sine_record(
        &[&[(2.0, 1.0), (6.0, 0.4), (10.0, 0.8), (21.0, 0.3)], &[(35.0, 1.0), (11.5, 0.2)]],
        200.0,
        2000,
    );
    let window = WindowSpec::default();
    let nested = vec![
        FrequencyBand::new("alpha", 8.0, 13.0).unwrap(),
        FrequencyBand::new("mid", 4.0, 30.0).unwrap(),
        FrequencyBand::new("wide", 0.5, 80.0).unwrap(),
    ];
    let series = BandPowerAggregator::new(nested)
        .mode(AggregationMode::AllChannels)
        .compute_from_record(&record, &window)
        .unwrap();

    for ch in 0..2 {
        let per_band: Vec<_> = series.iter().filter(|s| s.channel == Some(ch)).collect();
        assert_eq!(per_band.len(), 3);
        for pair in per_band.windows(2) {
            for (small, large) in pair[0].power.iter().zip(&pair[1].power) {
                assert!(large >= small);
            }
        }
    }
}

#[test]
fn test_cutoff_at_nyquist_is_rejected() {
    let record = sine_record(&[&[(10.0, 1.0)]], 100.0, 500);
    let spec = FilterSpec::lowpass(4, 50.0).unwrap();
    assert!(butterworth_filter(&record, &spec).unwrap_err().is_validation());
}

#[test]
fn test_configured_pipeline_finds_alpha() {
    let fs = 250.0;
    let record = sine_record(
        &[&[(10.0, 2.0), (50.0, 3.0)], &[(10.0, 1.0), (50.0, 3.0), (25.0, 0.1)]],
        fs,
        5000,
    );
    let config = PipelineBuilder::new()
        .preset(BandPreset::Canonical)
        .filter(Some(FilterSpec::bandpass(4, 1.0, 45.0).unwrap()))
        .build()
        .unwrap();
    let output = config.pipeline().unwrap().process(&record).unwrap();

    assert_eq!(output.band_power.len(), 5);
    let mean_of = |label: &str| {
        output
            .band_power
            .iter()
            .find(|s| s.band_label == label)
            .map(|s| s.mean_power())
            .unwrap()
    };
    let alpha = mean_of("alpha");
    for other in ["delta", "theta", "beta", "gamma"] {
        assert!(alpha > 10.0 * mean_of(other), "alpha should dominate {}", other);
    }
}
