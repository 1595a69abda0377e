//! Offline analysis of recorded telemetry
//!
//! Reads the JSON lines the sampler writes and estimates, for each source,
//! the sampling rate, dominant frequency, peak-to-peak amplitude, RMS and a
//! coarse waveform shape from the first eight harmonics.
//!
//! Sentinel values (`"--"`) and anything else that is not a number become
//! gaps. Gaps are filled by linear interpolation between neighbouring
//! samples before the series is resampled onto a uniform grid and passed
//! through an FFT.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, BufRead};

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Number of harmonics examined for the shape estimate
pub const HARMONICS: usize = 8;

/// Field carrying the tick timestamp
const TIMESTAMP_FIELD: &str = "timestamp";

/// Harmonics weaker than this fraction of the strongest count as absent
const HARMONIC_FLOOR: f64 = 1e-9;

/// Errors from reading a capture
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("no telemetry records found")]
    Empty,
}

/// Recorded telemetry, one column per source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    /// Tick timestamps (ms since epoch)
    pub timestamps: Vec<u64>,
    /// Source labels in sorted order
    pub labels: Vec<String>,
    /// One series per label; `None` marks a gap
    pub series: Vec<Vec<Option<f64>>>,
    /// Lines that were not telemetry records
    pub skipped: usize,
}

impl Capture {
    /// Series recorded for `label`
    pub fn column(&self, label: &str) -> Option<&[Option<f64>]> {
        let i = self.labels.iter().position(|l| l == label)?;
        Some(&self.series[i])
    }
}

/// Coarse waveform classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    /// No harmonic content at all
    Flat,
    /// Fundamental dominates every other harmonic
    SineLike,
    /// Odd harmonics falling off roughly as 1/n
    SquareLike,
    /// Harmonics falling off at least as fast as 1/n^1.5
    TriangleLike,
    /// Odd and even harmonics falling off roughly as 1/n
    SawtoothLike,
    /// None of the above
    Unknown,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Flat => "flat",
            Shape::SineLike => "sine-like",
            Shape::SquareLike => "square-like",
            Shape::TriangleLike => "triangle-like",
            Shape::SawtoothLike => "sawtooth-like",
            Shape::Unknown => "complex/unknown",
        };
        f.write_str(name)
    }
}

/// Measurements for one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReport {
    /// Sampling rate estimated from the median timestamp step (Hz)
    pub sample_rate_hz: f64,
    /// Frequency of the strongest non-DC bin (Hz)
    pub dominant_hz: f64,
    /// Spread between the largest and smallest sample
    pub peak_to_peak: f64,
    /// Root mean square of the mean-removed series
    pub rms: f64,
    /// Amplitude at the bins nearest 1..=8 times the dominant frequency
    pub harmonics: Vec<f64>,
    /// Slope of log amplitude against log harmonic number
    pub decay_exponent: f64,
    /// Shape estimate
    pub shape: Shape,
}

/// Read a capture from JSON lines
///
/// Blank lines are ignored. Lines that are not JSON objects with a numeric
/// `timestamp` are counted in [`Capture::skipped`].
pub fn parse_capture<R: BufRead>(reader: R) -> Result<Capture, AnalysisError> {
    let mut records = Vec::new();
    let mut labels = BTreeSet::new();
    let mut skipped = 0;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                skipped += 1;
                continue;
            }
            Err(e) => {
                debug!("Skipping malformed line: {}", e);
                skipped += 1;
                continue;
            }
        };
        let Some(timestamp) = record.get(TIMESTAMP_FIELD).and_then(Value::as_u64) else {
            skipped += 1;
            continue;
        };

        labels.extend(
            record
                .keys()
                .filter(|k| k.as_str() != TIMESTAMP_FIELD)
                .cloned(),
        );
        records.push((timestamp, record));
    }

    if skipped > 0 {
        warn!("Skipped {} lines that were not telemetry records", skipped);
    }
    if records.is_empty() {
        return Err(AnalysisError::Empty);
    }

    let labels: Vec<String> = labels.into_iter().collect();
    let series = labels
        .iter()
        .map(|label| {
            records
                .iter()
                .map(|(_, record)| record.get(label).and_then(numeric))
                .collect()
        })
        .collect();

    Ok(Capture {
        timestamps: records.iter().map(|(t, _)| *t).collect(),
        labels,
        series,
        skipped,
    })
}

fn numeric(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Analyze one series sampled at `timestamps`
///
/// Returns `None` when the series has no values at all, when the
/// timestamps do not increase, or when fewer than four uniform samples
/// remain.
pub fn analyze_signal(timestamps: &[u64], values: &[Option<f64>]) -> Option<SignalReport> {
    let filled = fill_gaps(values)?;
    if timestamps.len() != filled.len() {
        return None;
    }

    let step_ms = median_step_ms(timestamps)?;
    let sample_rate_hz = 1000.0 / step_ms;

    let mut uniform = resample(timestamps, &filled, step_ms);
    let n = uniform.len();
    if n < 4 {
        return None;
    }
    let mean = uniform.iter().sum::<f64>() / n as f64;
    for x in &mut uniform {
        *x -= mean;
    }

    let spectrum = magnitude_spectrum(&uniform);
    let resolution = sample_rate_hz / n as f64;
    let peak = spectrum
        .iter()
        .enumerate()
        .skip(1)
        .fold((0, 0.0), |best, (i, &m)| if m > best.1 { (i, m) } else { best })
        .0;
    let dominant_hz = peak as f64 * resolution;

    let max = uniform.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = uniform.iter().copied().fold(f64::INFINITY, f64::min);
    let rms = (uniform.iter().map(|x| x * x).sum::<f64>() / n as f64).sqrt();

    let harmonics: Vec<f64> = if peak > 0 {
        let last = spectrum.len() - 1;
        (1..=HARMONICS)
            .map(|k| spectrum[(k * peak).min(last)])
            .collect()
    } else {
        vec![0.0; HARMONICS]
    };
    let decay_exponent = decay_exponent(&harmonics);

    Some(SignalReport {
        sample_rate_hz,
        dominant_hz,
        peak_to_peak: max - min,
        rms,
        shape: classify(&harmonics, decay_exponent),
        harmonics,
        decay_exponent,
    })
}

/// Analyze every column of a capture, in label order
pub fn analyze_capture(capture: &Capture) -> Vec<(String, Option<SignalReport>)> {
    capture
        .labels
        .iter()
        .zip(&capture.series)
        .map(|(label, series)| (label.clone(), analyze_signal(&capture.timestamps, series)))
        .collect()
}

/// Fill gaps by linear interpolation over sample index
///
/// Leading and trailing gaps take the nearest value. `None` if there are no
/// values at all.
fn fill_gaps(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    let (&(first_i, first_v), &(last_i, last_v)) = (known.first()?, known.last()?);

    let mut filled = Vec::with_capacity(values.len());
    let mut segment = 0;
    for i in 0..values.len() {
        let v = if i <= first_i {
            first_v
        } else if i >= last_i {
            last_v
        } else {
            while known[segment + 1].0 < i {
                segment += 1;
            }
            let (i0, v0) = known[segment];
            let (i1, v1) = known[segment + 1];
            v0 + (v1 - v0) * (i - i0) as f64 / (i1 - i0) as f64
        };
        filled.push(v);
    }
    Some(filled)
}

/// Median spacing of `timestamps`; a single sample counts as 100 ms
fn median_step_ms(timestamps: &[u64]) -> Option<f64> {
    if timestamps.len() < 2 {
        return Some(100.0);
    }
    let mut steps: Vec<f64> = timestamps
        .windows(2)
        .map(|w| w[1] as f64 - w[0] as f64)
        .collect();
    steps.sort_by(f64::total_cmp);

    let mid = steps.len() / 2;
    let median = if steps.len() % 2 == 0 {
        (steps[mid - 1] + steps[mid]) / 2.0
    } else {
        steps[mid]
    };
    (median > 0.0).then_some(median)
}

/// Linearly resample onto a grid of `step_ms` starting at the first sample
fn resample(timestamps: &[u64], values: &[f64], step_ms: f64) -> Vec<f64> {
    let start = timestamps[0];
    let times: Vec<f64> = timestamps.iter().map(|t| t.saturating_sub(start) as f64).collect();
    let span = times[times.len() - 1];
    let n = (span / step_ms).floor() as usize + 1;

    let mut out = Vec::with_capacity(n);
    let mut segment = 0;
    for i in 0..n {
        let t = i as f64 * step_ms;
        while segment + 1 < times.len() - 1 && times[segment + 1] <= t {
            segment += 1;
        }
        if times.len() == 1 {
            out.push(values[0]);
            continue;
        }
        let (t0, t1) = (times[segment], times[segment + 1]);
        let (v0, v1) = (values[segment], values[segment + 1]);
        let v = if t1 > t0 {
            v0 + (v1 - v0) * ((t - t0) / (t1 - t0)).clamp(0.0, 1.0)
        } else {
            v1
        };
        out.push(v);
    }
    out
}

/// Single-sided amplitude spectrum, bins `0..=n/2`
fn magnitude_spectrum(samples: &[f64]) -> Vec<f64> {
    let n = samples.len();
    let mut buffer: Vec<Complex<f64>> = samples.iter().map(|&x| Complex::new(x, 0.0)).collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let mut spectrum: Vec<f64> = buffer
        .iter()
        .take(n / 2 + 1)
        .map(|c| c.norm() * 2.0 / n as f64)
        .collect();
    spectrum[0] = 0.0;
    spectrum
}

/// Least-squares slope of ln(amplitude) over ln(n) for present harmonics
///
/// Zero when fewer than three harmonics are present.
fn decay_exponent(harmonics: &[f64]) -> f64 {
    let strongest = harmonics.iter().copied().fold(0.0, f64::max);
    let points: Vec<(f64, f64)> = harmonics
        .iter()
        .enumerate()
        .filter(|(_, &a)| strongest > 0.0 && a > strongest * HARMONIC_FLOOR)
        .map(|(i, &a)| (((i + 1) as f64).ln(), a.ln()))
        .collect();
    if points.len() < 3 {
        return 0.0;
    }

    let count = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / count;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / count;
    let covariance: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let variance: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    covariance / variance
}

fn classify(harmonics: &[f64], decay_exponent: f64) -> Shape {
    let strongest = harmonics.iter().copied().fold(0.0, f64::max);
    if strongest == 0.0 {
        return Shape::Flat;
    }

    let fundamental = harmonics[0];
    if harmonics[1..].iter().all(|h| h / (fundamental + 1e-12) < 0.2) {
        return Shape::SineLike;
    }

    // Index 0 is the first harmonic, so even indices hold odd harmonics
    let odd: f64 = harmonics.iter().step_by(2).sum();
    let even: f64 = harmonics.iter().skip(1).step_by(2).sum();
    if odd > 2.0 * even {
        if decay_exponent < -1.5 {
            Shape::TriangleLike
        } else {
            Shape::SquareLike
        }
    } else if decay_exponent < -1.5 {
        Shape::TriangleLike
    } else if decay_exponent < -0.7 {
        Shape::SawtoothLike
    } else {
        Shape::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::{Signal, Waveform};

    const START_MS: u64 = 1_700_000_000_000;

    /// Telemetry text for `signal` on `out1`, one line per 20 ms tick
    fn record(signal: Signal, ticks: usize, gap: impl Fn(usize) -> bool) -> String {
        let mut text = String::new();
        for i in 0..ticks {
            // Sample mid-step so square edges never land on a sample
            let t = (i as f64 + 0.5) * 0.02;
            let out1 = if gap(i) {
                "--".to_string()
            } else {
                format!("{:.6}", signal.sample(t))
            };
            text.push_str(&format!(
                "{{\"timestamp\":{},\"out1\":\"{}\",\"out2\":\"--\"}}\n",
                START_MS + 20 * i as u64,
                out1
            ));
        }
        text
    }

    fn report(signal: Signal) -> SignalReport {
        let capture = parse_capture(record(signal, 500, |_| false).as_bytes()).unwrap();
        analyze_signal(&capture.timestamps, capture.column("out1").unwrap()).unwrap()
    }

    #[test]
    fn test_parse_capture_columns_and_gaps() {
        let text = "\
{\"timestamp\":1000,\"out1\":\"0.5\",\"out2\":\"--\",\"out3\":\"3.1\"}

not json
[1, 2]
{\"out1\":\"1.0\"}
{\"timestamp\":1020,\"out1\":\"0.75\",\"out2\":\"2\",\"out3\":\"x\"}
";
        let capture = parse_capture(text.as_bytes()).unwrap();
        assert_eq!(capture.timestamps, vec![1000, 1020]);
        assert_eq!(capture.labels, vec!["out1", "out2", "out3"]);
        assert_eq!(capture.column("out1").unwrap(), &[Some(0.5), Some(0.75)]);
        assert_eq!(capture.column("out2").unwrap(), &[None, Some(2.0)]);
        assert_eq!(capture.column("out3").unwrap(), &[Some(3.1), None]);
        assert_eq!(capture.skipped, 3);
    }

    #[test]
    fn test_parse_capture_rejects_empty_input() {
        assert!(matches!(
            parse_capture("\n  \nnoise\n".as_bytes()),
            Err(AnalysisError::Empty)
        ));
    }

    #[test]
    fn test_sine_measurements() {
        let r = report(Signal::new(Waveform::Sine, 2.0, 4.0));
        assert!((r.sample_rate_hz - 50.0).abs() < 1e-9);
        assert!((r.dominant_hz - 2.0).abs() < 1e-9);
        assert!((r.peak_to_peak - 8.0).abs() < 0.05, "{}", r.peak_to_peak);
        assert!((r.rms - 4.0 / 2f64.sqrt()).abs() < 0.01, "{}", r.rms);
        assert!((r.harmonics[0] - 4.0).abs() < 0.01);
        assert_eq!(r.shape, Shape::SineLike);
    }

    #[test]
    fn test_offset_does_not_move_the_spectrum() {
        let r = report(Signal::new(Waveform::Sine, 1.0, 1.5).with_offset(2.5));
        assert!((r.dominant_hz - 1.0).abs() < 1e-9);
        assert!((r.peak_to_peak - 3.0).abs() < 0.05);
        assert_eq!(r.shape, Shape::SineLike);
    }

    #[test]
    fn test_square_and_sawtooth_shapes() {
        let square = report(Signal::new(Waveform::Square, 1.0, 2.0));
        assert!((square.dominant_hz - 1.0).abs() < 1e-9);
        assert!((square.peak_to_peak - 4.0).abs() < 1e-9);
        assert!((square.rms - 2.0).abs() < 1e-6);
        assert_eq!(square.shape, Shape::SquareLike);

        let sawtooth = report(Signal::new(Waveform::Sawtooth, 1.0, 1.0));
        assert!((sawtooth.dominant_hz - 1.0).abs() < 1e-9);
        assert_eq!(sawtooth.shape, Shape::SawtoothLike);
        assert!(sawtooth.decay_exponent < -0.7 && sawtooth.decay_exponent > -1.5);
    }

    #[test]
    fn test_gaps_are_interpolated() {
        let signal = Signal::new(Waveform::Sine, 2.0, 1.0);
        let text = record(signal, 500, |i| i % 7 == 3 || i < 2);
        let capture = parse_capture(text.as_bytes()).unwrap();
        let r = analyze_signal(&capture.timestamps, capture.column("out1").unwrap()).unwrap();
        assert!((r.dominant_hz - 2.0).abs() < 1e-9);
        assert!((r.peak_to_peak - 2.0).abs() < 0.1);
        assert_eq!(r.shape, Shape::SineLike);
    }

    #[test]
    fn test_all_gaps_is_no_signal() {
        let text = record(Signal::new(Waveform::Sine, 1.0, 1.0), 50, |_| false);
        let capture = parse_capture(text.as_bytes()).unwrap();
        let reports = analyze_capture(&capture);
        assert_eq!(reports.len(), 2);
        assert!(reports[0].1.is_some());
        assert_eq!(reports[1].0, "out2");
        assert!(reports[1].1.is_none());
    }

    #[test]
    fn test_constant_series_is_flat() {
        let timestamps: Vec<u64> = (0..20).map(|i| 20 * i).collect();
        let values = vec![Some(3.0); 20];
        let r = analyze_signal(&timestamps, &values).unwrap();
        assert_eq!(r.peak_to_peak, 0.0);
        assert_eq!(r.shape, Shape::Flat);
        assert!(r.harmonics.iter().all(|&h| h == 0.0));
    }

    #[test]
    fn test_too_short_or_unordered() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0)];
        assert!(analyze_signal(&[0, 20, 40], &values).is_none());
        let values = vec![Some(1.0); 6];
        assert!(analyze_signal(&[100, 80, 60, 40, 20, 0], &values).is_none());
    }

    #[test]
    fn test_fill_gaps() {
        let filled = fill_gaps(&[None, Some(1.0), None, None, Some(4.0), None]).unwrap();
        assert_eq!(filled, vec![1.0, 1.0, 2.0, 3.0, 4.0, 4.0]);
        assert!(fill_gaps(&[None, None]).is_none());
    }

    #[test]
    fn test_resample_uneven_timestamps() {
        let out = resample(&[0, 20, 60, 80], &[0.0, 2.0, 6.0, 8.0], 20.0);
        assert_eq!(out, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }
}
