//! Offline analyzer for sampler telemetry
//!
//! Usage: `sampler-analyze [FILE]`. Reads JSON lines from FILE, or from
//! stdin when FILE is omitted or `-`, and prints one report per source.
//! Pass `--json` to print the reports as one JSON object instead.

use std::fs::File;
use std::io::{self, BufReader};

use anyhow::{Context, Result};
use sampler_sim::analysis::{analyze_capture, parse_capture, Capture};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sampler_sim=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut json = false;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            _ => path = Some(arg),
        }
    }

    let capture = read_capture(path.as_deref())?;
    let reports = analyze_capture(&capture);

    if json {
        let object: serde_json::Map<String, serde_json::Value> = reports
            .into_iter()
            .map(|(label, report)| serde_json::to_value(report).map(|value| (label, value)))
            .collect::<Result<_, _>>()?;
        println!("{}", serde_json::to_string_pretty(&object)?);
        return Ok(());
    }

    println!(
        "{} records from {} to {}",
        capture.timestamps.len(),
        capture.timestamps.first().copied().unwrap_or_default(),
        capture.timestamps.last().copied().unwrap_or_default()
    );
    for (label, report) in reports {
        println!("--- {label} ---");
        let Some(r) = report else {
            println!("no signal");
            continue;
        };
        println!("Estimated sampling rate: {:.3} Hz", r.sample_rate_hz);
        println!("Dominant frequency: {:.6} Hz", r.dominant_hz);
        println!("Peak-to-peak amplitude: {:.6}", r.peak_to_peak);
        println!("RMS: {:.6}", r.rms);
        println!("Shape: {} (decay exponent {:.3})", r.shape, r.decay_exponent);
        let harmonics: Vec<String> = r.harmonics.iter().map(|h| format!("{h:.6}")).collect();
        println!("Harmonics: [{}]", harmonics.join(", "));
    }

    Ok(())
}

fn read_capture(path: Option<&str>) -> Result<Capture> {
    match path {
        None | Some("-") => {
            parse_capture(io::stdin().lock()).context("failed to read telemetry from stdin")
        }
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
            parse_capture(BufReader::new(file))
                .with_context(|| format!("failed to read telemetry from {path}"))
        }
    }
}
