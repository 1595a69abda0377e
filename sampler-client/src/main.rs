//! Telemetry Sampler Client
//!
//! Samples three line-oriented TCP sources every 20 ms, writes one JSON
//! record per tick to stdout and switches the actuator's parameter profile
//! when the control source crosses its threshold. Logs go to stderr.
//!
//! Usage: `sampler-client [SETTINGS.json]`

mod settings;

use anyhow::{Context, Result};
use sampler_engine::SamplerRuntime;
use settings::SettingsSource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Stdout carries telemetry only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sampler_client=info,sampler_engine=info,sampler_protocol=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (config, source) = settings::load()?;
    match &source {
        SettingsSource::Explicit(path) | SettingsSource::UserFile(path) => {
            tracing::info!("Loaded settings from {}", path.display())
        }
        SettingsSource::Defaults => tracing::info!("Using default settings"),
    }

    let mut runtime = SamplerRuntime::new(&config, std::io::stdout())
        .context("failed to start sampler")?;
    runtime.run().context("sampler loop failed")
}
