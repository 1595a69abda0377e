//! Bench simulator for the telemetry sampler
//!
//! Serves three line sources on consecutive TCP ports and a virtual
//! actuator on UDP. Usage: `sampler-sim [BASE_PORT]` (default 4000); the
//! actuator listens on the base port and sources on the next three.

use anyhow::{Context, Result};
use sampler_sim::{
    run_line_source, run_virtual_actuator, OutputParameters, Signal, SourceKind, VirtualActuator,
    VirtualSourceConfig, Waveform,
};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sampler_sim=info,sampler_protocol=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_port: u16 = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .with_context(|| format!("invalid base port {arg:?}"))?,
        None => 4000,
    };

    let (state_tx, state_rx) = watch::channel(OutputParameters::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let socket = UdpSocket::bind(("127.0.0.1", base_port))
        .await
        .with_context(|| format!("failed to bind actuator port {base_port}"))?;
    let actuator = tokio::spawn(run_virtual_actuator(
        socket,
        VirtualActuator::new("actuator"),
        state_tx,
        shutdown_rx.clone(),
    ));

    let mut out1 = VirtualSourceConfig::signal("out1", Signal::new(Waveform::Sine, 1.0, 1.0), 10);
    out1.kind = SourceKind::Actuated(Signal::new(Waveform::Sine, 1.0, 1.0));
    let out2 = VirtualSourceConfig::signal("out2", Signal::new(Waveform::Square, 0.5, 2.0), 15);
    let out3 = VirtualSourceConfig::signal(
        "out3",
        Signal::new(Waveform::Triangle, 0.2, 2.5).with_offset(2.5),
        10,
    );

    let mut sources = Vec::new();
    for (offset, config) in (1u16..).zip([out1, out2, out3]) {
        let port = base_port
            .checked_add(offset)
            .context("base port too high for three sources")?;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind source port {port}"))?;
        sources.push(tokio::spawn(run_line_source(
            listener,
            config,
            state_rx.clone(),
            shutdown_rx.clone(),
        )));
    }

    tracing::info!("Simulator running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    let _ = shutdown_tx.send(true);
    for source in sources {
        source.await?.context("line source failed")?;
    }
    let actuator = actuator.await?.context("actuator failed")?;
    tracing::info!(
        "Actuator received {} messages, rejected {}",
        actuator.received().len(),
        actuator.rejected()
    );

    Ok(())
}
