//! Async tasks serving virtual sources and the virtual actuator
//!
//! Each task runs until its shutdown channel changes or its sender is
//! dropped. The actuator publishes the parameters of
//! [`ObjectId::OUTPUT_1`](sampler_protocol::ObjectId::OUTPUT_1) on a watch
//! channel so actuated sources can follow them.

use std::io;
use std::time::{Duration, Instant};

use sampler_protocol::ObjectId;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::actuator::{OutputParameters, VirtualActuator};
use crate::source::{VirtualSource, VirtualSourceConfig};

/// Run the virtual actuator on `socket`
///
/// Returns the actuator on shutdown so callers can inspect what it received.
pub async fn run_virtual_actuator(
    socket: UdpSocket,
    mut actuator: VirtualActuator,
    state_tx: watch::Sender<OutputParameters>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<VirtualActuator> {
    let mut buf = [0u8; 64];

    info!(
        "Starting virtual actuator {} on {}",
        actuator.id(),
        socket.local_addr()?
    );

    if let Some(params) = actuator.parameters(ObjectId::OUTPUT_1) {
        state_tx.send_replace(params);
    }

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (n, from) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        // Port unreachable from an earlier reply; keep serving
                        debug!("Virtual actuator {} receive error: {}", actuator.id(), e);
                        continue;
                    }
                };

                let Ok((reply, changed)) = actuator.process_datagram(&buf[..n]) else {
                    continue;
                };

                if changed {
                    if let Some(params) = actuator.parameters(ObjectId::OUTPUT_1) {
                        debug!(
                            "Virtual actuator {} state changed: frequency={}, amplitude={}",
                            actuator.id(), params.frequency, params.amplitude
                        );
                        state_tx.send_replace(params);
                    }
                }

                if let Some(reply) = reply {
                    if let Err(e) = socket.send_to(&reply, from).await {
                        warn!("Virtual actuator {} reply to {} failed: {}", actuator.id(), from, e);
                    }
                }
            }

            _ = shutdown.changed() => {
                info!("Shutdown requested for virtual actuator {}", actuator.id());
                break;
            }
        }
    }

    Ok(actuator)
}

/// Accept clients on `listener` and stream lines from `config` to each
pub async fn run_line_source(
    listener: TcpListener,
    config: VirtualSourceConfig,
    params: watch::Receiver<OutputParameters>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let start = Instant::now();
    info!(
        "Starting virtual source {} on {}",
        config.id,
        listener.local_addr()?
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                debug!("Virtual source {} accepted {}", config.id, peer);
                tokio::spawn(serve_client(
                    stream,
                    VirtualSource::new(config.clone()),
                    start,
                    params.clone(),
                    shutdown.clone(),
                ));
            }

            _ = shutdown.changed() => {
                info!("Shutdown requested for virtual source {}", config.id);
                return Ok(());
            }
        }
    }
}

async fn serve_client(
    mut stream: TcpStream,
    mut source: VirtualSource,
    start: Instant,
    params: watch::Receiver<OutputParameters>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_millis(source.config().interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if source.exhausted() {
                    debug!("Virtual source {} closing after {} lines", source.id(), source.lines_sent());
                    break;
                }
                let current = *params.borrow();
                let line = source.next_line(start.elapsed().as_secs_f64(), current);
                if let Err(e) = stream.write_all(line.as_bytes()).await {
                    debug!("Virtual source {} client gone: {}", source.id(), e);
                    break;
                }
            }

            _ = shutdown.changed() => break,
        }
    }

    let _ = stream.shutdown().await;
}
