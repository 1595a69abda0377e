//! Integration tests for the sampler runtime
//!
//! These tests run the real single-threaded loop against the simulator's
//! TCP sources and UDP actuator on loopback and verify:
//! - Telemetry lines land on tick boundaries with the sentinel for stale sources
//! - Threshold crossings on the control source reach the actuator
//! - Dropped sources are retried after the reconnect interval
//! - Actuator replies are drained when asked for

use std::time::{Duration, Instant};

use sampler_engine::{ResponseMode, SamplerRuntime, TickOutput, NO_DATA};
use sampler_protocol::{ControlMessage, ObjectId, Property};
use sampler_sim::{Signal, VirtualSourceConfig, Waveform};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use std::io;
    use std::net::SocketAddr;

    use sampler_engine::{ResponseMode, SamplerConfig, SourceConfig};
    use sampler_sim::{
        run_line_source, run_virtual_actuator, OutputParameters, VirtualActuator,
        VirtualSourceConfig,
    };
    use tokio::net::{TcpListener, UdpSocket};
    use tokio::runtime::Runtime;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;

    /// Simulated sources and actuator running on a background runtime
    pub struct Bench {
        rt: Runtime,
        shutdown: watch::Sender<bool>,
        actuator: JoinHandle<io::Result<VirtualActuator>>,
        pub config: SamplerConfig,
    }

    impl Bench {
        /// Start one listener per source plus the actuator, all on ephemeral ports
        pub fn start(sources: Vec<VirtualSourceConfig>, responses: ResponseMode) -> Self {
            let rt = Runtime::new().unwrap();
            let (state_tx, state_rx) = watch::channel(OutputParameters::default());
            let (shutdown, shutdown_rx) = watch::channel(false);

            let (socket, listeners) = rt.block_on(async {
                let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
                let mut listeners = Vec::new();
                for _ in &sources {
                    listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
                }
                (socket, listeners)
            });

            let actuator_addr = socket.local_addr().unwrap();
            let mut source_configs = Vec::new();
            for (listener, source) in listeners.into_iter().zip(sources) {
                let addr: SocketAddr = listener.local_addr().unwrap();
                source_configs.push(SourceConfig::new(source.id.clone(), addr));
                rt.spawn(run_line_source(
                    listener,
                    source,
                    state_rx.clone(),
                    shutdown_rx.clone(),
                ));
            }

            let actuator = rt.spawn(run_virtual_actuator(
                socket,
                VirtualActuator::new("bench"),
                state_tx,
                shutdown_rx,
            ));

            let mut config = SamplerConfig {
                sources: source_configs,
                actuator_addr,
                ..Default::default()
            };
            config.control.responses = responses;

            Self {
                rt,
                shutdown,
                actuator,
                config,
            }
        }

        /// Stop every task and hand back the actuator
        pub fn finish(self) -> VirtualActuator {
            // Let the last datagrams arrive
            std::thread::sleep(std::time::Duration::from_millis(100));
            self.shutdown.send(true).unwrap();
            self.rt.block_on(self.actuator).unwrap().unwrap()
        }
    }

    /// Control source that sits below 3.0 for `half` lines, then above
    pub fn square_script(half: usize) -> VirtualSourceConfig {
        let values = std::iter::repeat("1.0")
            .take(half)
            .chain(std::iter::repeat("5.0").take(half));
        VirtualSourceConfig::script("out3", values, 10)
    }

    /// Position of `needle` as a contiguous run inside `haystack`
    pub fn find_run<T: PartialEq>(haystack: &[T], needle: &[T]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }
}

use helpers::*;

fn drive<W: std::io::Write>(runtime: &mut SamplerRuntime<W>, duration: Duration) -> Vec<TickOutput> {
    let mut ticks = Vec::new();
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        if let Some(output) = runtime.run_once().unwrap() {
            ticks.push(output);
        }
    }
    ticks
}

fn sources() -> Vec<VirtualSourceConfig> {
    vec![
        VirtualSourceConfig::signal("out1", Signal::new(Waveform::Sine, 1.0, 1.0), 10),
        VirtualSourceConfig::signal("out2", Signal::new(Waveform::Square, 0.5, 2.0), 45),
        square_script(10),
    ]
}

// ============================================================================
// Telemetry
// ============================================================================

#[test]
fn test_telemetry_lines_on_tick_boundaries() {
    let bench = Bench::start(sources(), ResponseMode::Ignore);
    let mut runtime = SamplerRuntime::new(&bench.config, Vec::new()).unwrap();

    let ticks = drive(&mut runtime, Duration::from_millis(600));
    bench.finish();

    let text = String::from_utf8(runtime.emitter().get_ref().clone()).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), ticks.len());
    assert!(lines.len() >= 20, "only {} lines", lines.len());

    let mut last = 0;
    for (raw, line) in text.lines().zip(&lines) {
        let positions: Vec<usize> = ["\"timestamp\"", "\"out1\"", "\"out2\"", "\"out3\""]
            .iter()
            .map(|key| raw.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "field order in {raw}");

        let object = line.as_object().unwrap();
        let timestamp = object["timestamp"].as_u64().unwrap();
        assert_eq!(timestamp % 20, 0);
        assert!(timestamp > last);
        last = timestamp;

        for label in ["out1", "out2", "out3"] {
            assert!(object[label].is_string());
        }
    }

    // Every source delivered something, and out2 (45 ms) misses some ticks
    for label in ["out1", "out2", "out3"] {
        assert!(
            ticks.iter().any(|t| t.record.get(label) != Some(NO_DATA)),
            "{label} never sampled"
        );
    }
    assert!(ticks.iter().any(|t| t.record.get("out2") == Some(NO_DATA)));
}

// ============================================================================
// Control
// ============================================================================

#[test]
fn test_threshold_crossings_reach_actuator() {
    let bench = Bench::start(sources(), ResponseMode::Ignore);
    let mut runtime = SamplerRuntime::new(&bench.config, Vec::new()).unwrap();

    let ticks = drive(&mut runtime, Duration::from_millis(1000));
    let actuator = bench.finish();

    let transitions: Vec<_> = ticks.iter().filter_map(|t| t.transition).collect();
    assert!(transitions.len() >= 2, "only {} transitions", transitions.len());
    assert_eq!(runtime.engine().transitions(), transitions.len() as u64);
    assert_eq!(runtime.control_client().sent(), 4 * transitions.len() as u64);

    let above = [
        ControlMessage::write(ObjectId::OUTPUT_1, Property::Frequency, 1000),
        ControlMessage::write(ObjectId::OUTPUT_1, Property::Amplitude, 8000),
        ControlMessage::read(ObjectId::OUTPUT_1, Property::Frequency),
        ControlMessage::read(ObjectId::OUTPUT_1, Property::Amplitude),
    ];
    let below = [
        ControlMessage::write(ObjectId::OUTPUT_1, Property::Frequency, 2000),
        ControlMessage::write(ObjectId::OUTPUT_1, Property::Amplitude, 4000),
        ControlMessage::read(ObjectId::OUTPUT_1, Property::Frequency),
        ControlMessage::read(ObjectId::OUTPUT_1, Property::Amplitude),
    ];

    let received = actuator.received();
    assert_eq!(received.len(), 4 * transitions.len());
    assert!(find_run(received, &above).is_some());
    assert!(find_run(received, &below).is_some());
    assert_eq!(actuator.rejected(), 0);
}

#[test]
fn test_drain_mode_reads_verification_replies() {
    let bench = Bench::start(sources(), ResponseMode::Drain);
    let mut runtime = SamplerRuntime::new(&bench.config, Vec::new()).unwrap();

    drive(&mut runtime, Duration::from_millis(1000));
    bench.finish();

    // Replies to the last transition may still be in flight
    let transitions = runtime.engine().transitions();
    let received = runtime.control_client().received();
    assert!(transitions >= 2);
    assert!(received >= 2 * (transitions - 1), "{received} replies for {transitions} transitions");
    assert!(received <= 2 * transitions);
}

// ============================================================================
// Reconnection
// ============================================================================

#[test]
fn test_closed_source_reconnects_after_interval() {
    let mut flaky = VirtualSourceConfig::script("out1", ["7.5"], 10);
    flaky.close_after = Some(3);
    let bench = Bench::start(
        vec![
            flaky,
            VirtualSourceConfig::script("out2", ["0.5"], 10),
            square_script(10),
        ],
        ResponseMode::Ignore,
    );
    let mut runtime = SamplerRuntime::new(&bench.config, Vec::new()).unwrap();

    runtime.run_once().unwrap();
    let first_attempt = runtime.streams()[0].last_connect_attempt().unwrap();

    let ticks = drive(&mut runtime, Duration::from_millis(1500));
    bench.finish();

    let second_attempt = runtime.streams()[0].last_connect_attempt().unwrap();
    assert!(second_attempt >= first_attempt + 1000);

    // Values arrived on both connections, with a gap of sentinels between
    let first_gap = ticks
        .iter()
        .position(|t| t.record.timestamp > first_attempt + 200)
        .unwrap();
    let before: Vec<_> = ticks[..first_gap]
        .iter()
        .filter(|t| t.record.get("out1") == Some("7.5"))
        .collect();
    let after: Vec<_> = ticks
        .iter()
        .filter(|t| t.record.timestamp >= second_attempt)
        .filter(|t| t.record.get("out1") == Some("7.5"))
        .collect();
    assert!(!before.is_empty());
    assert!(!after.is_empty());

    let quiet = ticks
        .iter()
        .filter(|t| t.record.timestamp > first_attempt + 200 && t.record.timestamp < second_attempt)
        .all(|t| t.record.get("out1") == Some(NO_DATA));
    assert!(quiet);

    // The steady source was never dropped
    assert!(runtime.streams()[1].is_connected());
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use proptest::prelude::*;
    use sampler_engine::{ControlConfig, SamplerEngine};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Writes always come in frequency/amplitude pairs for the profile
        /// matching the side crossed to
        #[test]
        fn transitions_emit_matching_profile(values in prop::collection::vec(0.0f64..6.0, 1..60)) {
            let config = ControlConfig::default();
            let mut engine = SamplerEngine::new(&config);

            for (i, value) in values.iter().enumerate() {
                let text = format!("{value:.3}");
                let samples = [("out1", None), ("out2", None), ("out3", Some(text.as_str()))];
                let output = engine.tick(20 * (i as u64 + 1), &samples);

                match output.transition {
                    Some(t) => {
                        prop_assert_eq!(output.messages.len(), 4);
                        let expected = if t.profile == config.above { 1000 } else { 2000 };
                        prop_assert_eq!(output.messages[0].value(), Some(expected));
                    }
                    None => prop_assert!(output.messages.is_empty()),
                }
            }
        }
    }
}
