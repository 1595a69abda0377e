//! Periodic test signals

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Shape of a periodic signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    /// Sine wave
    Sine,
    /// Symmetric triangle
    Triangle,
    /// 50% duty square wave
    Square,
    /// Rising ramp
    Sawtooth,
}

impl Waveform {
    /// Unit-amplitude value at `phase` cycles (only the fractional part matters)
    pub fn unit(&self, phase: f64) -> f64 {
        let p = phase.rem_euclid(1.0);
        match self {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Triangle => {
                if p < 0.5 {
                    4.0 * p - 1.0
                } else {
                    3.0 - 4.0 * p
                }
            }
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
        }
    }
}

/// A waveform with frequency, amplitude and DC offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Shape
    pub waveform: Waveform,
    /// Cycles per second
    pub frequency_hz: f64,
    /// Peak deviation from the offset
    pub amplitude: f64,
    /// DC offset
    pub offset: f64,
}

impl Signal {
    /// Create a signal centred on zero
    pub fn new(waveform: Waveform, frequency_hz: f64, amplitude: f64) -> Self {
        Self {
            waveform,
            frequency_hz,
            amplitude,
            offset: 0.0,
        }
    }

    /// Set the DC offset
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Value at `t` seconds
    pub fn sample(&self, t: f64) -> f64 {
        self.offset + self.amplitude * self.waveform.unit(self.frequency_hz * t)
    }
}
