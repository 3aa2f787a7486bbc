//! Decoding of `tone` requests.
//!
//! The host does not synthesize sound. A cart's packed tone arguments are
//! decoded into a [`Tone`] and handed to an [`AudioSink`].

use std::sync::mpsc;

use log::{debug, warn};

/// One of the four sound channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Pulse1,
    Pulse2,
    Triangle,
    Noise,
}

impl Channel {
    fn from_tone_flags(flags: u32) -> Self {
        match flags & 0b11 {
            0 => Self::Pulse1,
            1 => Self::Pulse2,
            2 => Self::Triangle,
            _ => Self::Noise,
        }
    }
}

/// Pulse channel duty cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Duty {
    #[default]
    Eighth,
    Quarter,
    Half,
    ThreeQuarters,
}

impl Duty {
    fn from_tone_flags(flags: u32) -> Self {
        match (flags >> 2) & 0b11 {
            0 => Self::Eighth,
            1 => Self::Quarter,
            2 => Self::Half,
            _ => Self::ThreeQuarters,
        }
    }

    /// Fraction of the period the pulse is high.
    pub fn ratio(self) -> f32 {
        match self {
            Self::Eighth => 0.125,
            Self::Quarter => 0.25,
            Self::Half => 0.5,
            Self::ThreeQuarters => 0.75,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Pan {
    #[default]
    Center,
    Left,
    Right,
}

impl Pan {
    fn from_tone_flags(flags: u32) -> Self {
        match (flags >> 4) & 0b11 {
            1 => Self::Left,
            2 => Self::Right,
            _ => Self::Center,
        }
    }
}

/// A decoded `tone` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tone {
    pub channel: Channel,
    pub duty: Duty,
    pub pan: Pan,
    /// Frequency in Hz at the start of the tone.
    pub start_frequency: u16,
    /// Frequency in Hz the tone slides to, 0 for a constant pitch.
    pub end_frequency: u16,
    pub attack_frames: u8,
    pub decay_frames: u8,
    pub sustain_frames: u8,
    pub release_frames: u8,
    pub sustain_volume: u8,
    pub peak_volume: u8,
}

impl Tone {
    /// Unpack the four `tone` arguments.
    ///
    /// * `frequency`: start in the low half, end in the high half.
    /// * `duration`: sustain, release, decay and attack frames from the low byte up.
    /// * `volume`: sustain volume in the low byte, peak volume in the next.
    /// * `flags`: channel in bits 0-1, duty in bits 2-3, pan in bits 4-5.
    pub fn decode(frequency: u32, duration: u32, volume: u32, flags: u32) -> Self {
        Self {
            channel: Channel::from_tone_flags(flags),
            duty: Duty::from_tone_flags(flags),
            pan: Pan::from_tone_flags(flags),
            start_frequency: frequency as u16,
            end_frequency: (frequency >> 16) as u16,
            attack_frames: (duration >> 24) as u8,
            decay_frames: (duration >> 16) as u8,
            sustain_frames: duration as u8,
            release_frames: (duration >> 8) as u8,
            sustain_volume: volume as u8,
            peak_volume: (volume >> 8) as u8,
        }
    }

    /// The frequency to slide to, if the tone sweeps.
    pub fn sweep(&self) -> Option<u16> {
        (self.end_frequency != 0).then_some(self.end_frequency)
    }

    /// Length of the whole envelope in frames.
    pub fn total_frames(&self) -> u32 {
        self.attack_frames as u32
            + self.decay_frames as u32
            + self.sustain_frames as u32
            + self.release_frames as u32
    }
}

/// Receives decoded tones.
pub trait AudioSink {
    fn play(&mut self, tone: Tone);
}

/// Drops every tone.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, tone: Tone) {
        debug!("no audio output, dropping {:?}", tone);
    }
}

/// Records tones in order.
impl AudioSink for Vec<Tone> {
    fn play(&mut self, tone: Tone) {
        self.push(tone);
    }
}

/// Forwards tones to an audio thread.
impl AudioSink for mpsc::Sender<Tone> {
    fn play(&mut self, tone: Tone) {
        if let Err(e) = self.send(tone) {
            warn!("sending tone to audio output failed ({})", e);
        }
    }
}
