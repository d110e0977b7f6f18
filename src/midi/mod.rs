//! MIDI sequencing for playmidi
//!
//! This module provides the sequencing service playback is driven through:
//! - The [`SequenceService`] and [`Player`] traits and the [`MidiError`] type
//! - Standard MIDI File parsing into beat-positioned tracks via midly
//! - Output to MIDI ports via midir, or to the built-in software synthesizer
//! - A scripted mock service for testing
//!
//! The main components are:
//! - [`MidirService`] for real files, ports and audio output
//! - [`SequencePlayer`] for wall-clock timed dispatch of a sequence
//! - [`MockService`] for testing
//!
mod message;
mod sequence;
mod service;
mod sink;
mod synth;
mod tempo;
pub mod midir_service;
pub mod mock_service;
pub mod player;

// Re-export main types from service
pub use service::{MidiError, MusicTime, Player, Result, SequenceService};

pub use message::MidiMessage;
pub use sequence::{Sequence, TimedMessage, Track};
pub use sink::MidiSink;
pub use synth::{SoftSynth, VoiceBank, SYNTH_NAME};
pub use tempo::TempoMap;

// Re-export concrete implementations
pub use midir_service::{LoadedSequence, MidiDestination, MidirService};
pub use mock_service::{MockClock, MockPlayer, MockSequence, MockService};
pub use player::{OutputRoute, SequencePlayer};

// Set default service type
pub type DefaultSequenceService = MidirService;
