//! In-memory sequence parsed from a Standard MIDI File
//!
//! Every track chunk of the file becomes a [`Track`] holding its channel
//! events positioned in beats. The exception is the conductor track of a
//! format 1 file (a first chunk without channel events), which only feeds
//! tempo. Set Tempo meta events from all tracks are collected into a single
//! [`TempoMap`].

use super::message::MidiMessage;
use super::service::{MidiError, MusicTime, Result};
use super::tempo::TempoMap;
use log::debug;
use midly::{Format, MetaMessage, Smf, Timing, TrackEventKind};

/// Beats per second assumed when converting SMPTE-timed files
const TIMECODE_BEATS_PER_SECOND: f64 = 2.0;

/// A channel message positioned in sequence time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedMessage {
    pub time: MusicTime,
    pub message: MidiMessage,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    events: Vec<TimedMessage>,
    length: MusicTime,
}

impl Track {
    pub fn events(&self) -> &[TimedMessage] {
        &self.events
    }

    /// Position of the last event, End of Track excluded
    pub fn length(&self) -> MusicTime {
        self.length
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    tracks: Vec<Track>,
    tempo_map: TempoMap,
}

impl Sequence {
    /// Parses raw SMF bytes. `source` only labels errors.
    pub fn from_bytes(source: &str, data: &[u8]) -> Result<Self> {
        let smf = Smf::parse(data).map_err(|e| MidiError::LoadError {
            path: source.to_string(),
            reason: e.to_string(),
        })?;

        let to_beats: Box<dyn Fn(u64) -> MusicTime> = match smf.header.timing {
            Timing::Metrical(tpb) => {
                let ticks_per_beat = f64::from(tpb.as_int().max(1));
                Box::new(move |tick| tick as f64 / ticks_per_beat)
            }
            Timing::Timecode(fps, ticks_per_frame) => {
                let ticks_per_second = (f64::from(fps.as_f32()) * f64::from(ticks_per_frame)).max(1.0);
                Box::new(move |tick| tick as f64 / ticks_per_second * TIMECODE_BEATS_PER_SECOND)
            }
        };
        let metrical = matches!(smf.header.timing, Timing::Metrical(_));
        let has_conductor = smf.header.format == Format::Parallel
            && smf.tracks.first().map_or(false, |first| {
                !first
                    .iter()
                    .any(|e| matches!(e.kind, TrackEventKind::Midi { .. }))
            });

        let mut tempo_changes = Vec::new();
        let mut tracks = Vec::with_capacity(smf.tracks.len());

        for (index, raw_track) in smf.tracks.iter().enumerate() {
            let mut track = Track::default();
            let mut tick: u64 = 0;

            for event in raw_track {
                tick += u64::from(event.delta.as_int());
                let time = to_beats(tick);

                match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        track.events.push(TimedMessage {
                            time,
                            message: MidiMessage::from_track_event(channel, message),
                        });
                    }
                    TrackEventKind::Meta(MetaMessage::EndOfTrack) => continue,
                    TrackEventKind::Meta(MetaMessage::Tempo(micros)) if metrical => {
                        tempo_changes.push((time, micros.as_int()));
                    }
                    _ => {}
                }
                track.length = time;
            }

            if has_conductor && index == 0 {
                debug!("{}: conductor track ends at beat {}", source, track.length);
                continue;
            }
            tracks.push(track);
        }

        let tempo_map = if metrical {
            TempoMap::from_changes(tempo_changes)
        } else {
            TempoMap::constant(1.0 / TIMECODE_BEATS_PER_SECOND)
        };

        Ok(Sequence { tracks, tempo_map })
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    /// All channel events of all tracks in time order; ties keep track order
    pub fn merged_events(&self) -> Vec<TimedMessage> {
        let mut events: Vec<TimedMessage> = self
            .tracks
            .iter()
            .flat_map(|t| t.events.iter().copied())
            .collect();
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        events
    }
}
