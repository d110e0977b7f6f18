//! Built-in software synthesizer
//!
//! Used when the sequence is not bound to a MIDI output port. A small
//! polyphonic voice bank renders sine voices (and noise bursts for the
//! drum channel) into the default audio output device via cpal.

use super::message::MidiMessage;
use super::service::{MidiError, Result};
use super::sink::MidiSink;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use log::{debug, error, info};
use std::f32::consts::TAU;
use std::sync::{Arc, Mutex};

/// Display name of the built-in synthesizer
pub const SYNTH_NAME: &str = "Built-in Software Synthesizer";

const MAX_VOICES: usize = 48;
const DRUM_CHANNEL: u8 = 9;
const ATTACK_SECONDS: f32 = 0.005;
const RELEASE_SECONDS: f32 = 0.08;
const DRUM_DECAY_SECONDS: f32 = 0.12;
const BEND_RANGE_SEMITONES: f32 = 2.0;

const CC_VOLUME: u8 = 7;
const CC_ALL_SOUND_OFF: u8 = 120;
const CC_ALL_NOTES_OFF: u8 = 123;

struct Voice {
    channel: u8,
    note: u8,
    phase: f32,
    phase_step: f32,
    level: f32,
    envelope: f32,
    releasing: bool,
    drum: bool,
    noise: u32,
}

#[derive(Clone, Copy)]
struct ChannelState {
    volume: f32,
    bend_ratio: f32,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            volume: 100.0 / 127.0,
            bend_ratio: 1.0,
        }
    }
}

/// Voice allocation and sample rendering, independent of the audio device
pub struct VoiceBank {
    sample_rate: f32,
    gain: f32,
    voices: Vec<Voice>,
    channels: [ChannelState; 16],
}

impl VoiceBank {
    pub fn new(sample_rate: f32, gain: f32) -> Self {
        Self {
            sample_rate,
            gain,
            voices: Vec::with_capacity(MAX_VOICES),
            channels: [ChannelState::default(); 16],
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn handle(&mut self, msg: &MidiMessage) {
        match *msg {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity: 0,
            } => self.note_off(channel, note),
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => self.note_on(channel, note, velocity),
            MidiMessage::NoteOff { channel, note, .. } => self.note_off(channel, note),
            MidiMessage::ControlChange {
                channel,
                controller: CC_VOLUME,
                value,
            } => {
                self.channel_mut(channel).volume = f32::from(value) / 127.0;
            }
            MidiMessage::ControlChange {
                channel,
                controller: CC_ALL_SOUND_OFF | CC_ALL_NOTES_OFF,
                ..
            }
            | MidiMessage::AllNotesOff { channel } => self.release_channel(channel),
            MidiMessage::PitchBend { channel, value } => {
                let offset = (f32::from(value) - 8192.0) / 8192.0;
                self.channel_mut(channel).bend_ratio =
                    2f32.powf(offset * BEND_RANGE_SEMITONES / 12.0);
            }
            _ => {}
        }
    }

    fn channel_mut(&mut self, channel: u8) -> &mut ChannelState {
        &mut self.channels[usize::from(channel & 0x0F)]
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        if self.voices.len() >= MAX_VOICES {
            // Steal the oldest voice
            self.voices.remove(0);
        }

        let frequency = 440.0 * 2f32.powf((f32::from(note) - 69.0) / 12.0);
        let drum = channel & 0x0F == DRUM_CHANNEL;
        self.voices.push(Voice {
            channel: channel & 0x0F,
            note,
            phase: 0.0,
            phase_step: frequency / self.sample_rate,
            level: f32::from(velocity) / 127.0,
            envelope: if drum { 1.0 } else { 0.0 },
            releasing: false,
            drum,
            noise: 0x9E37_79B9 ^ u32::from(note),
        });
    }

    fn note_off(&mut self, channel: u8, note: u8) {
        let channel = channel & 0x0F;
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| v.channel == channel && v.note == note && !v.drum)
        {
            voice.releasing = true;
        }
    }

    fn release_channel(&mut self, channel: u8) {
        let channel = channel & 0x0F;
        for voice in self.voices.iter_mut().filter(|v| v.channel == channel) {
            voice.releasing = true;
        }
    }

    /// Renders one mono sample in -1.0..=1.0
    pub fn next_sample(&mut self) -> f32 {
        let attack_step = 1.0 / (ATTACK_SECONDS * self.sample_rate);
        let release_step = 1.0 / (RELEASE_SECONDS * self.sample_rate);
        let drum_step = 1.0 / (DRUM_DECAY_SECONDS * self.sample_rate);

        let mut mix = 0.0;
        for voice in self.voices.iter_mut() {
            let channel = self.channels[usize::from(voice.channel)];

            let raw = if voice.drum {
                voice.envelope -= drum_step;
                // xorshift32
                voice.noise ^= voice.noise << 13;
                voice.noise ^= voice.noise >> 17;
                voice.noise ^= voice.noise << 5;
                (voice.noise as f32 / u32::MAX as f32) * 2.0 - 1.0
            } else {
                if voice.releasing {
                    voice.envelope -= release_step;
                } else {
                    voice.envelope = (voice.envelope + attack_step).min(1.0);
                }
                let sample = (voice.phase * TAU).sin();
                voice.phase = (voice.phase + voice.phase_step * channel.bend_ratio).fract();
                sample
            };

            mix += raw * voice.envelope.max(0.0) * voice.level * channel.volume;
        }

        self.voices
            .retain(|v| v.envelope > 0.0 || (!v.drum && !v.releasing));

        (mix * self.gain).clamp(-1.0, 1.0)
    }
}

/// Sends messages into a running [`SoftSynth`]
pub struct SynthSink {
    voices: Arc<Mutex<VoiceBank>>,
}

impl MidiSink for SynthSink {
    fn send(&mut self, msg: &MidiMessage) -> Result<()> {
        let mut bank = self
            .voices
            .lock()
            .map_err(|_| MidiError::AudioError("synthesizer state poisoned".to_string()))?;
        bank.handle(msg);
        Ok(())
    }
}

/// Owns the audio stream; dropping it closes the audio device
pub struct SoftSynth {
    _stream: cpal::Stream,
    voices: Arc<Mutex<VoiceBank>>,
}

impl SoftSynth {
    /// Opens the default audio output device and starts rendering silence
    pub fn open(gain: f32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| MidiError::AudioError("no default audio output device".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| MidiError::AudioError(format!("Failed to get default config: {}", e)))?;

        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.config();
        info!(
            "Starting software synthesizer on '{}': {} Hz, {} channels, {:?}",
            device.name().unwrap_or_default(),
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        let voices = Arc::new(Mutex::new(VoiceBank::new(config.sample_rate.0 as f32, gain)));
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, voices.clone())?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, voices.clone())?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, voices.clone())?,
            other => {
                return Err(MidiError::AudioError(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };
        stream
            .play()
            .map_err(|e| MidiError::AudioError(e.to_string()))?;
        debug!("Audio stream playing");

        Ok(Self {
            _stream: stream,
            voices,
        })
    }

    pub fn sink(&self) -> SynthSink {
        SynthSink {
            voices: Arc::clone(&self.voices),
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    voices: Arc<Mutex<VoiceBank>>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| match voices.try_lock() {
                Ok(mut bank) => {
                    for frame in data.chunks_mut(channels) {
                        let value = T::from_sample(bank.next_sample());
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                }
                // Never block the audio thread
                Err(_) => {
                    for sample in data.iter_mut() {
                        *sample = T::EQUILIBRIUM;
                    }
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| MidiError::AudioError(e.to_string()))
}
