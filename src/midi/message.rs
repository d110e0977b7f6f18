use midly::num::u4;

/// Controller number for the All Notes Off channel mode message
const ALL_NOTES_OFF: u8 = 123;

/// A channel voice message scheduled for output
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiMessage {
    /// Note On message with note number and velocity
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note Off message with note number and velocity
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Polyphonic key pressure
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    /// Control Change message with controller number and value
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// Program Change message with program number
    ProgramChange { channel: u8, program: u8 },
    /// Channel pressure (aftertouch)
    ChannelPressure { channel: u8, pressure: u8 },
    /// 14-bit pitch bend, 8192 is centered
    PitchBend { channel: u8, value: u16 },
    /// Silences every sounding note on a channel
    AllNotesOff { channel: u8 },
}

impl MidiMessage {
    pub fn from_track_event(channel: u4, message: midly::MidiMessage) -> Self {
        let channel = channel.as_int();
        match message {
            midly::MidiMessage::NoteOn { key, vel } => MidiMessage::NoteOn {
                channel,
                note: key.as_int(),
                velocity: vel.as_int(),
            },
            midly::MidiMessage::NoteOff { key, vel } => MidiMessage::NoteOff {
                channel,
                note: key.as_int(),
                velocity: vel.as_int(),
            },
            midly::MidiMessage::Aftertouch { key, vel } => MidiMessage::PolyPressure {
                channel,
                note: key.as_int(),
                pressure: vel.as_int(),
            },
            midly::MidiMessage::Controller { controller, value } => MidiMessage::ControlChange {
                channel,
                controller: controller.as_int(),
                value: value.as_int(),
            },
            midly::MidiMessage::ProgramChange { program } => MidiMessage::ProgramChange {
                channel,
                program: program.as_int(),
            },
            midly::MidiMessage::ChannelAftertouch { vel } => MidiMessage::ChannelPressure {
                channel,
                pressure: vel.as_int(),
            },
            midly::MidiMessage::PitchBend { bend } => MidiMessage::PitchBend {
                channel,
                value: bend.0.as_int(),
            },
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. }
            | MidiMessage::AllNotesOff { channel } => channel,
        }
    }

    /// Encodes the message as wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | (channel & 0x0F), note, velocity],
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => vec![0x80 | (channel & 0x0F), note, velocity],
            MidiMessage::PolyPressure {
                channel,
                note,
                pressure,
            } => vec![0xA0 | (channel & 0x0F), note, pressure],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => vec![0xB0 | (channel & 0x0F), controller, value],
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![0xD0 | (channel & 0x0F), pressure]
            }
            MidiMessage::PitchBend { channel, value } => vec![
                0xE0 | (channel & 0x0F),
                (value & 0x7F) as u8,
                ((value >> 7) & 0x7F) as u8,
            ],
            MidiMessage::AllNotesOff { channel } => vec![0xB0 | (channel & 0x0F), ALL_NOTES_OFF, 0],
        }
    }
}
