use std::error::Error;
use std::fmt;
use std::path::Path;

/// Position in a sequence's native time basis (beats), not wall-clock seconds
pub type MusicTime = f64;

/// Custom error type for sequencing and playback operations
#[derive(Debug, Clone, PartialEq)]
pub enum MidiError {
    /// The file could not be read or is not a valid Standard MIDI File
    LoadError { path: String, reason: String },
    /// The requested output destination does not exist
    DeviceIndexOutOfRange { index: usize, available: usize },
    /// Error when enumerating or connecting to a MIDI device
    ConnectionError(String),
    /// Error when sending a MIDI message
    SendError(String),
    /// A track length query failed or produced an unusable value
    TrackLengthError { index: usize, reason: String },
    /// The player refused a start/stop/time request
    PlayerError(String),
    /// The player stopped advancing while playback was still due
    Stalled { time: MusicTime, waited_ms: u128 },
    /// Playback was interrupted by the user
    Interrupted,
    /// Error when opening or driving the audio output
    AudioError(String),
    /// Error when writing progress output
    IoError(String),
}

impl fmt::Display for MidiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiError::LoadError { path, reason } => {
                write!(f, "cannot load sequence '{}': {}", path, reason)
            }
            MidiError::DeviceIndexOutOfRange { index, available } => write!(
                f,
                "device index {} out of range ({} destinations available)",
                index, available
            ),
            MidiError::ConnectionError(msg) => write!(f, "MIDI connection error: {}", msg),
            MidiError::SendError(msg) => write!(f, "MIDI send error: {}", msg),
            MidiError::TrackLengthError { index, reason } => {
                write!(f, "cannot read length of track {}: {}", index, reason)
            }
            MidiError::PlayerError(msg) => write!(f, "player error: {}", msg),
            MidiError::Stalled { time, waited_ms } => write!(
                f,
                "playback stalled at {:.6} (no progress for {} ms)",
                time, waited_ms
            ),
            MidiError::Interrupted => write!(f, "playback interrupted"),
            MidiError::AudioError(msg) => write!(f, "audio output error: {}", msg),
            MidiError::IoError(msg) => write!(f, "output error: {}", msg),
        }
    }
}

impl Error for MidiError {}

impl From<std::io::Error> for MidiError {
    fn from(err: std::io::Error) -> Self {
        MidiError::IoError(err.to_string())
    }
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, MidiError>;

/// The sequencing service playback is built on: file loading, output
/// routing, track inspection and player creation.
pub trait SequenceService {
    type Sequence;
    type Destination;
    type Player: Player;

    /// Parses the file at `path` into a sequence
    fn load_sequence(&mut self, path: &Path) -> Result<Self::Sequence>;

    /// Enumerates MIDI output destinations in a stable order
    fn list_output_destinations(&self) -> Result<Vec<Self::Destination>>;

    fn display_name(&self, destination: &Self::Destination) -> Result<String>;

    /// Routes the sequence's events to `destination` instead of the built-in synthesizer
    fn bind_output(
        &mut self,
        sequence: &mut Self::Sequence,
        destination: &Self::Destination,
    ) -> Result<()>;

    fn track_count(&self, sequence: &Self::Sequence) -> Result<usize>;

    /// Length of track `index` in sequence time
    fn track_length(&self, sequence: &Self::Sequence, index: usize) -> Result<MusicTime>;

    /// Creates a stopped player that owns `sequence`
    fn create_player(&mut self, sequence: Self::Sequence) -> Result<Self::Player>;
}

/// An active playback session bound to one sequence
pub trait Player {
    /// Scales playback speed; 1.0 plays at the file's tempo
    fn set_play_rate(&mut self, rate: f64) -> Result<()>;

    /// Acquires output resources ahead of `start`
    fn preroll(&mut self) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Current playback position in sequence time
    fn current_time(&self) -> Result<MusicTime>;
}
