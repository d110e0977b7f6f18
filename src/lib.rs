pub mod app;
pub mod cli;
pub mod config;
pub mod duration;
pub mod logging;
pub mod midi;
pub mod playback;
pub mod ui;

pub use app::{run, PlayRequest};
pub use duration::sequence_length;
pub use playback::{drive_playback, PlayerSession, PollSettings};
