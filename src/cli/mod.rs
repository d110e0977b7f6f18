use crate::midi::{MidiError, Result};
use clap::Parser;
use dialoguer::Select;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The MIDI file to play
    pub file: Option<PathBuf>,

    /// Zero-based MIDI output destination number. The built-in software
    /// synthesizer is used when omitted.
    pub device_number: Option<usize>,

    /// Playback speed multiplier, from 0.01 to 100
    #[arg(short, long, default_value_t = 1.0, value_parser = parse_tempo)]
    pub tempo: f64,

    /// List available MIDI output destinations
    #[arg(long)]
    pub list_devices: bool,

    /// Choose the MIDI output destination from a menu
    #[arg(long)]
    pub select_device: bool,

    /// Show a progress bar instead of a time counter
    #[arg(long)]
    pub progress_bar: bool,

    /// Settings file (defaults to ./playmidi.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Slowest accepted playback speed multiplier
pub const MIN_TEMPO: f64 = 0.01;
/// Fastest accepted playback speed multiplier
pub const MAX_TEMPO: f64 = 100.0;

fn parse_tempo(raw: &str) -> std::result::Result<f64, String> {
    let tempo: f64 = raw
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if (MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
        Ok(tempo)
    } else {
        Err(format!(
            "tempo must be between {} and {}, got {}",
            MIN_TEMPO, MAX_TEMPO, raw
        ))
    }
}

/// Program name as invoked, for the usage line
pub fn program_name() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| "playmidi".to_string())
}

pub fn usage(program: &str) -> String {
    format!("usage: {} <file> [<device-number>]", program)
}

pub fn validate_device_index(index: usize, available: usize) -> Result<()> {
    if index >= available {
        return Err(MidiError::DeviceIndexOutOfRange { index, available });
    }
    Ok(())
}

/// One numbered line per destination
pub fn format_device_list(names: &[String]) -> Vec<String> {
    if names.is_empty() {
        return vec!["  (none)".to_string()];
    }
    names
        .iter()
        .enumerate()
        .map(|(index, name)| format!("  {}: {}", index, name))
        .collect()
}

/// Interactive destination picker; `None` keeps the built-in synthesizer
pub fn prompt_for_device(names: &[String]) -> Result<Option<usize>> {
    if names.is_empty() {
        log::warn!("No MIDI output destinations to choose from");
        return Ok(None);
    }
    Select::new()
        .with_prompt("MIDI output destination (Esc for the built-in synthesizer)")
        .items(names)
        .default(0)
        .interact_opt()
        .map_err(|e| MidiError::ConnectionError(format!("device selection failed: {}", e)))
}
