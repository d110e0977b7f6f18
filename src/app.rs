use crate::cli::{validate_device_index, Args};
use crate::duration::sequence_length;
use crate::midi::{MidiError, Result, SequenceService, SYNTH_NAME};
use crate::playback::{drive_playback, PlaybackSummary, PlayerSession, PollSettings};
use crate::ui::ProgressReporter;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// First line printed on every invocation
pub const BANNER: &str = "pim (Playmidi IMproved)";

/// Exit status for playback cut short by Ctrl-C
pub const EXIT_INTERRUPTED: i32 = 130;

/// What a command line asks for, decided before any settings are read
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// No file and nothing else to do: print usage and exit 0
    Usage,
    ListDevices,
    Play(PathBuf),
}

pub fn invocation(args: &Args) -> Invocation {
    if args.list_devices {
        return Invocation::ListDevices;
    }
    match &args.file {
        Some(file) => Invocation::Play(file.clone()),
        None => Invocation::Usage,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub file: PathBuf,
    /// Destination index; `None` routes to the built-in synthesizer
    pub device_index: Option<usize>,
    pub tempo: f64,
}

/// Loads, routes, measures and plays one file, blocking until playback ends
pub fn run<S: SequenceService>(
    service: &mut S,
    request: &PlayRequest,
    poll: &PollSettings,
    progress: &mut dyn ProgressReporter,
    interrupted: &AtomicBool,
) -> Result<PlaybackSummary> {
    progress.line(&request.file.display().to_string())?;
    let mut sequence = service.load_sequence(&request.file)?;

    match request.device_index {
        Some(index) => {
            let destinations = service.list_output_destinations()?;
            validate_device_index(index, destinations.len())?;
            let destination = &destinations[index];
            progress.line(&service.display_name(destination)?)?;
            service.bind_output(&mut sequence, destination)?;
        }
        None => progress.line(SYNTH_NAME)?,
    }

    let length = sequence_length(service, &sequence)?;
    info!("Sequence length: {}", length);
    progress.line(&format!("Length: {:.6}", length))?;

    let mut session = PlayerSession::new(service.create_player(sequence)?);
    session.prepare(request.tempo)?;
    progress.line(&format!("Tempo: {:?}", request.tempo))?;

    progress.begin(length)?;
    drive_playback(&mut session, length, poll, progress, interrupted)
}

/// Display names of all output destinations, in destination order
pub fn list_devices<S: SequenceService>(service: &S) -> Result<Vec<String>> {
    service
        .list_output_destinations()?
        .iter()
        .map(|d| service.display_name(d))
        .collect()
}

pub fn exit_code(err: &MidiError) -> i32 {
    match err {
        MidiError::Interrupted => EXIT_INTERRUPTED,
        _ => 1,
    }
}

/// A flag raised by Ctrl-C. Without a handler the flag simply never rises.
pub fn install_interrupt_handler() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }
    flag
}
