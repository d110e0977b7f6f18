use crate::midi::{MidiError, MusicTime, Player, Result, SequenceService};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// How a [`MockPlayer`] reports time after it has been started
#[derive(Debug, Clone, PartialEq)]
pub enum MockClock {
    /// `start + step * n` on the n-th query
    Steps { start: MusicTime, step: MusicTime },
    /// Each query returns the next value; the last one repeats
    Script(Vec<MusicTime>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockSequence {
    pub path: PathBuf,
    /// `None` marks a track whose length query fails
    pub tracks: Vec<Option<MusicTime>>,
    pub output: Option<String>,
}

/// Scripted sequencing service used by tests
#[derive(Debug, Clone)]
pub struct MockService {
    tracks: Vec<Option<MusicTime>>,
    destinations: Vec<String>,
    clock: MockClock,
    fail_load: bool,
    fail_start: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockService {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            destinations: vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()],
            clock: MockClock::Steps {
                start: 0.0,
                step: 1.0,
            },
            fail_load: false,
            fail_start: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tracks(mut self, lengths: &[MusicTime]) -> Self {
        self.tracks = lengths.iter().copied().map(Some).collect();
        self
    }

    pub fn with_failing_track(mut self, index: usize) -> Self {
        if index < self.tracks.len() {
            self.tracks[index] = None;
        }
        self
    }

    pub fn with_destinations(mut self, names: &[&str]) -> Self {
        self.destinations = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_clock(mut self, clock: MockClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Every service and player call made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl SequenceService for MockService {
    type Sequence = MockSequence;
    type Destination = usize;
    type Player = MockPlayer;

    fn load_sequence(&mut self, path: &Path) -> Result<MockSequence> {
        self.record(format!("load {}", path.display()));
        if self.fail_load {
            return Err(MidiError::LoadError {
                path: path.display().to_string(),
                reason: "mock load failure".to_string(),
            });
        }
        Ok(MockSequence {
            path: path.to_path_buf(),
            tracks: self.tracks.clone(),
            output: None,
        })
    }

    fn list_output_destinations(&self) -> Result<Vec<usize>> {
        self.record("list destinations".to_string());
        Ok((0..self.destinations.len()).collect())
    }

    fn display_name(&self, destination: &usize) -> Result<String> {
        self.destinations
            .get(*destination)
            .cloned()
            .ok_or(MidiError::DeviceIndexOutOfRange {
                index: *destination,
                available: self.destinations.len(),
            })
    }

    fn bind_output(&mut self, sequence: &mut MockSequence, destination: &usize) -> Result<()> {
        let name = self.display_name(destination)?;
        self.record(format!("bind {}", name));
        sequence.output = Some(name);
        Ok(())
    }

    fn track_count(&self, sequence: &MockSequence) -> Result<usize> {
        Ok(sequence.tracks.len())
    }

    fn track_length(&self, sequence: &MockSequence, index: usize) -> Result<MusicTime> {
        match sequence.tracks.get(index) {
            Some(Some(length)) => Ok(*length),
            _ => Err(MidiError::TrackLengthError {
                index,
                reason: "mock track query failure".to_string(),
            }),
        }
    }

    fn create_player(&mut self, sequence: MockSequence) -> Result<MockPlayer> {
        self.record("create player".to_string());
        Ok(MockPlayer {
            clock: self.clock.clone(),
            fail_start: self.fail_start,
            running: false,
            queries: Cell::new(0),
            output: sequence.output,
            calls: Arc::clone(&self.calls),
        })
    }
}

/// Player whose clock follows a [`MockClock`]
#[derive(Debug)]
pub struct MockPlayer {
    clock: MockClock,
    fail_start: bool,
    running: bool,
    queries: Cell<usize>,
    output: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockPlayer {
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn record(&self, call: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.to_string());
        }
    }
}

impl Player for MockPlayer {
    fn set_play_rate(&mut self, rate: f64) -> Result<()> {
        self.record(&format!("rate {}", rate));
        if !rate.is_finite() || rate <= 0.0 {
            return Err(MidiError::PlayerError(format!("invalid play rate {}", rate)));
        }
        Ok(())
    }

    fn preroll(&mut self) -> Result<()> {
        self.record("preroll");
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.record("start");
        if self.fail_start {
            return Err(MidiError::PlayerError("mock start failure".to_string()));
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.record("stop");
        self.running = false;
        Ok(())
    }

    fn current_time(&self) -> Result<MusicTime> {
        let n = self.queries.get();
        self.queries.set(n + 1);
        let time = match &self.clock {
            MockClock::Steps { start, step } => start + step * n as f64,
            MockClock::Script(times) => match times.get(n).or_else(|| times.last()) {
                Some(time) => *time,
                None => 0.0,
            },
        };
        Ok(time)
    }
}
