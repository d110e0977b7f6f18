use super::sequence::{Sequence, TimedMessage};
use super::service::{MidiError, MusicTime, Player, Result};
use super::sink::MidiSink;
use super::synth::SoftSynth;
use super::tempo::TempoMap;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, warn};
use midir::{MidiOutput, MidiOutputPort};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Where a sequence's events are delivered
#[derive(Clone)]
pub enum OutputRoute {
    /// The built-in software synthesizer
    Synth { gain: f32 },
    /// A MIDI output port
    Port { port: MidiOutputPort, name: String },
}

impl std::fmt::Debug for OutputRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputRoute::Synth { gain } => write!(f, "Synth {{ gain: {} }}", gain),
            OutputRoute::Port { name, .. } => write!(f, "Port {{ name: {:?} }}", name),
        }
    }
}

/// Output resources acquired by preroll
struct OpenOutput {
    sink: Box<dyn MidiSink>,
    // Keeps the audio stream alive for the synth route
    _synth: Option<SoftSynth>,
}

struct Running {
    started_at: Instant,
    stop_tx: Sender<()>,
    faults: Receiver<MidiError>,
    worker: JoinHandle<()>,
    _synth: Option<SoftSynth>,
}

/// Plays a [`Sequence`] on a worker thread, timed against the wall clock
pub struct SequencePlayer {
    events: Arc<[TimedMessage]>,
    tempo_map: TempoMap,
    route: OutputRoute,
    client_name: String,
    rate: f64,
    output: Option<OpenOutput>,
    running: Option<Running>,
    stopped_at: Option<MusicTime>,
}

impl SequencePlayer {
    pub fn new(sequence: Sequence, route: OutputRoute, client_name: &str) -> Self {
        Self {
            events: sequence.merged_events().into(),
            tempo_map: sequence.tempo_map().clone(),
            route,
            client_name: client_name.to_string(),
            rate: 1.0,
            output: None,
            running: None,
            stopped_at: None,
        }
    }

    fn open_output(&self) -> Result<OpenOutput> {
        match &self.route {
            OutputRoute::Synth { gain } => {
                let synth = SoftSynth::open(*gain)?;
                Ok(OpenOutput {
                    sink: Box::new(synth.sink()),
                    _synth: Some(synth),
                })
            }
            OutputRoute::Port { port, name } => {
                let midi_out = MidiOutput::new(&self.client_name)
                    .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
                info!("Connecting to MIDI output port: {}", name);
                let connection = midi_out
                    .connect(port, &format!("{}-output-conn", self.client_name))
                    .map_err(|e| MidiError::ConnectionError(format!("{}: {}", name, e)))?;
                Ok(OpenOutput {
                    sink: Box::new(connection),
                    _synth: None,
                })
            }
        }
    }

    fn elapsed_time(&self, started_at: Instant, until: Instant) -> MusicTime {
        let seconds = until.saturating_duration_since(started_at).as_secs_f64() * self.rate;
        self.tempo_map.beat_at(seconds)
    }
}

impl Player for SequencePlayer {
    fn set_play_rate(&mut self, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(MidiError::PlayerError(format!("invalid play rate {}", rate)));
        }
        if self.running.is_some() {
            return Err(MidiError::PlayerError(
                "cannot change play rate while running".to_string(),
            ));
        }
        self.rate = rate;
        Ok(())
    }

    fn preroll(&mut self) -> Result<()> {
        if self.output.is_none() {
            debug!("Prerolling output {:?}", self.route);
            self.output = Some(self.open_output()?);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(MidiError::PlayerError("player already running".to_string()));
        }
        self.preroll()?;
        let OpenOutput { sink, _synth } = self
            .output
            .take()
            .ok_or_else(|| MidiError::PlayerError("output not prerolled".to_string()))?;

        let (stop_tx, stop_rx) = bounded(1);
        let (fault_tx, faults) = bounded(1);
        let events = Arc::clone(&self.events);
        let tempo_map = self.tempo_map.clone();
        let rate = self.rate;
        let started_at = Instant::now();

        let worker = thread::Builder::new()
            .name("sequence-player".to_string())
            .spawn(move || {
                if let Err(e) = dispatch_events(&events, &tempo_map, rate, started_at, sink, &stop_rx)
                {
                    error!("Sequence dispatch failed: {}", e);
                    let _ = fault_tx.send(e);
                }
            })
            .map_err(|e| MidiError::PlayerError(format!("cannot spawn player thread: {}", e)))?;

        info!("Player started ({} events, rate {})", self.events.len(), rate);
        self.stopped_at = None;
        self.running = Some(Running {
            started_at,
            stop_tx,
            faults,
            worker,
            _synth,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let now = Instant::now();
        self.stopped_at = Some(self.elapsed_time(running.started_at, now));

        // Disconnecting also wakes the worker
        drop(running.stop_tx);
        if running.worker.join().is_err() {
            warn!("Player thread panicked");
            return Err(MidiError::PlayerError("player thread panicked".to_string()));
        }
        info!("Player stopped at {:?}", self.stopped_at);
        Ok(())
    }

    fn current_time(&self) -> Result<MusicTime> {
        match &self.running {
            Some(running) => match running.faults.try_recv() {
                Ok(fault) => Err(fault),
                Err(TryRecvError::Empty) => Ok(self.elapsed_time(running.started_at, Instant::now())),
                // A healthy worker holds the sender until stop
                Err(TryRecvError::Disconnected) => {
                    Err(MidiError::PlayerError("player thread exited".to_string()))
                }
            },
            None => Ok(self.stopped_at.unwrap_or(0.0)),
        }
    }
}

impl Drop for SequencePlayer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop player on drop: {}", e);
        }
    }
}

/// Sends each event when its wall-clock time arrives, then silences the output.
/// A failed send still silences before the error is returned.
fn dispatch_events(
    events: &[TimedMessage],
    tempo_map: &TempoMap,
    rate: f64,
    started_at: Instant,
    mut sink: Box<dyn MidiSink>,
    stop_rx: &Receiver<()>,
) -> Result<()> {
    match send_due_events(events, tempo_map, rate, started_at, sink.as_mut(), stop_rx) {
        Ok(stop_requested) => {
            if !stop_requested {
                // Hold the output open until stop so trailing notes are heard
                let _ = stop_rx.recv();
            }
            sink.silence()
        }
        Err(e) => {
            if let Err(silence_err) = sink.silence() {
                warn!("Could not silence output after failure: {}", silence_err);
            }
            Err(e)
        }
    }
}

/// Returns whether a stop arrived before the events ran out
fn send_due_events(
    events: &[TimedMessage],
    tempo_map: &TempoMap,
    rate: f64,
    started_at: Instant,
    sink: &mut dyn MidiSink,
    stop_rx: &Receiver<()>,
) -> Result<bool> {
    for event in events {
        let due = due_after_start(tempo_map.seconds_at(event.time), rate)?;
        let elapsed = started_at.elapsed();

        if due > elapsed {
            if !matches!(stop_rx.recv_timeout(due - elapsed), Err(RecvTimeoutError::Timeout)) {
                return Ok(true);
            }
        } else if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
            return Ok(true);
        }

        sink.send(&event.message)?;
    }
    Ok(false)
}

fn due_after_start(seconds: f64, rate: f64) -> Result<Duration> {
    Duration::try_from_secs_f64((seconds / rate).max(0.0)).map_err(|e| {
        MidiError::PlayerError(format!(
            "event at {}s cannot be scheduled at rate {}: {}",
            seconds, rate, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::message::MidiMessage;
    use crate::midi::sequence::smf_bytes::{header, track};
    use crate::midi::sink::{FailingSink, RecordingSink};

    fn note(time: MusicTime, note: u8) -> TimedMessage {
        TimedMessage {
            time,
            message: MidiMessage::NoteOn {
                channel: 0,
                note,
                velocity: 100,
            },
        }
    }

    #[test]
    fn test_dispatch_sends_in_order_then_silences() {
        let sink = RecordingSink::default();
        let sent = Arc::clone(&sink.sent);
        let (stop_tx, stop_rx) = bounded(1);
        // 120 BPM: 0.01 beats = 5 ms
        let events = vec![note(0.0, 60), note(0.01, 62), note(0.02, 64)];

        let handle = thread::spawn(move || {
            dispatch_events(
                &events,
                &TempoMap::default(),
                1.0,
                Instant::now(),
                Box::new(sink),
                &stop_rx,
            )
        });
        thread::sleep(Duration::from_millis(100));
        drop(stop_tx);
        handle.join().unwrap().unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 3 + 16);
        assert_eq!(
            sent[1],
            MidiMessage::NoteOn {
                channel: 0,
                note: 62,
                velocity: 100
            }
        );
        assert_eq!(sent[3], MidiMessage::AllNotesOff { channel: 0 });
    }

    #[test]
    fn test_stop_interrupts_pending_events() {
        let sink = RecordingSink::default();
        let sent = Arc::clone(&sink.sent);
        let (stop_tx, stop_rx) = bounded(1);
        // Second event is 50 seconds away
        let events = vec![note(0.0, 60), note(100.0, 62)];

        let handle = thread::spawn(move || {
            dispatch_events(
                &events,
                &TempoMap::default(),
                1.0,
                Instant::now(),
                Box::new(sink),
                &stop_rx,
            )
        });
        thread::sleep(Duration::from_millis(20));
        stop_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1 + 16);
    }

    #[test]
    fn test_elapsed_time_scales_with_rate() {
        let sequence = Sequence::from_bytes("empty.mid", &header(1, 0, 96)).unwrap();
        let mut player = SequencePlayer::new(sequence, OutputRoute::Synth { gain: 0.1 }, "test");
        assert!(player.set_play_rate(0.0).is_err());
        assert!(player.set_play_rate(f64::NAN).is_err());
        player.set_play_rate(2.0).unwrap();

        let start = Instant::now();
        let beats = player.elapsed_time(start, start + Duration::from_secs(1));
        // 2 seconds of sequence time at 120 BPM
        assert!((beats - 4.0).abs() < 1e-9);
        assert_eq!(player.current_time().unwrap(), 0.0);
    }

    #[test]
    fn test_send_failure_still_silences() {
        let sink = FailingSink::default();
        let sent = Arc::clone(&sink.sent);
        let (_stop_tx, stop_rx) = bounded(1);

        let result = dispatch_events(
            &[note(0.0, 60)],
            &TempoMap::default(),
            1.0,
            Instant::now(),
            Box::new(sink),
            &stop_rx,
        );

        assert!(matches!(result, Err(MidiError::SendError(_))));
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 16);
        assert_eq!(sent[15], MidiMessage::AllNotesOff { channel: 15 });
    }

    #[test]
    fn test_unschedulable_rate_is_an_error() {
        let sink = RecordingSink::default();
        let sent = Arc::clone(&sink.sent);
        let (_stop_tx, stop_rx) = bounded(1);

        let result = dispatch_events(
            &[note(0.0, 60), note(1.0, 62)],
            &TempoMap::default(),
            1e-30,
            Instant::now(),
            Box::new(sink),
            &stop_rx,
        );

        assert!(matches!(result, Err(MidiError::PlayerError(_))));
        // First note went out, then everything was silenced
        assert_eq!(sent.lock().unwrap().len(), 1 + 16);
    }

    fn poll_for_error(player: &SequencePlayer) -> MidiError {
        for _ in 0..500 {
            match player.current_time() {
                Ok(_) => thread::sleep(Duration::from_millis(2)),
                Err(e) => return e,
            }
        }
        panic!("player never reported an error");
    }

    #[test]
    fn test_dispatch_failure_reported_by_current_time() {
        let mut data = header(0, 1, 96);
        data.extend(track(&[0x00, 0x90, 60, 100], 0));
        let sequence = Sequence::from_bytes("one-note.mid", &data).unwrap();
        let mut player = SequencePlayer::new(sequence, OutputRoute::Synth { gain: 0.1 }, "test");
        player.output = Some(OpenOutput {
            sink: Box::new(FailingSink::default()),
            _synth: None,
        });

        player.start().unwrap();
        let fault = poll_for_error(&player);
        assert!(matches!(fault, MidiError::SendError(_)), "{:?}", fault);

        // The worker is gone; later queries keep failing
        let exited = poll_for_error(&player);
        assert_eq!(
            exited,
            MidiError::PlayerError("player thread exited".to_string())
        );

        player.stop().unwrap();
        assert!(player.current_time().is_ok());
    }
}
