//! Playback driver
//!
//! [`PlayerSession`] owns a [`Player`] through its one-way lifecycle
//! (`Created -> Running -> Stopped`) and guarantees the player is stopped on
//! every exit path. [`drive_playback`] starts the session and busy-polls the
//! player clock at a fixed interval until the sequence length is reached.

use crate::midi::{MidiError, MusicTime, Player, Result};
use crate::ui::ProgressReporter;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Stopped,
}

/// Scoped ownership of a player; a running session is stopped when dropped
pub struct PlayerSession<P: Player> {
    player: P,
    state: SessionState,
}

impl<P: Player> PlayerSession<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            state: SessionState::Created,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    /// Applies the play rate and acquires output resources; only before start
    pub fn prepare(&mut self, rate: f64) -> Result<()> {
        self.expect_state(SessionState::Created, "prepare")?;
        self.player.set_play_rate(rate)?;
        self.player.preroll()
    }

    /// `Created -> Running`. On failure the player is still stopped.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(SessionState::Created, "start")?;
        if let Err(e) = self.player.start() {
            error!("Player failed to start: {}", e);
            self.state = SessionState::Stopped;
            if let Err(stop_err) = self.player.stop() {
                warn!("Stop after failed start also failed: {}", stop_err);
            }
            return Err(e);
        }
        self.state = SessionState::Running;
        Ok(())
    }

    pub fn current_time(&self) -> Result<MusicTime> {
        self.expect_state(SessionState::Running, "query time")?;
        self.player.current_time()
    }

    /// `Running -> Stopped`, exactly once
    pub fn stop(&mut self) -> Result<()> {
        self.expect_state(SessionState::Running, "stop")?;
        self.state = SessionState::Stopped;
        self.player.stop()
    }

    fn expect_state(&self, expected: SessionState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(MidiError::PlayerError(format!(
                "cannot {} a player in state {:?}",
                action, self.state
            )))
        }
    }
}

impl<P: Player> Drop for PlayerSession<P> {
    fn drop(&mut self) {
        if self.state == SessionState::Running {
            warn!("Player session dropped while running; stopping");
            if let Err(e) = self.stop() {
                error!("Failed to stop player: {}", e);
            }
        }
    }
}

/// Timing of the progress poll loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    /// Sleep between clock queries
    pub interval: Duration,
    /// Longest time the clock may stand still before playback is abandoned
    pub stall_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            stall_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of a completed playback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSummary {
    pub polls: usize,
    pub final_time: MusicTime,
}

/// Starts the session and polls until the clock reaches `length`, then stops.
/// At least one poll always happens. The player is stopped on every path.
pub fn drive_playback<P: Player>(
    session: &mut PlayerSession<P>,
    length: MusicTime,
    poll: &PollSettings,
    progress: &mut dyn ProgressReporter,
    interrupted: &AtomicBool,
) -> Result<PlaybackSummary> {
    session.start()?;
    info!("Playback started, length {:.6}", length);

    let outcome = poll_until(session, length, poll, progress, interrupted);
    let stopped = session.stop();
    let finished = progress.finish();

    let summary = outcome?;
    stopped?;
    finished?;
    info!(
        "Playback finished at {:.6} after {} polls",
        summary.final_time, summary.polls
    );
    Ok(summary)
}

fn poll_until<P: Player>(
    session: &PlayerSession<P>,
    length: MusicTime,
    poll: &PollSettings,
    progress: &mut dyn ProgressReporter,
    interrupted: &AtomicBool,
) -> Result<PlaybackSummary> {
    let mut polls = 0;
    let mut last_time: Option<MusicTime> = None;
    let mut last_advance = Instant::now();

    loop {
        thread::sleep(poll.interval);

        if interrupted.load(Ordering::SeqCst) {
            info!("Playback interrupted after {} polls", polls);
            return Err(MidiError::Interrupted);
        }

        let time = session.current_time()?;
        progress.tick(time)?;
        polls += 1;

        if time >= length {
            return Ok(PlaybackSummary {
                polls,
                final_time: time,
            });
        }

        match last_time {
            Some(previous) if time <= previous => {
                let waited = last_advance.elapsed();
                if waited >= poll.stall_timeout {
                    error!("Player clock stuck at {} for {:?}", time, waited);
                    return Err(MidiError::Stalled {
                        time,
                        waited_ms: waited.as_millis(),
                    });
                }
            }
            _ => {
                last_advance = Instant::now();
                last_time = Some(time);
            }
        }

        if polls % 1000 == 0 {
            debug!("Poll {}: time {:.6}", polls, time);
        }
    }
}
