use crate::midi::MusicTime;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};

/// Sequence time is shown on the bar in thousandths of a beat
const BAR_UNITS_PER_BEAT: f64 = 1000.0;

/// Receives status lines and playback progress
pub trait ProgressReporter {
    /// A complete informational line (banner, device, length)
    fn line(&mut self, text: &str) -> io::Result<()>;

    /// Called once the total length is known, before the first tick
    fn begin(&mut self, _length: MusicTime) -> io::Result<()> {
        Ok(())
    }

    /// Current playback position, once per poll
    fn tick(&mut self, time: MusicTime) -> io::Result<()>;

    /// Playback is over
    fn finish(&mut self) -> io::Result<()>;
}

/// Plain output: each tick overwrites the previous one with `\r<time>`
pub struct LineProgress<W: Write> {
    out: W,
}

impl LineProgress<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> LineProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressReporter for LineProgress<W> {
    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }

    fn tick(&mut self, time: MusicTime) -> io::Result<()> {
        write!(self.out, "\r{:.6}", time)?;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// indicatif bar drawn on stderr; status lines still go to stdout
pub struct BarProgress {
    bar: Option<ProgressBar>,
    draw_target: fn() -> ProgressDrawTarget,
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: None,
            draw_target: ProgressDrawTarget::stderr,
        }
    }

    /// A bar that draws nowhere, for tests
    pub fn hidden() -> Self {
        Self {
            bar: None,
            draw_target: ProgressDrawTarget::hidden,
        }
    }

    pub fn bar(&self) -> Option<&ProgressBar> {
        self.bar.as_ref()
    }
}

pub fn create_playback_progress(length: MusicTime) -> ProgressBar {
    let pb = ProgressBar::new(to_bar_units(length));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan}] {msg} beats ({elapsed_precise})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("⣀⣤⣦⣶⣷⣿ "),
    );
    pb.set_prefix("Playing");
    pb
}

fn to_bar_units(time: MusicTime) -> u64 {
    (time.max(0.0) * BAR_UNITS_PER_BEAT).round() as u64
}

impl ProgressReporter for BarProgress {
    fn line(&mut self, text: &str) -> io::Result<()> {
        match &self.bar {
            Some(bar) => bar.println(text),
            None => println!("{}", text),
        }
        Ok(())
    }

    fn begin(&mut self, length: MusicTime) -> io::Result<()> {
        let bar = create_playback_progress(length);
        bar.set_draw_target((self.draw_target)());
        self.bar = Some(bar);
        Ok(())
    }

    fn tick(&mut self, time: MusicTime) -> io::Result<()> {
        if let Some(bar) = &self.bar {
            let position = to_bar_units(time).min(bar.length().unwrap_or(u64::MAX));
            bar.set_position(position);
            bar.set_message(format!("{:.3}", time));
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_progress_format() {
        let mut progress = LineProgress::new(Vec::new());
        progress.line("Length: 10.000000").unwrap();
        progress.tick(0.5).unwrap();
        progress.tick(1.25).unwrap();
        progress.finish().unwrap();

        let text = String::from_utf8(progress.into_inner()).unwrap();
        assert_eq!(text, "Length: 10.000000\n\r0.500000\r1.250000\n");
    }

    #[test]
    fn test_playback_progress_creation() {
        let progress = create_playback_progress(10.0);
        assert_eq!(progress.length().unwrap(), 10_000);
        assert_eq!(progress.position(), 0);
    }

    #[test]
    fn test_bar_progress_clamps_to_length() {
        let mut progress = BarProgress::hidden();
        progress.begin(2.0).unwrap();
        progress.tick(1.5).unwrap();
        assert_eq!(progress.bar().unwrap().position(), 1500);
        progress.tick(2.75).unwrap();
        assert_eq!(progress.bar().unwrap().position(), 2000);
        progress.finish().unwrap();
    }

    #[test]
    fn test_zero_length_bar() {
        let mut progress = BarProgress::hidden();
        progress.begin(0.0).unwrap();
        progress.tick(0.0).unwrap();
        assert_eq!(progress.bar().unwrap().length(), Some(0));
    }
}
