use super::service::MusicTime;

/// Standard MIDI File default tempo (120 BPM)
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

#[derive(Debug, Clone, PartialEq)]
struct TempoSegment {
    beat: MusicTime,
    seconds: f64,
    seconds_per_beat: f64,
}

/// Piecewise-constant mapping between beats and wall-clock seconds
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    segments: Vec<TempoSegment>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::constant(f64::from(DEFAULT_MICROS_PER_BEAT) / 1_000_000.0)
    }
}

impl TempoMap {
    pub fn constant(seconds_per_beat: f64) -> Self {
        Self {
            segments: vec![TempoSegment {
                beat: 0.0,
                seconds: 0.0,
                seconds_per_beat,
            }],
        }
    }

    /// Builds a map from `(beat, microseconds per beat)` tempo changes in any order.
    /// A later change at the same beat replaces an earlier one.
    pub fn from_changes(mut changes: Vec<(MusicTime, u32)>) -> Self {
        changes.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut map = Self::default();
        for (beat, micros) in changes {
            let seconds_per_beat = f64::from(micros.max(1)) / 1_000_000.0;
            let last = map.segments.len() - 1;
            let current = &mut map.segments[last];

            if beat <= current.beat {
                current.seconds_per_beat = seconds_per_beat;
            } else {
                let seconds = current.seconds + (beat - current.beat) * current.seconds_per_beat;
                map.segments.push(TempoSegment {
                    beat,
                    seconds,
                    seconds_per_beat,
                });
            }
        }
        map
    }

    /// Wall-clock offset of `beat` from the start of the sequence
    pub fn seconds_at(&self, beat: MusicTime) -> f64 {
        let idx = self
            .segments
            .partition_point(|s| s.beat <= beat)
            .saturating_sub(1);
        let seg = &self.segments[idx];
        seg.seconds + (beat - seg.beat) * seg.seconds_per_beat
    }

    /// Beat position reached after `seconds` of playback
    pub fn beat_at(&self, seconds: f64) -> MusicTime {
        let idx = self
            .segments
            .partition_point(|s| s.seconds <= seconds)
            .saturating_sub(1);
        let seg = &self.segments[idx];
        seg.beat + (seconds - seg.seconds) / seg.seconds_per_beat
    }

    pub fn change_count(&self) -> usize {
        self.segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_default_is_120_bpm() {
        let map = TempoMap::default();
        assert!((map.seconds_at(4.0) - 2.0).abs() < EPSILON);
        assert!((map.beat_at(1.0) - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_tempo_change_mid_sequence() {
        // 120 BPM for 4 beats, then 60 BPM
        let map = TempoMap::from_changes(vec![(4.0, 1_000_000)]);
        assert_eq!(map.change_count(), 2);
        assert!((map.seconds_at(4.0) - 2.0).abs() < EPSILON);
        assert!((map.seconds_at(6.0) - 4.0).abs() < EPSILON);
        assert!((map.beat_at(4.0) - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_change_at_zero_replaces_default() {
        let map = TempoMap::from_changes(vec![(0.0, 250_000)]);
        assert_eq!(map.change_count(), 1);
        assert!((map.seconds_at(8.0) - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_unsorted_changes() {
        let sorted = TempoMap::from_changes(vec![(2.0, 400_000), (6.0, 800_000)]);
        let unsorted = TempoMap::from_changes(vec![(6.0, 800_000), (2.0, 400_000)]);
        assert_eq!(sorted, unsorted);
    }

    #[test]
    fn test_round_trip_is_monotonic() {
        let map = TempoMap::from_changes(vec![(1.0, 300_000), (3.5, 900_000)]);
        let mut previous = -1.0;
        for step in 0..100 {
            let seconds = f64::from(step) * 0.05;
            let beat = map.beat_at(seconds);
            assert!(beat >= previous);
            assert!((map.seconds_at(beat) - seconds).abs() < 1e-6);
            previous = beat;
        }
    }
}
