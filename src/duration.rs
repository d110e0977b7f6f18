use crate::midi::{MidiError, MusicTime, Result, SequenceService};
use log::debug;

/// Total playable length of `sequence`: the longest of its tracks, or 0 when it has none.
/// A failed or non-finite track length is an error, never treated as 0.
pub fn sequence_length<S: SequenceService>(service: &S, sequence: &S::Sequence) -> Result<MusicTime> {
    let count = service.track_count(sequence)?;
    debug!("Sequence has {} tracks", count);

    longest_track((0..count).map(|index| -> Result<(usize, MusicTime)> {
        let length = service.track_length(sequence, index)?;
        debug!("Track {} length: {}", index, length);
        Ok((index, length))
    }))
}

/// Maximum over `(index, length)` results, starting from 0
pub fn longest_track<I>(lengths: I) -> Result<MusicTime>
where
    I: IntoIterator<Item = Result<(usize, MusicTime)>>,
{
    let mut sequence_length: MusicTime = 0.0;
    for entry in lengths {
        let (index, length) = entry?;
        if !length.is_finite() || length < 0.0 {
            return Err(MidiError::TrackLengthError {
                index,
                reason: format!("invalid length {}", length),
            });
        }
        if length > sequence_length {
            sequence_length = length;
        }
    }
    Ok(sequence_length)
}
