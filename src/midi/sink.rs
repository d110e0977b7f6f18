use super::message::MidiMessage;
use super::service::{MidiError, Result};
use log::debug;
use midir::MidiOutputConnection;

/// Destination a player writes scheduled messages into
pub trait MidiSink: Send {
    fn send(&mut self, msg: &MidiMessage) -> Result<()>;

    /// Sends All Notes Off on every channel
    fn silence(&mut self) -> Result<()> {
        debug!("Sending All Notes Off on all channels");
        for channel in 0..16 {
            self.send(&MidiMessage::AllNotesOff { channel })?;
        }
        Ok(())
    }
}

impl MidiSink for MidiOutputConnection {
    fn send(&mut self, msg: &MidiMessage) -> Result<()> {
        MidiOutputConnection::send(self, &msg.to_bytes())
            .map_err(|e| MidiError::SendError(e.to_string()))
    }
}

/// Collects everything sent to it, for tests
#[cfg(test)]
#[derive(Default, Clone)]
pub(crate) struct RecordingSink {
    pub sent: std::sync::Arc<std::sync::Mutex<Vec<MidiMessage>>>,
}

#[cfg(test)]
impl MidiSink for RecordingSink {
    fn send(&mut self, msg: &MidiMessage) -> Result<()> {
        self.sent.lock().unwrap().push(*msg);
        Ok(())
    }
}

/// Rejects every channel message but still accepts All Notes Off, for tests
#[cfg(test)]
#[derive(Default, Clone)]
pub(crate) struct FailingSink {
    pub sent: std::sync::Arc<std::sync::Mutex<Vec<MidiMessage>>>,
}

#[cfg(test)]
impl MidiSink for FailingSink {
    fn send(&mut self, msg: &MidiMessage) -> Result<()> {
        match msg {
            MidiMessage::AllNotesOff { .. } => {
                self.sent.lock().unwrap().push(*msg);
                Ok(())
            }
            _ => Err(MidiError::SendError("port went away".to_string())),
        }
    }
}
