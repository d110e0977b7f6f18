use crate::midi::player::{OutputRoute, SequencePlayer};
use crate::midi::sequence::Sequence;
use crate::midi::{MidiError, MusicTime, Result, SequenceService};
use log::{debug, error, info};
use midir::{MidiOutput, MidiOutputPort};
use std::fs;
use std::path::Path;

/// A MIDI output port as enumerated by midir
#[derive(Clone)]
pub struct MidiDestination {
    pub index: usize,
    pub name: String,
    port: MidiOutputPort,
}

/// A loaded file plus the output it is routed to
pub struct LoadedSequence {
    sequence: Sequence,
    route: OutputRoute,
}

impl LoadedSequence {
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }
}

/// Sequencing service backed by midly for parsing, midir for output ports
/// and the built-in synthesizer for the default route
pub struct MidirService {
    client_name: String,
    synth_gain: f32,
}

impl MidirService {
    pub fn new(client_name: &str, synth_gain: f32) -> Self {
        Self {
            client_name: client_name.to_string(),
            synth_gain,
        }
    }
}

impl SequenceService for MidirService {
    type Sequence = LoadedSequence;
    type Destination = MidiDestination;
    type Player = SequencePlayer;

    fn load_sequence(&mut self, path: &Path) -> Result<LoadedSequence> {
        let label = path.display().to_string();
        debug!("Loading sequence from {}", label);
        let data = fs::read(path).map_err(|e| {
            error!("Failed to read {}: {}", label, e);
            MidiError::LoadError {
                path: label.clone(),
                reason: e.to_string(),
            }
        })?;

        let sequence = Sequence::from_bytes(&label, &data)?;
        info!(
            "Loaded {} ({} bytes, {} tracks, {} tempo segments)",
            label,
            data.len(),
            sequence.track_count(),
            sequence.tempo_map().change_count()
        );

        Ok(LoadedSequence {
            sequence,
            route: OutputRoute::Synth {
                gain: self.synth_gain,
            },
        })
    }

    fn list_output_destinations(&self) -> Result<Vec<MidiDestination>> {
        let midi_out = MidiOutput::new(&format!("{}-port-lister", self.client_name))
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        let destinations: Vec<MidiDestination> = midi_out
            .ports()
            .into_iter()
            .enumerate()
            .map(|(index, port)| MidiDestination {
                index,
                name: midi_out.port_name(&port).unwrap_or_default(),
                port,
            })
            .collect();

        info!(
            "Available MIDI output ports: {:?}",
            destinations.iter().map(|d| d.name.as_str()).collect::<Vec<_>>()
        );
        Ok(destinations)
    }

    fn display_name(&self, destination: &MidiDestination) -> Result<String> {
        Ok(destination.name.clone())
    }

    fn bind_output(
        &mut self,
        sequence: &mut LoadedSequence,
        destination: &MidiDestination,
    ) -> Result<()> {
        info!(
            "Binding sequence output to port {}: {}",
            destination.index, destination.name
        );
        sequence.route = OutputRoute::Port {
            port: destination.port.clone(),
            name: destination.name.clone(),
        };
        Ok(())
    }

    fn track_count(&self, sequence: &LoadedSequence) -> Result<usize> {
        Ok(sequence.sequence.track_count())
    }

    fn track_length(&self, sequence: &LoadedSequence, index: usize) -> Result<MusicTime> {
        sequence
            .sequence
            .track(index)
            .map(|t| t.length())
            .ok_or_else(|| MidiError::TrackLengthError {
                index,
                reason: format!(
                    "sequence has only {} tracks",
                    sequence.sequence.track_count()
                ),
            })
    }

    fn create_player(&mut self, sequence: LoadedSequence) -> Result<SequencePlayer> {
        debug!("Creating player for route {:?}", sequence.route);
        Ok(SequencePlayer::new(
            sequence.sequence,
            sequence.route,
            &self.client_name,
        ))
    }
}
