//! MidiSystem builder: client naming, ingestion tuning, backend selection.

use std::sync::Arc;
use std::time::Duration;

use crate::connection::{PullTransport, PushTransport};
use crate::error::{Error, Result};
use crate::ingest::{Backpressure, Pull, Push};
use crate::registry::PacketRegistry;
use crate::sequencer::Sequencer;

#[cfg(any(all(feature = "alsa", target_os = "linux"), feature = "midi-io"))]
use super::NativeStrategy;
use super::{MidiSystem, MidiSystemInner};

const DEFAULT_CLIENT_NAME: &str = "seqmidi";

pub struct MidiSystemBuilder {
    pub(super) client_name: String,
    pub(super) backpressure: Backpressure,
    pub(super) read_poll_interval: Duration,
    pub(super) registry: Option<Arc<PacketRegistry>>,
}

impl Default for MidiSystemBuilder {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            backpressure: Backpressure::default(),
            read_poll_interval: crate::ingest::DEFAULT_POLL_INTERVAL,
            registry: None,
        }
    }
}

impl MidiSystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name this process registers with the native MIDI service.
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Policy for push deliveries into a full queue.
    pub fn backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    /// Timeout for each pull read, and so the longest `close` waits for a
    /// reader thread.
    pub fn read_poll_interval(mut self, interval: Duration) -> Self {
        self.read_poll_interval = interval;
        self
    }

    /// Use an isolated registry instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<PacketRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.client_name.is_empty() {
            return Err(Error::InvalidConfig(
                "client name must not be empty".to_string(),
            ));
        }
        if self.client_name.contains('\0') {
            return Err(Error::InvalidConfig(
                "client name must not contain NUL bytes".to_string(),
            ));
        }
        if self.read_poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "read poll interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    fn finish<S>(self, strategy: S, sequencer: impl Sequencer + 'static) -> MidiSystem<S>
    where
        S: crate::ingest::IngestionStrategy,
    {
        MidiSystem::from_inner(MidiSystemInner {
            client_name: self.client_name,
            strategy,
            sequencer: Box::new(sequencer),
            registry: self.registry.unwrap_or_else(PacketRegistry::global),
        })
    }

    /// Build over a blocking-read transport.
    pub fn build_pull<T: PullTransport>(
        self,
        transport: T,
        sequencer: impl Sequencer + 'static,
    ) -> Result<MidiSystem<Pull<T>>> {
        self.validate()?;
        let strategy = Pull::new(transport).with_poll_interval(self.read_poll_interval);
        Ok(self.finish(strategy, sequencer))
    }

    /// Build over a callback-driven transport.
    pub fn build_push<T: PushTransport>(
        self,
        transport: T,
        sequencer: impl Sequencer + 'static,
    ) -> Result<MidiSystem<Push<T>>> {
        self.validate()?;
        let strategy = Push::new(transport).with_backpressure(self.backpressure);
        Ok(self.finish(strategy, sequencer))
    }

    /// ALSA sequencer enumeration with rawmidi connections.
    #[cfg(all(feature = "alsa", target_os = "linux"))]
    pub fn alsa(self) -> Result<MidiSystem<Pull<crate::io::AlsaRawmidi>>> {
        let sequencer = crate::io::AlsaSequencer::new(self.client_name.clone());
        self.build_pull(crate::io::AlsaRawmidi::new(), sequencer)
    }

    /// midir for both enumeration and connections.
    #[cfg(feature = "midi-io")]
    pub fn midir(self) -> Result<MidiSystem<Push<crate::io::MidirTransport>>> {
        let transport = crate::io::MidirTransport::new(self.client_name.clone());
        let sequencer = crate::io::MidirSequencer::new(self.client_name.clone());
        self.build_push(transport, sequencer)
    }

    /// The platform's native backend: ALSA on Linux, midir elsewhere.
    #[cfg(any(all(feature = "alsa", target_os = "linux"), feature = "midi-io"))]
    pub fn build(self) -> Result<MidiSystem<NativeStrategy>> {
        #[cfg(all(feature = "alsa", target_os = "linux"))]
        return self.alsa();

        #[cfg(not(all(feature = "alsa", target_os = "linux")))]
        return self.midir();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSequencer, MockTransport};

    #[test]
    fn test_defaults() {
        let midi = MidiSystemBuilder::default()
            .build_pull(MockTransport::new(), MockSequencer::new())
            .unwrap();

        assert_eq!(midi.client_name(), "seqmidi");
        assert_eq!(midi.strategy().poll_interval(), Duration::from_millis(50));
        assert!(Arc::ptr_eq(midi.registry(), &PacketRegistry::global()));
    }

    #[test]
    fn test_settings_reach_strategy() {
        let registry = Arc::new(PacketRegistry::new());
        let midi = MidiSystemBuilder::new()
            .client_name("looper")
            .backpressure(Backpressure::Drop)
            .registry(Arc::clone(&registry))
            .build_push(MockTransport::new(), MockSequencer::new())
            .unwrap();

        assert_eq!(midi.client_name(), "looper");
        assert_eq!(midi.strategy().backpressure(), Backpressure::Drop);
        assert!(Arc::ptr_eq(midi.registry(), &registry));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = MidiSystemBuilder::default()
            .read_poll_interval(Duration::ZERO)
            .build_pull(MockTransport::new(), MockSequencer::new());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_client_name_rejected() {
        for name in ["", "bad\0name"] {
            let result = MidiSystemBuilder::default()
                .client_name(name)
                .build_push(MockTransport::new(), MockSequencer::new());
            assert!(matches!(result, Err(Error::InvalidConfig(_))));
        }
    }
}
