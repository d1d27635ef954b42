use std::collections::HashMap;

use analytics_types::{
    SourceConfig, StreamId, StreamSettings, StreamSettingsPatch, StreamState,
};

use crate::error::RegistryError;
use crate::transition::is_allowed;

pub struct StreamEntry {
    pub state: StreamState,
    pub source: SourceConfig,
    pub settings: StreamSettings,
}

/// Owns the lifecycle state of every known stream. One instance per
/// process; callers wrap it in their own `Mutex`/`RwLock` as needed — this
/// type itself has no interior mutability.
#[derive(Default)]
pub struct StreamRegistry {
    streams: HashMap<StreamId, StreamEntry>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        StreamRegistry::default()
    }

    fn transition(&mut self, stream_id: &StreamId, to: StreamState) -> Result<(), RegistryError> {
        let entry = self
            .streams
            .get_mut(stream_id)
            .ok_or_else(|| RegistryError::UnknownStream(stream_id.clone()))?;
        if !is_allowed(entry.state, to) {
            return Err(RegistryError::IllegalTransition {
                stream_id: stream_id.clone(),
                from: entry.state,
                to,
            });
        }
        tracing::info!(%stream_id, from = ?entry.state, to = ?to, "stream state transition");
        entry.state = to;
        Ok(())
    }

    /// Idempotent: a repeated `start` on an already-Active stream succeeds
    /// without re-opening anything.
    pub fn start(
        &mut self,
        stream_id: StreamId,
        source: SourceConfig,
        settings: StreamSettings,
    ) -> Result<(), RegistryError> {
        if let Some(entry) = self.streams.get(&stream_id) {
            if entry.state == StreamState::Active {
                return Ok(());
            }
        }

        self.streams.entry(stream_id.clone()).or_insert_with(|| StreamEntry {
            state: StreamState::Inactive,
            source: source.clone(),
            settings: settings.clone(),
        });
        self.transition(&stream_id, StreamState::Activating)?;
        let entry = self.streams.get_mut(&stream_id).unwrap();
        entry.source = source;
        entry.settings = settings;
        Ok(())
    }

    /// Called once the Frame Source has opened and produced its first
    /// frame.
    pub fn mark_active(&mut self, stream_id: &StreamId) -> Result<(), RegistryError> {
        self.transition(stream_id, StreamState::Active)
    }

    pub fn stop(&mut self, stream_id: &StreamId) -> Result<(), RegistryError> {
        self.transition(stream_id, StreamState::Deactivating)
    }

    /// Called once the Frame Source has been released.
    pub fn mark_released(&mut self, stream_id: &StreamId) -> Result<(), RegistryError> {
        self.transition(stream_id, StreamState::Inactive)
    }

    pub fn mark_error(&mut self, stream_id: &StreamId) -> Result<(), RegistryError> {
        self.transition(stream_id, StreamState::Error)
    }

    pub fn update_settings(
        &mut self,
        stream_id: &StreamId,
        patch: &StreamSettingsPatch,
    ) -> Result<StreamSettings, RegistryError> {
        let entry = self
            .streams
            .get_mut(stream_id)
            .ok_or_else(|| RegistryError::UnknownStream(stream_id.clone()))?;
        entry.settings = patch.apply_to(&entry.settings);
        Ok(entry.settings.clone())
    }

    pub fn state(&self, stream_id: &StreamId) -> Option<StreamState> {
        self.streams.get(stream_id).map(|e| e.state)
    }

    pub fn settings(&self, stream_id: &StreamId) -> Option<StreamSettings> {
        self.streams.get(stream_id).map(|e| e.settings.clone())
    }

    pub fn active_streams(&self) -> impl Iterator<Item = (&StreamId, &StreamEntry)> {
        self.streams.iter().filter(|(_, e)| e.state == StreamState::Active)
    }

    pub fn all_streams(&self) -> impl Iterator<Item = (&StreamId, &StreamEntry)> {
        self.streams.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::SourceKind;

    fn source() -> SourceConfig {
        SourceConfig {
            source_type: SourceKind::File,
            source_url: "test.bin".to_string(),
            reconnect_attempts: 5,
        }
    }

    #[test]
    fn a_new_stream_starts_in_activating() {
        let mut registry = StreamRegistry::new();
        let id = StreamId::from("court-1");
        registry.start(id.clone(), source(), StreamSettings::default()).unwrap();
        assert_eq!(registry.state(&id), Some(StreamState::Activating));
    }

    #[test]
    fn repeated_start_on_an_active_stream_is_a_no_op() {
        let mut registry = StreamRegistry::new();
        let id = StreamId::from("court-1");
        registry.start(id.clone(), source(), StreamSettings::default()).unwrap();
        registry.mark_active(&id).unwrap();
        assert_eq!(registry.state(&id), Some(StreamState::Active));

        registry.start(id.clone(), source(), StreamSettings::default()).unwrap();
        assert_eq!(registry.state(&id), Some(StreamState::Active));
    }

    #[test]
    fn the_full_lifecycle_round_trips_to_inactive() {
        let mut registry = StreamRegistry::new();
        let id = StreamId::from("court-1");
        registry.start(id.clone(), source(), StreamSettings::default()).unwrap();
        registry.mark_active(&id).unwrap();
        registry.stop(&id).unwrap();
        registry.mark_released(&id).unwrap();
        assert_eq!(registry.state(&id), Some(StreamState::Inactive));
    }

    #[test]
    fn skipping_activating_is_rejected() {
        let mut registry = StreamRegistry::new();
        let id = StreamId::from("court-1");
        registry.start(id.clone(), source(), StreamSettings::default()).unwrap();
        let err = registry.stop(&id);
        assert!(err.is_err());
    }

    #[test]
    fn update_settings_only_overrides_present_fields() {
        let mut registry = StreamRegistry::new();
        let id = StreamId::from("court-1");
        registry.start(id.clone(), source(), StreamSettings::default()).unwrap();
        let patch = StreamSettingsPatch {
            target_fps: Some(15.0),
            ..Default::default()
        };
        let updated = registry.update_settings(&id, &patch).unwrap();
        approx::assert_relative_eq!(updated.target_fps, 15.0);
    }

    #[test]
    fn unknown_stream_operations_error() {
        let mut registry = StreamRegistry::new();
        let id = StreamId::from("ghost");
        assert!(registry.mark_active(&id).is_err());
    }
}
