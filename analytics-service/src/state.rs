use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use analytics_core::{FramePipeline, TrackerConfig};
use analytics_store::AnalyticsStore;
use analytics_types::{StreamId, StreamSettings};
use kinematics::KinematicsConfig;
use push_channel::{DownstreamNotifier, LatestRegistry};
use stream_registry::StreamRegistry;
use vision_adapters::{MotionBlobDetector, TemplatePoseAdapter};

use crate::config::Config;

/// Process-wide shared state. Streams never share a `FramePipeline` — each
/// gets its own, guarded by its own lock, so a slow frame on one stream
/// never blocks another's.
pub struct AppState {
    pub config: Config,
    pub store: Arc<AnalyticsStore>,
    pub registry: StdMutex<StreamRegistry>,
    pipelines: StdMutex<HashMap<StreamId, Arc<AsyncMutex<FramePipeline>>>>,
    ingest_tasks: StdMutex<HashMap<StreamId, CancellationToken>>,
    pub latest: Arc<LatestRegistry>,
    pub notifier: DownstreamNotifier,
}

impl AppState {
    pub fn new(config: Config, store: Arc<AnalyticsStore>, notifier: DownstreamNotifier) -> Self {
        AppState {
            config,
            store,
            registry: StdMutex::new(StreamRegistry::new()),
            pipelines: StdMutex::new(HashMap::new()),
            ingest_tasks: StdMutex::new(HashMap::new()),
            latest: Arc::new(LatestRegistry::new()),
            notifier,
        }
    }

    /// Registers the cancellation token for a stream's file-ingest task, if
    /// one was started. Replaces (and implicitly cancels nothing of) any
    /// prior token — callers are expected to have already stopped it.
    pub fn register_ingest(&self, stream_id: StreamId, cancel: CancellationToken) {
        self.ingest_tasks.lock().unwrap().insert(stream_id, cancel);
    }

    /// Cancels and forgets this stream's ingest task, if it has one. A
    /// stream fed entirely through `process_frame` has none, and this is a
    /// no-op for it.
    pub fn stop_ingest(&self, stream_id: &StreamId) {
        if let Some(cancel) = self.ingest_tasks.lock().unwrap().remove(stream_id) {
            cancel.cancel();
        }
    }

    /// Returns this stream's pipeline, building it from `settings` on first
    /// use. Rebuilding a pipeline (rather than patching one in place) is
    /// the `start_stream` path's job, not this one's.
    pub fn pipeline_for(
        &self,
        stream_id: &StreamId,
        settings: &StreamSettings,
    ) -> Arc<AsyncMutex<FramePipeline>> {
        let mut pipelines = self.pipelines.lock().unwrap();
        pipelines
            .entry(stream_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(new_pipeline(stream_id, settings))))
            .clone()
    }

    pub fn remove_pipeline(&self, stream_id: &StreamId) {
        self.pipelines.lock().unwrap().remove(stream_id);
    }

    pub fn active_pipeline_count(&self) -> usize {
        self.pipelines.lock().unwrap().len()
    }
}

fn new_pipeline(stream_id: &StreamId, settings: &StreamSettings) -> FramePipeline {
    FramePipeline::new(
        stream_id.clone(),
        Box::new(MotionBlobDetector::new(settings.conf_threshold)),
        Box::new(TemplatePoseAdapter::new()),
        TrackerConfig {
            iou_threshold: settings.iou_threshold,
            min_hits: settings.min_hits,
            max_age: settings.max_age,
            pixel_to_meter: settings.pixel_to_meter,
            smoothing_window: settings.smoothing_window,
            ..TrackerConfig::default()
        },
        KinematicsConfig {
            fps: settings.target_fps,
            ..KinematicsConfig::default()
        },
        settings.target_fps,
    )
}
