//! Wire schemas and the shared data model for the sports analytics
//! pipeline: everything the service, the offline CLI, and every other
//! crate in this workspace agree on without depending on each other.

mod api;
mod detection;
mod events;
mod frame;
mod pose;
mod record;
mod settings;
mod stream_id;
mod summary;
mod timestamp;
mod track;

pub use api::{
    ActiveStreamEntry, ApiResponse, HealthResponse, LatestRecordResponse, ProcessFrameRequest,
    SettingsPatchRequest, StartStreamRequest, StreamMetricsResponse,
};
pub use detection::{Bbox, Detection};
pub use events::{Alert, AlertKind, DerivedEvent, Opportunity, OpportunityKind, Severity};
pub use frame::Frame;
pub use pose::{Biomechanics, Landmark, LandmarkName, Pose};
pub use record::{AnalyticsRecord, FrameStats, MoriartyData, MotionEnergy, OpticalFlow, VibrioData};
pub use settings::{
    QualityTier, SourceConfig, SourceKind, StreamSettings, StreamSettingsPatch, StreamState,
};
pub use stream_id::StreamId;
pub use summary::{Summary, SummaryStatus};
pub use timestamp::Timestamp;
pub use track::{Point2, TrackSummary};
