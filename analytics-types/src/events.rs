use crate::{StreamId, Timestamp};

/// The distinct kinds of opportunity, as derived by Event Derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    HighSpeed,
    ExtremePose,
    DeepCrouch,
}

/// The distinct kinds of alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SpeedAlert,
    HighProcessingTime,
    UnusualMotion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A short-lived record suggesting a downstream action is timely.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Opportunity {
    pub stream_id: StreamId,
    pub timestamp: Timestamp,
    pub kind: OpportunityKind,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub message: String,
    pub metadata: serde_json::Value,
    pub expires_at: Timestamp,
}

/// A record indicating a condition of concern.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Alert {
    pub stream_id: StreamId,
    pub timestamp: Timestamp,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub metadata: serde_json::Value,
}

/// Sum type over everything Event Derivation can emit for one record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum DerivedEvent {
    Opportunity(Opportunity),
    Alert(Alert),
}
