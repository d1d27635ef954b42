//! Pure derivation of [`DerivedEvent`]s from an [`AnalyticsRecord`]. No
//! state is kept here — deduplication across frames is the consumer's
//! responsibility, per spec.

use analytics_types::{
    AlertKind, AnalyticsRecord, Alert, DerivedEvent, Opportunity, OpportunityKind, Severity,
    Timestamp,
};
use serde_json::json;

const SPEED_OPPORTUNITY_WINDOW_SECS: f64 = 30.0;
const POSE_OPPORTUNITY_WINDOW_SECS: f64 = 20.0;

const HIGH_SPEED_THRESHOLD_KMH: f64 = 20.0;
const SPEED_ALERT_THRESHOLD_KMH: f64 = 50.0;
const EXTREME_ANGLE_LOW_DEG: f64 = 30.0;
const EXTREME_ANGLE_HIGH_DEG: f64 = 150.0;
const DEEP_CROUCH_THRESHOLD_DEG: f64 = 90.0;
const HIGH_PROCESSING_TIME_SECS: f64 = 0.5;
const UNUSUAL_MOTION_ENERGY: f64 = 0.8;

/// Every opportunity and alert this record triggers. Order: speed
/// opportunities, pose opportunities, then alerts in table order.
pub fn derive(record: &AnalyticsRecord) -> Vec<DerivedEvent> {
    let mut events = Vec::new();
    events.extend(speed_opportunities(record).into_iter().map(DerivedEvent::Opportunity));
    events.extend(pose_opportunities(record).into_iter().map(DerivedEvent::Opportunity));
    events.extend(alerts(record).into_iter().map(DerivedEvent::Alert));
    events
}

fn speed_opportunities(record: &AnalyticsRecord) -> Vec<Opportunity> {
    let Some(vibrio) = record.vibrio.as_ref() else {
        return Vec::new();
    };
    vibrio
        .tracks
        .iter()
        .filter(|track| track.speed > HIGH_SPEED_THRESHOLD_KMH)
        .map(|track| Opportunity {
            stream_id: record.stream_id.clone(),
            timestamp: record.timestamp,
            kind: OpportunityKind::HighSpeed,
            confidence: (track.speed / 50.0).min(1.0),
            message: format!("High speed detected: {:.1} km/h", track.speed),
            metadata: json!({
                "track_id": track.track_id,
                "speed": track.speed,
                "position": track.position,
            }),
            expires_at: add_secs(record.timestamp, SPEED_OPPORTUNITY_WINDOW_SECS),
        })
        .collect()
}

fn pose_opportunities(record: &AnalyticsRecord) -> Vec<Opportunity> {
    let Some(moriarty) = record.moriarty.as_ref() else {
        return Vec::new();
    };
    if !moriarty.pose_detected {
        return Vec::new();
    }

    let mut opportunities: Vec<Opportunity> = moriarty
        .biomechanics
        .joint_angles
        .iter()
        .filter(|(_, angle)| **angle < EXTREME_ANGLE_LOW_DEG || **angle > EXTREME_ANGLE_HIGH_DEG)
        .map(|(joint, angle)| Opportunity {
            stream_id: record.stream_id.clone(),
            timestamp: record.timestamp,
            kind: OpportunityKind::ExtremePose,
            confidence: 0.8,
            message: format!("Extreme {joint} angle: {angle:.1}\u{b0}"),
            metadata: json!({
                "joint": joint,
                "angle": angle,
                "pose_quality": moriarty.pose_quality_score,
            }),
            expires_at: add_secs(record.timestamp, POSE_OPPORTUNITY_WINDOW_SECS),
        })
        .collect();

    if let (Some(left), Some(right)) = (
        moriarty.biomechanics.joint_angles.get("left_knee"),
        moriarty.biomechanics.joint_angles.get("right_knee"),
    ) {
        let mean = (left + right) / 2.0;
        if mean < DEEP_CROUCH_THRESHOLD_DEG {
            opportunities.push(Opportunity {
                stream_id: record.stream_id.clone(),
                timestamp: record.timestamp,
                kind: OpportunityKind::DeepCrouch,
                confidence: (DEEP_CROUCH_THRESHOLD_DEG - mean) / DEEP_CROUCH_THRESHOLD_DEG,
                message: format!("Deep crouch detected: mean knee angle {mean:.1}\u{b0}"),
                metadata: json!({
                    "left_knee": left,
                    "right_knee": right,
                    "mean_knee_angle": mean,
                    "pose_quality": moriarty.pose_quality_score,
                }),
                expires_at: add_secs(record.timestamp, POSE_OPPORTUNITY_WINDOW_SECS),
            });
        }
    }

    opportunities
}

fn alerts(record: &AnalyticsRecord) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if record.processing_time > HIGH_PROCESSING_TIME_SECS {
        alerts.push(Alert {
            stream_id: record.stream_id.clone(),
            timestamp: record.timestamp,
            kind: AlertKind::HighProcessingTime,
            severity: Severity::Medium,
            message: format!("High processing time: {:.3}s", record.processing_time),
            metadata: json!({ "processing_time": record.processing_time }),
        });
    }

    if let Some(vibrio) = record.vibrio.as_ref() {
        let max_speed = vibrio.max_track_speed();
        if max_speed > SPEED_ALERT_THRESHOLD_KMH {
            alerts.push(Alert {
                stream_id: record.stream_id.clone(),
                timestamp: record.timestamp,
                kind: AlertKind::SpeedAlert,
                severity: Severity::High,
                message: format!("Very high speed detected: {max_speed:.1} km/h"),
                metadata: json!({ "max_speed": max_speed }),
            });
        }

        let motion_energy = vibrio.motion_energy.motion_energy;
        if motion_energy > UNUSUAL_MOTION_ENERGY {
            alerts.push(Alert {
                stream_id: record.stream_id.clone(),
                timestamp: record.timestamp,
                kind: AlertKind::UnusualMotion,
                severity: Severity::Medium,
                message: format!("High motion energy detected: {motion_energy:.2}"),
                metadata: json!({ "motion_energy": motion_energy }),
            });
        }
    }

    alerts
}

fn add_secs(timestamp: Timestamp, secs: f64) -> Timestamp {
    Timestamp::from_secs_f64(timestamp.as_secs_f64() + secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::{
        Biomechanics, FrameStats, MoriartyData, MotionEnergy, OpticalFlow, Point2, StreamId,
        TrackSummary, VibrioData,
    };
    use std::collections::HashMap;

    fn base_record() -> AnalyticsRecord {
        AnalyticsRecord {
            stream_id: StreamId::from("court-1"),
            frame_idx: 0,
            timestamp: Timestamp::from_secs_f64(100.0),
            vibrio: None,
            moriarty: None,
            processing_time: 0.01,
            error: None,
        }
    }

    fn track(speed: f64) -> TrackSummary {
        TrackSummary {
            track_id: 1,
            position: Point2 { x: 10.0, y: 20.0 },
            speed,
            age: 5,
            bbox: [0.0, 0.0, 10.0, 10.0],
        }
    }

    #[test]
    fn high_speed_opportunity_above_threshold_only() {
        let mut record = base_record();
        record.vibrio = Some(VibrioData {
            detections: vec![],
            tracks: vec![track(25.0), track(10.0)],
            motion_energy: MotionEnergy::default(),
            optical_flow: OpticalFlow::default(),
            frame_stats: FrameStats::default(),
        });
        let events = derive(&record);
        let opportunities: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                DerivedEvent::Opportunity(o) if o.kind == OpportunityKind::HighSpeed => Some(o),
                _ => None,
            })
            .collect();
        assert_eq!(opportunities.len(), 1);
        approx::assert_relative_eq!(opportunities[0].confidence, 0.5);
    }

    #[test]
    fn speed_alert_fires_above_fifty_kmh_with_high_severity() {
        let mut record = base_record();
        record.vibrio = Some(VibrioData {
            detections: vec![],
            tracks: vec![track(55.0)],
            motion_energy: MotionEnergy::default(),
            optical_flow: OpticalFlow::default(),
            frame_stats: FrameStats::default(),
        });
        let events = derive(&record);
        let alert = events.iter().find_map(|e| match e {
            DerivedEvent::Alert(a) if a.kind == AlertKind::SpeedAlert => Some(a),
            _ => None,
        });
        assert!(alert.is_some());
        assert_eq!(alert.unwrap().severity, Severity::High);
    }

    #[test]
    fn extreme_pose_opportunity_for_out_of_range_joint_angle() {
        let mut record = base_record();
        let mut joint_angles = HashMap::new();
        joint_angles.insert("left_elbow".to_string(), 160.0);
        record.moriarty = Some(MoriartyData {
            pose_detected: true,
            landmarks: HashMap::new(),
            biomechanics: Biomechanics {
                joint_angles,
                velocities: HashMap::new(),
                center_of_mass: None,
            },
            pose_quality_score: 0.9,
        });
        let events = derive(&record);
        assert!(events.iter().any(|e| matches!(
            e,
            DerivedEvent::Opportunity(o) if o.kind == OpportunityKind::ExtremePose
        )));
    }

    #[test]
    fn deep_crouch_opportunity_from_mean_knee_angle() {
        let mut record = base_record();
        let mut joint_angles = HashMap::new();
        joint_angles.insert("left_knee".to_string(), 70.0);
        joint_angles.insert("right_knee".to_string(), 80.0);
        record.moriarty = Some(MoriartyData {
            pose_detected: true,
            landmarks: HashMap::new(),
            biomechanics: Biomechanics {
                joint_angles,
                velocities: HashMap::new(),
                center_of_mass: None,
            },
            pose_quality_score: 0.9,
        });
        let events = derive(&record);
        let crouch = events.iter().find_map(|e| match e {
            DerivedEvent::Opportunity(o) if o.kind == OpportunityKind::DeepCrouch => Some(o),
            _ => None,
        });
        assert!(crouch.is_some());
        approx::assert_relative_eq!(crouch.unwrap().confidence, (90.0 - 75.0) / 90.0);
    }

    #[test]
    fn no_pose_detected_yields_no_pose_opportunities() {
        let mut record = base_record();
        record.moriarty = Some(MoriartyData {
            pose_detected: false,
            landmarks: HashMap::new(),
            biomechanics: Biomechanics::default(),
            pose_quality_score: 0.0,
        });
        let events = derive(&record);
        assert!(events.is_empty());
    }

    #[test]
    fn high_processing_time_alert_fires_above_half_a_second() {
        let mut record = base_record();
        record.processing_time = 0.6;
        let events = derive(&record);
        assert!(events.iter().any(|e| matches!(
            e,
            DerivedEvent::Alert(a) if a.kind == AlertKind::HighProcessingTime
        )));
    }

    #[test]
    fn unusual_motion_alert_fires_above_threshold() {
        let mut record = base_record();
        record.vibrio = Some(VibrioData {
            detections: vec![],
            tracks: vec![],
            motion_energy: MotionEnergy { motion_energy: 0.9, active_regions: vec![] },
            optical_flow: OpticalFlow::default(),
            frame_stats: FrameStats::default(),
        });
        let events = derive(&record);
        assert!(events.iter().any(|e| matches!(
            e,
            DerivedEvent::Alert(a) if a.kind == AlertKind::UnusualMotion
        )));
    }

    #[test]
    fn opportunity_expiry_uses_the_correct_window_per_kind() {
        let mut record = base_record();
        record.vibrio = Some(VibrioData {
            detections: vec![],
            tracks: vec![track(30.0)],
            motion_energy: MotionEnergy::default(),
            optical_flow: OpticalFlow::default(),
            frame_stats: FrameStats::default(),
        });
        let events = derive(&record);
        let opportunity = events.iter().find_map(|e| match e {
            DerivedEvent::Opportunity(o) => Some(o),
            _ => None,
        }).unwrap();
        approx::assert_relative_eq!(
            opportunity.expires_at.as_secs_f64() - record.timestamp.as_secs_f64(),
            30.0
        );
    }
}
