/// A point in time, represented internally as nanoseconds since the Unix
/// epoch for monotonic, collision-free ordering, and at the wire boundary as
/// `f64` seconds (matching the original `analytics.timestamp` convention and
/// spec's `AnalyticsRecord.timestamp` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_nanos(ns: u64) -> Self {
        Timestamp(ns)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Timestamp((secs * 1e9).round() as u64)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1e9
    }

    pub fn duration_since_secs(&self, earlier: Timestamp) -> f64 {
        (self.0.saturating_sub(earlier.0)) as f64 / 1e9
    }
}

impl serde::Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> serde::Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Timestamp, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let secs: f64 = serde::Deserialize::deserialize(deserializer)?;
        Ok(Timestamp::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_seconds_through_nanoseconds() {
        let t = Timestamp::from_secs_f64(1_700_000_000.5);
        approx::assert_relative_eq!(t.as_secs_f64(), 1_700_000_000.5, max_relative = 1e-9);
    }

    #[test]
    fn duration_since_is_nonnegative_for_later_timestamps() {
        let earlier = Timestamp::from_nanos(1_000_000_000);
        let later = Timestamp::from_nanos(1_033_333_333);
        approx::assert_relative_eq!(
            later.duration_since_secs(earlier),
            1.0 / 30.0,
            max_relative = 1e-6
        );
    }

    #[test]
    fn serializes_to_a_plain_json_number() {
        let t = Timestamp::from_secs_f64(42.0);
        assert_eq!(serde_json::to_string(&t).unwrap(), "42.0");
    }
}
