/// Identity of a stream, as assigned by whoever called `start_stream`.
///
/// A thin newtype over `String` so it cannot be confused with other
/// string-typed fields (source URLs, track names) at call sites.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub String);

impl StreamId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl From<String> for StreamId {
    fn from(val: String) -> Self {
        StreamId(val)
    }
}

impl From<&str> for StreamId {
    fn from(val: &str) -> Self {
        StreamId(val.to_owned())
    }
}

impl serde::Serialize for StreamId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for StreamId {
    fn deserialize<D>(deserializer: D) -> Result<StreamId, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = serde::Deserialize::deserialize(deserializer)?;
        Ok(StreamId(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_as_a_bare_string() {
        let id = StreamId::from("court-3");
        let encoded = serde_json::to_string(&id).unwrap();
        assert_eq!(encoded, "\"court-3\"");
        let decoded: StreamId = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, id);
    }
}
