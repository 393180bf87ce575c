use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// The kind given to events that don't name one.
pub const DEFAULT_KIND: &str = "message";

/// One unit of published information.
///
/// The payload is always held as raw bytes. Structured payloads are coerced
/// to compact JSON when the event is built (see [`Event::from_json`]), which
/// keeps the bytes free of raw newlines so they can be written as a single
/// `data:` line.
///
/// Events are built with the `with_*` methods and then shared behind an `Arc`
/// by the hub, so nothing mutates them once they have been published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    kind: String,
    #[serde(
        serialize_with = "serialize_data",
        deserialize_with = "deserialize_data"
    )]
    data: Vec<u8>,
    origin: String,
    #[serde(rename = "lastEventId")]
    id: String,
    source: String,
}

impl Event {
    /// Builds a `message` event around raw payload bytes. The id is taken
    /// from the current UTC time in seconds and never changes afterwards.
    pub fn new(data: impl Into<Vec<u8>>, source: impl Into<String>) -> Self {
        Self {
            kind: DEFAULT_KIND.to_string(),
            data: data.into(),
            origin: String::new(),
            id: timestamp_id(),
            source: source.into(),
        }
    }

    /// Builds a `message` event whose payload is `value` serialized as
    /// compact JSON.
    pub fn from_json<T: Serialize + ?Sized>(
        value: &T,
        source: impl Into<String>,
    ) -> Result<Self, Error> {
        let data = serde_json::to_vec(value)?;
        Ok(Self::new(data, source))
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The payload as text. Invalid UTF-8 sequences are replaced.
    pub fn data_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parses the payload as a JSON object.
    pub fn decode_data(&self) -> Result<Map<String, Value>, Error> {
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// Renders the whole event as a JSON object.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An empty event of the default kind. Unlike [`Event::new`] this does not
/// stamp an id, which is what a decoder wants for fields a frame left out.
impl Default for Event {
    fn default() -> Self {
        Self {
            kind: DEFAULT_KIND.to_string(),
            data: Vec::new(),
            origin: String::new(),
            id: String::new(),
            source: String::new(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type: {}\ndata: {}\norigin: {}\nlastEventId: {}\nsource: {}",
            self.kind,
            self.data_lossy(),
            self.origin,
            self.id,
            self.source
        )
    }
}

fn timestamp_id() -> String {
    chrono::Utc::now().timestamp().to_string()
}

fn serialize_data<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(data))
}

fn deserialize_data<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let data = String::deserialize(deserializer)?;
    Ok(data.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_event_is_a_message_with_a_timestamp_id() {
        let event = Event::new("hello", "host-a");

        assert_eq!(event.kind(), "message");
        assert_eq!(event.data(), b"hello");
        assert_eq!(event.origin(), "");
        assert_eq!(event.source(), "host-a");
        assert!(!event.id().is_empty());
        assert!(event.id().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn id_is_fixed_at_construction() {
        let event = Event::new("hello", "host-a");
        let copy = event.clone();

        assert_eq!(event.id(), copy.id());
    }

    #[test]
    fn from_json_produces_compact_newline_free_payload() {
        let value = json!({"set1": {"val1": "line one\nline two"}});
        let event = Event::from_json(&value, "host-a").unwrap();

        assert!(!event.data().contains(&b'\n'));
        assert_eq!(
            event.data_lossy(),
            r#"{"set1":{"val1":"line one\nline two"}}"#
        );
    }

    #[test]
    fn decode_data_returns_the_structured_payload() {
        let event = Event::from_json(&json!({"set2": {"val1": "foo"}}), "host-a").unwrap();
        let map = event.decode_data().unwrap();

        assert_eq!(map["set2"]["val1"], "foo");
    }

    #[test]
    fn decode_data_rejects_non_json_payloads() {
        let event = Event::new("not json", "host-a");

        assert!(matches!(event.decode_data(), Err(Error::Serialization(_))));
    }

    #[test]
    fn json_view_uses_wire_field_names() {
        let event = Event::default()
            .with_data("hi")
            .with_origin("browser")
            .with_id("42")
            .with_source("host-a");

        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "message",
                "data": "hi",
                "origin": "browser",
                "lastEventId": "42",
                "source": "host-a",
            })
        );
        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn display_is_one_field_per_line() {
        let event = Event::default().with_data("hi").with_id("7");

        assert_eq!(
            event.to_string(),
            "type: message\ndata: hi\norigin: \nlastEventId: 7\nsource: "
        );
    }
}
