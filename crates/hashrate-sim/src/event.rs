/*!
Events exchanged between mining agents and the controller

Each [`Event`] travels as a single line of JSON. The variant is selected by
the `event_type` field, and every line carries the constant marker
`"type": "Event"`:

```
use hashrate_sim::event::Event;

let line = Event::block_found("majority").encode().unwrap();
assert_eq!(
    line,
    r#"{"type":"Event","event_type":"Block found","source":"majority"}"#
);
```
*/

use serde::{Deserialize, Serialize};

/// Throughput snapshot reported by an agent about once per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Hash attempts made during the last statistics interval.
    pub hashrate_s: f64,
    /// Blocks found per second since the run started.
    pub blocks_s: f64,
    /// Accumulated scheduling drift in seconds.
    pub time_error: f64,
    /// Blocks found by the reporting agent since the run started.
    pub block_count: u64,
}

/// A message emitted by a mining agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum Event {
    /// A simulated hash satisfied the discovery condition.
    #[serde(rename = "Block found")]
    BlockFound { source: String },
    /// Periodic throughput report.
    #[serde(rename = "Statistics")]
    Statistics { source: String, payload: Statistics },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Marker {
    #[default]
    Event,
}

#[derive(Serialize, Deserialize)]
struct Envelope<E> {
    #[serde(rename = "type", default)]
    marker: Marker,
    #[serde(flatten)]
    event: E,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty line")]
    Empty,
    #[error("line is not a known event")]
    Malformed(#[from] serde_json::Error),
}

impl Event {
    pub fn block_found<S: Into<String>>(source: S) -> Self {
        Self::BlockFound {
            source: source.into(),
        }
    }

    pub fn statistics<S: Into<String>>(source: S, payload: Statistics) -> Self {
        Self::Statistics {
            source: source.into(),
            payload,
        }
    }

    /// Name of the agent which emitted this event.
    pub fn source(&self) -> &str {
        match self {
            Self::BlockFound { source } | Self::Statistics { source, .. } => {
                source
            }
        }
    }

    /// The wire tag of this event's variant.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BlockFound { .. } => "Block found",
            Self::Statistics { .. } => "Statistics",
        }
    }

    /// Serializes this event as a single line of JSON, without the trailing
    /// newline.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Envelope {
            marker: Marker::Event,
            event: self,
        })
    }

    /// Decodes a single line produced by [`Event::encode`]. Surrounding
    /// whitespace is ignored.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(DecodeError::Empty);
        }

        let envelope: Envelope<Event> = serde_json::from_str(line)?;

        Ok(envelope.event)
    }
}

/// A line read from an agent's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentLine {
    Event(Event),
    /// Anything which is not an event. Passed through as diagnostic output.
    Text(String),
}

impl AgentLine {
    /// Classifies `line`. Never fails: lines which don't decode as an
    /// [`Event`] are kept as [`AgentLine::Text`] with trailing whitespace
    /// removed.
    pub fn parse(line: &str) -> Self {
        match Event::decode(line) {
            Ok(event) => Self::Event(event),
            Err(_) => Self::Text(line.trim_end().to_string()),
        }
    }

    /// Same as [`AgentLine::parse`], for raw bytes which may not be valid
    /// UTF-8.
    pub fn parse_bytes(bytes: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentLine, DecodeError, Event, Statistics};

    fn stats() -> Statistics {
        Statistics {
            hashrate_s: 510.0,
            blocks_s: 0.25,
            time_error: -0.0004,
            block_count: 3,
        }
    }

    #[test]
    fn block_found_round_trip() {
        let line = Event::block_found("majority").encode().unwrap();
        let decoded = Event::decode(&line).unwrap();

        assert_eq!(decoded.event_type(), "Block found");
        assert_eq!(decoded.source(), "majority");
        assert_eq!(decoded, Event::block_found("majority"));
    }

    #[test]
    fn statistics_wire_format() {
        let line = Event::statistics("minority", stats()).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["type"], "Event");
        assert_eq!(value["event_type"], "Statistics");
        assert_eq!(value["source"], "minority");
        assert_eq!(value["payload"]["block_count"], 3);
        assert_eq!(value["payload"]["hashrate_s"], 510.0);
    }

    #[test]
    fn decode_without_marker() {
        let event =
            Event::decode(r#"{"event_type": "Block found", "source": "x"}"#)
                .unwrap();

        assert_eq!(event, Event::block_found("x"));
    }

    #[test]
    fn decode_rejects_wrong_marker() {
        let line = r#"{"type":"Other","event_type":"Block found","source":"x"}"#;

        assert!(Event::decode(line).is_err());
    }

    #[test]
    fn decode_rejects_unknown_event_type() {
        let line = r#"{"type":"Event","event_type":"Orphaned","source":"x"}"#;

        assert!(matches!(Event::decode(line), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn malformed_lines_become_text() {
        let lines = [
            "Starting mining agent majority with hashrate 510/s",
            r#"{"type":"Event","event_type":"Block fo"#,
            r#"{"event_type":"Statistics","source":"x"}"#,
            "START",
        ];

        for line in lines {
            assert_eq!(AgentLine::parse(line), AgentLine::Text(line.into()));
        }
        assert!(matches!(Event::decode("   "), Err(DecodeError::Empty)));
    }

    #[test]
    fn invalid_utf8_is_text() {
        let line = AgentLine::parse_bytes(b"\xff\xfe garbage\n");

        assert!(matches!(line, AgentLine::Text(_)));
    }

    #[test]
    fn trailing_newline_is_ignored() {
        let mut line = Event::statistics("a", stats()).encode().unwrap();
        line.push('\n');

        assert_eq!(
            AgentLine::parse(&line),
            AgentLine::Event(Event::statistics("a", stats()))
        );
    }
}
