use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors produced while decoding an inbound text message.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Envelope for all text communication.
///
/// Only the `type` discriminant is interpreted; every other field is kept
/// verbatim in `fields` so that payloads survive a decode/encode cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Creates an envelope carrying only a discriminant.
    pub fn new(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: Some(msg_type.into()),
            fields: Map::new(),
        }
    }

    /// Decodes a text frame.
    ///
    /// Anything that is not a JSON object (or whose `type` is not a string)
    /// is reported as [`EnvelopeError::Malformed`].
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds an envelope from an arbitrary JSON value.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns `true` if the discriminant equals `marker`.
    pub fn is(&self, marker: &str) -> bool {
        self.msg_type.as_deref() == Some(marker)
    }

    /// Serialises the envelope into a text frame body.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
