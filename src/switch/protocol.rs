//! Wire protocol for the RF switch matrix (spec §4.1, §6).
//!
//! One JSON object per line, matching the firmware's line-oriented serial
//! protocol: the host writes a `SetPortRequest`, the firmware answers with
//! a `SetPortReply` once the relay has settled.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPortRequest {
    pub set: String,
    pub to: String,
}

impl SetPortRequest {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            set: "port".to_string(),
            to: port.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPortReply {
    pub report: String,
    pub is: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_expected_shape() {
        let req = SetPortRequest::new("short");
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"set":"port","to":"short"}"#);
    }

    #[test]
    fn reply_deserializes_from_firmware_line() {
        let reply: SetPortReply = serde_json::from_str(r#"{"report":"port","is":"short"}"#).unwrap();
        assert_eq!(reply.report, "port");
        assert_eq!(reply.is, "short");
    }
}
