//! Wire events. One JSON object per line:
//! `{"event": "<name>", "payload": <optional json>}`.

use neurofeed::{ActivityFrame, ConfigUpdate, SimulationConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ChannelMode;

/// Longest inbound line accepted, in bytes.
pub const MAX_LINE_BYTES: usize = 1 << 20;

pub const CONNECTION_ALREADY_ACTIVE: &str = "Connection already active.";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("invalid payload for {event}: {reason}")]
    Payload { event: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Value,
}

/// Control requests from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Start or restart the feed, after applying any parameters in the payload.
    StartSimulation(ConfigUpdate),
    StopSimulation,
    /// Stop the feed and rewind the step counter.
    ResetSimulation,
    UpdateConfig(ConfigUpdate),
    GetStatus,
}

impl Inbound {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let Envelope { event, payload } = serde_json::from_str(line)?;

        match event.as_str() {
            // The last three are names used by earlier dashboard drafts.
            "start-simulation" | "init-simulation" | "continue-simulation"
            | "resume-simulation" => match payload {
                Value::Null => Ok(Inbound::StartSimulation(ConfigUpdate::default())),
                ref p => Ok(Inbound::StartSimulation(parse_update(&event, p)?)),
            },
            "stop-simulation" => Ok(Inbound::StopSimulation),
            "reset-simulation" => Ok(Inbound::ResetSimulation),
            "update-config" => match payload {
                Value::Null => Err(ProtocolError::Payload {
                    event,
                    reason: "missing payload".to_string(),
                }),
                ref p => Ok(Inbound::UpdateConfig(parse_update(&event, p)?)),
            },
            "get-status" => Ok(Inbound::GetStatus),
            _ => Err(ProtocolError::UnknownEvent(event)),
        }
    }
}

fn parse_update(event: &str, payload: &Value) -> Result<ConfigUpdate, ProtocolError> {
    ConfigUpdate::from_payload(payload).map_err(|e| ProtocolError::Payload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectInfo {
    pub session_id: u64,
    pub mode: ChannelMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub running: bool,
    pub step: u64,
    pub step_duration: u64,
    pub config: SimulationConfig,
}

/// Events pushed to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum Outbound {
    Connect(ConnectInfo),
    Disconnect(Notice),
    NewActivity(ActivityFrame),
    Status(StatusReport),
    ErrorNotification(Notice),
    InfoNotification(Notice),
}

impl Outbound {
    pub fn info(msg: impl Into<String>) -> Self {
        Outbound::InfoNotification(Notice { msg: msg.into() })
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Outbound::ErrorNotification(Notice { msg: msg.into() })
    }

    pub fn disconnect(msg: impl Into<String>) -> Self {
        Outbound::Disconnect(Notice { msg: msg.into() })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Outbound::Connect(_) => "connect",
            Outbound::Disconnect(_) => "disconnect",
            Outbound::NewActivity(_) => "new-activity",
            Outbound::Status(_) => "status",
            Outbound::ErrorNotification(_) => "error-notification",
            Outbound::InfoNotification(_) => "info-notification",
        }
    }

    /// The event as a single JSON line, without the trailing newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
