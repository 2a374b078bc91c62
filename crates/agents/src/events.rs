//! Orchestrator output events and their wire encoding.

use crate::types::Citation;
use benebot_core::AppResult;
use serde::{Deserialize, Serialize};

/// One event on the orchestrator's output stream.
///
/// Per agent tag, `Citations` precedes every `Token`, which precede that
/// agent's `Done`. `Final` is always the last event of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    Route {
        thread_id: String,
        route: String,
    },
    Citations {
        agent: String,
        citations: Vec<Citation>,
    },
    Token {
        agent: String,
        token: String,
    },
    Done {
        agent: String,
    },
    Final {
        thread_id: String,
        answer: String,
    },
}

impl StreamEvent {
    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Route { .. } => "route",
            StreamEvent::Citations { .. } => "citations",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Final { .. } => "final",
        }
    }

    /// Encode as one server-sent-events frame.
    ///
    /// The payload is the event's JSON body without the tag field. Each
    /// line of the payload gets its own `data: ` prefix, per the SSE
    /// framing rules.
    pub fn to_sse(&self) -> AppResult<String> {
        let mut payload = serde_json::to_value(self)?;
        if let Some(obj) = payload.as_object_mut() {
            obj.remove("event");
        }
        let data = serde_json::to_string(&payload)?;

        let mut frame = format!("event: {}\n", self.name());
        for line in data.lines() {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        Ok(frame)
    }
}
