//! Benebot Agents
//!
//! The conversation core: intent gating, source routing, the per-source
//! retrieve-then-generate agents, the streaming turn orchestrator and
//! session persistence.

pub mod agent;
pub mod events;
pub mod guardrail;
pub mod intent;
pub mod orchestrator;
pub mod router;
pub mod session;
pub mod sources;
pub mod types;

pub use agent::SourceAgent;
pub use events::StreamEvent;
pub use intent::{IntentGate, IntentSeeds, IntentThresholds};
pub use orchestrator::{EventStream, Orchestrator};
pub use router::{Router, RouterKeywords};
pub use session::{
    history_block, MemorySessionStore, Session, SessionStore, SqliteSessionStore, TurnMeta,
};
pub use sources::{BenefitsAgent, ClaimsAgent};
pub use types::{
    ChatMessage, ChatRole, Citation, IntentLabel, IntentScores, RouteDecision, AGENT_CLAIMS,
    AGENT_GUARDRAIL, AGENT_PDF,
};
