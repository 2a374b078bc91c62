//! Greeting detection and canned guardrail replies.

use crate::types::IntentLabel;
use regex::Regex;
use std::sync::OnceLock;

/// Size of simulated token chunks for canned replies.
pub const GUARDRAIL_CHUNK_CHARS: usize = 24;

fn greet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(hi|hello|hey|greetings|good\s+(morning|afternoon|evening))\b")
            .expect("greeting pattern is valid")
    })
}

/// Whether the query is a bare greeting.
pub fn is_greeting(text: &str) -> bool {
    greet_re().is_match(text)
}

/// Welcome message for a greeting turn.
pub fn greeting_message(first_name: &str) -> String {
    format!(
        "Hi {}! I'm here to help with your benefits (EOC) and claims, \
         things like copays, deductibles, in-network rules, and what you owe on a claim. \
         What would you like to check today?",
        first_name
    )
}

/// Canned reply for a non-in-scope intent label.
///
/// Returns `None` for `InScope`.
pub fn guardrail_reply(label: IntentLabel) -> Option<&'static str> {
    match label {
        IntentLabel::OffTopic => Some(
            "I'm set up to help with your health plan: benefits and costs in your \
             Evidence of Coverage (EOC), and questions about your claims (amounts, dates, \
             status, deductible, out-of-pocket, copays, etc.).\n\n\
             Try asking, for example: \"What's my specialist copay?\" or \"Show my latest \
             claim and how much I owe.\"",
        ),
        IntentLabel::Medical => Some(
            "I'm not able to provide medical advice or schedule care directly, but I'm \
             here for your plan and claims questions.\n\n\
             If you're feeling unwell, a clinician can help. If this might be urgent \
             (e.g., chest pain or trouble breathing), please seek in-person care or call \
             your local emergency number.",
        ),
        IntentLabel::InScope => None,
    }
}

/// Personalize a guardrail reply by prefixing a greeting unless it already
/// starts with one.
pub fn personalize_reply(reply: &str, first_name: &str) -> String {
    if reply.is_empty() || reply.to_lowercase().starts_with("hi") {
        reply.to_string()
    } else {
        format!("Hi {}! {}", first_name, reply)
    }
}

/// Split text into fixed-size character chunks (simulated tokens).
///
/// Splits on character boundaries, never inside a code point.
pub fn chunk_reply(text: &str, chunk_chars: usize) -> Vec<String> {
    if chunk_chars == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_chars)
        .map(|c| c.iter().collect())
        .collect()
}
