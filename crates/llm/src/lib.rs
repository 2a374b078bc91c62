//! Benebot LLM Library
//!
//! Unified interface for LLM providers:
//! - `LlmClient` trait with completion and token streaming
//! - Ollama provider (local NDJSON streaming)
//! - OpenAI provider (chat completions, SSE streaming)
//! - Provider factory

pub mod client;
pub mod factory;
pub mod providers;

pub use client::{LlmClient, LlmRequest, LlmResponse, TokenChunk, TokenStream};
pub use factory::create_client;
