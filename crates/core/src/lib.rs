//! Benebot Core Library
//!
//! Foundational utilities shared across the workspace:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, MemberProfile, Tuning};
pub use error::{AppError, AppResult};
