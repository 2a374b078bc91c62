//! Concrete source agents.

pub mod benefits;
pub mod claims;

pub use benefits::BenefitsAgent;
pub use claims::ClaimsAgent;
