pub mod client;
pub mod errors;
pub mod webhook;

pub use client::{CardData, GatewayClient};
pub use errors::{CategorizedError, ErrorCategory, GatewayError, SuggestedAction, categorize};
