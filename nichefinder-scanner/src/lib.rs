pub mod client;
pub mod config;
pub mod error;
pub mod pacing;
pub mod result;

pub use client::{SuggestionClient, SuggestionSource};
pub use config::ClientConfig;
pub use error::{ClientError, FetchError};
pub use pacing::Pacing;
