//! Relay server, provider clients and the studio session model.

pub mod backend;
pub mod config;
pub mod fallback;
pub mod prompts;
pub mod providers;
pub mod relay;
pub mod relay_client;
pub mod studio;

#[cfg(test)]
mod test_support;

pub use backend::{DirectBackend, StudioBackend};
pub use config::{KeyRole, StudioConfig};
pub use fallback::FallbackBackend;
pub use relay::{RelayServer, RunningRelay};
pub use relay_client::RelayClient;
pub use studio::Studio;
