pub mod assistant;
pub mod config;
pub mod error;
pub mod feedback;
pub mod lifecycle;
pub mod models;
pub mod router;
pub mod search;
pub mod service;
pub mod session;
pub mod transport;
pub mod validation;

pub use config::Config;
pub use error::{CompanionError, Result};
pub use lifecycle::Surface;
pub use service::{Companion, TurnOutcome};
