pub mod agents;
pub mod error;

pub mod handlers;
pub mod init;
pub mod openapi;
pub mod tmdb;

pub use crate::agents::{AgentEvent, MoviePlanner, QueryAgent};
pub use crate::init::{AiConfig, AppState, Config};
