// Public module exports
pub mod events;
pub mod planner;

// Re-export main types for convenience
pub use events::AgentEvent;
pub use planner::{MoviePlanner, PlanError, PlannedCall, QueryAgent, parse_plan};
