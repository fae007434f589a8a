//! CLI command implementations
//!
//! Provides command handlers for the opsgraph binary.

pub mod config;
pub mod logging;
pub mod workflow;

pub use config::{handle_show as handle_config_show, load_config};
pub use logging::init_logging;
pub use workflow::{handle_route, handle_run, parse_context};
