//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod sql;
mod tools;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::{run_config, settings_for};
pub use doctor::run_doctor;
pub use sql::run_sql;
pub use tools::run_tools;
