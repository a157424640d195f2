//! CLI command implementations.

mod add;
mod ask;
mod config;
mod doctor;
mod list;
mod remove;
mod serve;

pub use add::run_add;
pub use ask::run_ask;
pub use config::run_config;
pub use doctor::run_doctor;
pub use list::run_list;
pub use remove::run_remove;
pub use serve::run_serve;
