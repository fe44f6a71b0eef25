pub mod command;
pub mod config;
pub mod error;
pub mod repl;
pub mod state;

pub use command::Command;
pub use config::Config;
pub use error::{CliError, Result};
pub use repl::Repl;
pub use state::AppState;
