pub mod cli;
pub mod console;
pub mod credentials;
pub mod github;
pub mod load_config;

pub use cli::{normalize_args, run, Cli};
