pub mod cli;
pub mod load_config;
pub mod wordpress;
pub mod wxr;

pub use cli::{run, Cli, Commands};
