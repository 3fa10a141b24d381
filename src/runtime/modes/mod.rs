//! Mode routing

pub mod cli;
pub mod serve;

pub use cli::run_cli;
pub use serve::run_serve;
