//! CLI command implementations.

pub mod repl;
pub mod run;
pub mod sample;
pub mod session;

pub use repl::repl;
pub use run::run_file;
pub use sample::print_sample;
pub use session::{load_config, open_bridge};
