pub mod errors;
pub mod logger;

pub use errors::{CliError, Result};
