pub mod util;
pub mod config;
pub mod lang;
pub mod analysis;
pub mod example;
pub mod grammar;
pub mod solver;

pub use util::error::{Error, ErrorKind, Result};
pub use config::Config;
