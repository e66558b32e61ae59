pub mod config;
pub mod discovery;
pub mod runner;
pub mod worker;

pub use config::Config;
pub use runner::{Credentials, Runner, StatusReport};
