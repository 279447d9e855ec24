pub mod builtin_hooks;
pub mod config;
pub mod error;
pub mod generate;
pub mod git;
pub mod github;
pub mod hooks;
pub mod io;
pub mod paths;
pub mod runner;
pub mod schedule;
pub mod template;
pub mod workflow;

pub use error::{ReadmeError, Result};
