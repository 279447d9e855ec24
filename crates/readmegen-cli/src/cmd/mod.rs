pub mod config;
pub mod generate;
pub mod hooks;
pub mod init;
pub mod workflow;
