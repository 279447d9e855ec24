use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadmeError {
    #[error("not initialized: run 'readmegen init'")]
    NotInitialized,

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid hook manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("workflow is not triggered by {0}")]
    NotTriggered(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("git {command} failed: {output}")]
    Git { command: String, output: String },

    #[error("GitHub API returned {status} for {url}")]
    GitHubStatus { status: u16, url: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReadmeError>;
