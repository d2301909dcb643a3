use thiserror::Error;

#[derive(Error, Debug)]
pub enum JenLensError {
    #[error("invalid locator `{input}`: expected {expected}")]
    InvalidLocator { input: String, expected: String },

    #[error("build not found: {path} #{build_number}")]
    BuildNotFound { path: String, build_number: u64 },

    #[error("step {node_id} not found in {path} #{build_number}")]
    NodeNotFound {
        path: String,
        build_number: u64,
        node_id: String,
    },

    #[error("authentication failed (HTTP {status}): check your Jenkins user and API token")]
    AuthFailure { status: u16 },

    #[error("API request failed (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed API response: {0}")]
    Malformed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JenLensError {
    /// Process exit code for this error kind, used by the CLI boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidLocator { .. } | Self::Config(_) => 2,
            Self::BuildNotFound { .. } | Self::NodeNotFound { .. } => 3,
            Self::AuthFailure { .. } => 4,
            Self::Network(_) => 5,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, JenLensError>;
