use std::fmt;

/// Terminal game state reported by the rules engine when no move exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Checkmate,
    Stalemate,
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOutcome::Checkmate => write!(f, "checkmate"),
            GameOutcome::Stalemate => write!(f, "stalemate"),
        }
    }
}

/// Custom error types for the coaching engine's move-selection core
#[derive(Debug, Clone)]
pub enum CoachEngineError {
    /// Malformed position input from the caller; rejected before any search
    InvalidPosition(String),
    /// Checkmate or stalemate: there is no move to return
    NoLegalMoves(GameOutcome),
    /// Signature history store operation failed
    StoreError(String),
    /// Configuration error (bad level, zero budget floor, ...)
    ConfigurationError(String),
    /// File I/O operation failed
    IoError(String),
}

impl fmt::Display for CoachEngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoachEngineError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            CoachEngineError::NoLegalMoves(outcome) => {
                write!(f, "No legal moves: position is {}", outcome)
            }
            CoachEngineError::StoreError(msg) => write!(f, "Signature store error: {}", msg),
            CoachEngineError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CoachEngineError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for CoachEngineError {}

// Convenience type alias
pub type Result<T> = std::result::Result<T, CoachEngineError>;

// Convert from common error types
impl From<std::io::Error> for CoachEngineError {
    fn from(error: std::io::Error) -> Self {
        CoachEngineError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for CoachEngineError {
    fn from(error: serde_json::Error) -> Self {
        CoachEngineError::StoreError(format!("JSON serialization error: {}", error))
    }
}

impl From<bincode::Error> for CoachEngineError {
    fn from(error: bincode::Error) -> Self {
        CoachEngineError::StoreError(format!("Binary serialization error: {}", error))
    }
}

impl From<rusqlite::Error> for CoachEngineError {
    fn from(error: rusqlite::Error) -> Self {
        CoachEngineError::StoreError(error.to_string())
    }
}
