use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    // Configuration errors, caught once at construction time.
    ConfigInvalid(String),

    // Input loading errors.
    TraceLoad(std::io::Error),
    SeedLoad(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ConfigInvalid(reason) => {
                write!(f, "invalid engine configuration: {}", reason)
            },
            EngineError::TraceLoad(err) => write!(f, "failed to load instruction trace: {}", err),
            EngineError::SeedLoad(err) => write!(f, "failed to load seed file: {}", err),
        }
    }
}

impl Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::TraceLoad(error)
    }
}
