use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single submitted command line.
///
/// None of these end the read loop: the REPL prints them and reads the next line.
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("You must pass a FIFO to use pipes")]
    FifoRequired,

    #[error("Only one pipe per command line is supported")]
    TooManyStages,

    #[error("Missing command on one side of the pipe")]
    EmptyStage,

    #[error("Too many arguments: at most {limit} per command")]
    TooManyArguments { limit: usize },

    #[error("Error: chdir failed due to memory issue or invalid home variable.")]
    HomeUnresolved,

    #[error("cd: {}: {source}", .path.display())]
    ChangeDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Limit: {0} is not a valid memory limit")]
    InvalidLimit(String),

    #[error("Limit: Memory allocation failed: {0}")]
    LimitRejected(#[source] io::Error),

    #[error("Error running command due to an issue with processes: {0}")]
    Spawn(#[source] io::Error),

    #[error("Cannot open FIFO {}: {source}", .path.display())]
    Fifo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type ShellResult<T> = Result<T, ShellError>;
