use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Not started")]
    NotStarted,

    #[error("Process already started")]
    AlreadyStarted,

    #[error("Failed to capture {0} of the child process")]
    MissingPipe(&'static str),

    #[error("Process exited with code {0}")]
    ExitCode(i32),

    #[error("Process terminated by signal {0}")]
    Signal(i32),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProcessError {
    /// Map a spawn failure, calling out a missing executable
    pub(crate) fn from_spawn(error: io::Error, program: &str, args: &[String]) -> Self {
        if error.kind() == io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(program.to_string())
        } else {
            ProcessError::Spawn {
                command: format!("{} {}", program, args.join(" ")).trim_end().to_string(),
                source: error,
            }
        }
    }
}
