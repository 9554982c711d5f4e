use argh::FromArgs;
use std::fs;
use std::io::IsTerminal;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(FromArgs, Debug)]
/// A small interactive shell. `cmd1 | cmd2` is connected through a named pipe,
/// so pipes only work when the path of a pre-created FIFO is given.
pub struct Args {
    #[argh(positional)]
    /// path of the FIFO used to connect the two sides of a pipe.
    pub fifo: Vec<PathBuf>,
}

/// Invocation problems that stop the shell before it starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Error: Your input is invalid. You may only enter one argument (fifo path). \
         Otherwise, you may pass a text file by redirection."
    )]
    TooManyArguments,
}

/// Startup settings, fixed for the lifetime of the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Absolute path of the FIFO; `None` disables pipes.
    pub fifo_path: Option<PathBuf>,
    /// Whether standard input is a terminal; the `> ` prompt is shown only then.
    pub interactive: bool,
}

impl ShellConfig {
    /// Validate the command line and resolve the FIFO path.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let fifo_path = match args.fifo.as_slice() {
            [] => None,
            [path] => resolve_fifo(path),
            _ => return Err(ConfigError::TooManyArguments),
        };
        Ok(Self {
            fifo_path,
            interactive: std::io::stdin().is_terminal(),
        })
    }
}

/// Make `path` absolute so it stays valid after `cd`.
///
/// An unresolvable path leaves the shell without a FIFO, like not passing one.
fn resolve_fifo(path: &Path) -> Option<PathBuf> {
    let resolved = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(err) => {
            warn!(path = %path.display(), %err, "cannot resolve FIFO path, pipes are disabled");
            return None;
        }
    };
    match fs::metadata(&resolved) {
        Ok(meta) if !meta.file_type().is_fifo() => {
            warn!(path = %resolved.display(), "not a FIFO, pipes may misbehave");
        }
        _ => {}
    }
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    fn args(paths: &[&str]) -> Args {
        Args {
            fifo: paths.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn test_no_argument_means_no_fifo() {
        let config = ShellConfig::from_args(args(&[])).unwrap();
        assert_eq!(config.fifo_path, None);
    }

    #[test]
    fn test_two_arguments_are_rejected() {
        let err = ShellConfig::from_args(args(&["a", "b"])).unwrap_err();
        assert!(matches!(err, ConfigError::TooManyArguments));
        assert!(err.to_string().contains("only enter one argument"));
    }

    #[test]
    fn test_missing_path_disables_pipes() {
        let config = ShellConfig::from_args(args(&["/no/such/fifo/rayshell"])).unwrap();
        assert_eq!(config.fifo_path, None);
    }

    #[test]
    fn test_fifo_path_is_made_absolute() {
        let dir = std::env::temp_dir().join(format!("rayshell_config_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let fifo = dir.join("p");
        let c_path = CString::new(fifo.as_os_str().as_bytes()).unwrap();
        // SAFETY: `c_path` is a valid NUL-terminated string.
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        let dotted = dir.join(".").join("p");
        let config = ShellConfig::from_args(Args { fifo: vec![dotted] }).unwrap();
        assert_eq!(config.fifo_path, Some(fs::canonicalize(&fifo).unwrap()));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_argh_accepts_one_positional() {
        let parsed = Args::from_args(&["rayshell"], &["/tmp/p"]).unwrap();
        assert_eq!(parsed.fifo, vec![PathBuf::from("/tmp/p")]);
    }
}
