//! Turns one submitted command line into builtin calls or child processes.

use crate::builtin;
use crate::env::Environment;
use crate::errors::{ShellError, ShellResult};
use crate::external::{self, ExternalCommand};
use crate::history::HistoryRing;
use crate::lexer::{self, CommandLine};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use tracing::debug;

/// Diagnostic suffix printed when a program cannot be started.
const COMMAND_NOT_FOUND: &str = ": command or path not found";

/// What happened to a submitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The line had no words.
    Empty,
    /// A builtin ran in the shell process.
    Builtin,
    /// This many child processes were started and waited for.
    Spawned { children: usize },
}

/// A child started by the executor.
enum Running {
    Process { name: String, child: Child },
    Forked { pid: libc::pid_t },
}

impl Running {
    fn wait(self) -> io::Result<()> {
        match self {
            Running::Process { name, mut child } => {
                let status = child.wait()?;
                debug!(command = %name, code = external::exit_code(status), "child exited");
            }
            Running::Forked { pid } => {
                let mut status = 0;
                loop {
                    // SAFETY: `pid` is a child of this process that has not been reaped yet.
                    let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
                    if rc == pid {
                        break;
                    }
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err);
                    }
                }
                debug!(pid, status, "forked child exited");
            }
        }
        Ok(())
    }
}

/// Executes command lines on behalf of the read loop.
///
/// Owns everything a command can change: the history, the environment (working
/// directory) and the FIFO used for two-stage pipelines.
pub struct Executor {
    env: Environment,
    history: HistoryRing,
    fifo: Option<PathBuf>,
}

impl Executor {
    pub fn new(env: Environment, fifo: Option<PathBuf>) -> Self {
        Self {
            env,
            history: HistoryRing::new(),
            fifo,
        }
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    /// Record, tokenize and run one command line.
    ///
    /// The line is stored in the history before anything else happens, so even
    /// lines that fail to parse or start keep their slot.
    pub fn execute(&mut self, line: &str) -> ShellResult<Outcome> {
        self.history.record(line);

        let CommandLine { first, second } = lexer::split_into_stages(line, self.fifo.is_some())?;
        if let Some(second) = second {
            let fifo = self.fifo.clone().ok_or(ShellError::FifoRequired)?;
            return self.run_pipeline(&fifo, &first, &second);
        }
        if first.is_empty() {
            return Ok(Outcome::Empty);
        }

        if let Some(result) = builtin::dispatch(&first, &mut self.env) {
            result?;
            return Ok(Outcome::Builtin);
        }

        let running = if matches!(first.as_slice(), [name] if name == "history") {
            Some(fork_history_listing(&self.history.listing())?)
        } else {
            self.launch(&first, Stdio::inherit(), Stdio::inherit())?
        };
        Ok(Outcome::Spawned {
            children: wait_all(running.into_iter().collect()),
        })
    }

    /// Run `producer | consumer` with the FIFO carrying the bytes between them.
    fn run_pipeline(
        &self,
        fifo: &Path,
        producer: &[String],
        consumer: &[String],
    ) -> ShellResult<Outcome> {
        let (reader, writer) = open_fifo_pair(fifo)?;

        let mut children = Vec::with_capacity(2);
        let mut failure = None;
        let stages = [
            (producer, Stdio::inherit(), Stdio::from(writer)),
            (consumer, Stdio::from(reader), Stdio::inherit()),
        ];
        for (argv, stdin, stdout) in stages {
            match self.launch(argv, stdin, stdout) {
                Ok(Some(running)) => children.push(running),
                Ok(None) => {}
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        let spawned = wait_all(children);
        match failure {
            Some(err) => Err(err),
            None => Ok(Outcome::Spawned { children: spawned }),
        }
    }

    /// Start `argv` as an external program.
    ///
    /// An unknown program is reported here and yields `Ok(None)`; the shell carries on
    /// as if the command had run.
    fn launch(
        &self,
        argv: &[String],
        stdin: Stdio,
        stdout: Stdio,
    ) -> ShellResult<Option<Running>> {
        let name = &argv[0];
        let Some(cmd) = ExternalCommand::resolve(&self.env, argv) else {
            eprintln!("{} {}", name, COMMAND_NOT_FOUND);
            return Ok(None);
        };

        debug!(command = %name, program = %cmd.program().display(), "spawning");
        match cmd.spawn(stdin, stdout) {
            Ok(child) => Ok(Some(Running::Process {
                name: name.clone(),
                child,
            })),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                ) =>
            {
                eprintln!("{} {}", name, COMMAND_NOT_FOUND);
                Ok(None)
            }
            Err(err) => Err(ShellError::Spawn(err)),
        }
    }
}

/// Wait for every child, in spawn order. Returns how many were waited for.
fn wait_all(children: Vec<Running>) -> usize {
    let count = children.len();
    for running in children {
        if let Err(err) = running.wait() {
            debug!(%err, "wait failed");
        }
    }
    count
}

/// Open both ends of the FIFO without blocking the shell.
///
/// Opening the read end non-blocking succeeds at once; the write end then finds a
/// reader and succeeds too. The read end is switched back to blocking before it is
/// handed to the consumer.
fn open_fifo_pair(path: &Path) -> ShellResult<(File, File)> {
    let fifo_error = |source| ShellError::Fifo {
        path: path.to_path_buf(),
        source,
    };

    let reader = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(fifo_error)?;
    let writer = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(fifo_error)?;
    set_blocking(&reader).map_err(fifo_error)?;
    Ok((reader, writer))
}

fn set_blocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: `fd` is a valid descriptor owned by `file` for the duration of the calls.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags == -1 || libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Fork a child that writes the pre-rendered history listing to stdout and exits.
///
/// The listing is rendered by the parent so the child only needs `write` and `_exit`.
fn fork_history_listing(listing: &[u8]) -> ShellResult<Running> {
    io::stdout().flush()?;

    // SAFETY: the child only calls async-signal-safe functions before `_exit`.
    let pid = unsafe { libc::fork() };
    match pid {
        -1 => Err(ShellError::Spawn(io::Error::last_os_error())),
        0 => unsafe {
            let mut rest = listing;
            while !rest.is_empty() {
                let n = libc::write(libc::STDOUT_FILENO, rest.as_ptr().cast(), rest.len());
                if n <= 0 {
                    break;
                }
                rest = &rest[n as usize..];
            }
            libc::_exit(0)
        },
        pid => Ok(Running::Forked { pid }),
    }
}
