//! A small interactive command interpreter.
//!
//! Each input line is recorded in a fixed-size history, split on spaces and either
//! handled by a builtin (`cd`/`chdir`, `limit`) or run as external programs. A line
//! of the form `cmd1 | cmd2` runs both programs at once, joined through a named pipe
//! given at startup.
//!
//! Interrupting the shell does not kill it right away: the next line is read as the
//! answer to "Are you sure you want to quit (y/n)?", see [`repl::Shell`].

mod builtin;
pub mod config;
pub mod env;
pub mod errors;
pub mod executor;
mod external;
pub mod history;
pub mod io_adapters;
pub mod lexer;
pub mod repl;
pub mod signals;

pub use config::{Args, ShellConfig};
pub use executor::{Executor, Outcome};
pub use repl::{ExitReason, Shell};
