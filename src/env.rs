use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::CStr;
use std::path::{Path, PathBuf};

use crate::errors::{ShellError, ShellResult};

/// The shell's view of its process environment.
///
/// The environment contains:
/// - `vars`: a snapshot of environment variables, consulted for `HOME`.
/// - `current_dir`: the working directory the shell last changed into.
///
/// Directory changes are applied to the real process as well, so that every
/// program spawned afterwards inherits them.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// Look up a variable in the snapshot.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Resolve the user's home directory.
    ///
    /// `HOME` wins when set and non-empty; otherwise the user database entry for the
    /// real user id is used.
    pub fn home_dir(&self) -> ShellResult<PathBuf> {
        if let Some(home) = self.get_var("HOME").filter(|h| !h.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        passwd_home_dir().ok_or(ShellError::HomeUnresolved)
    }

    /// Change the process working directory and remember it.
    pub fn change_dir(&mut self, path: &Path) -> ShellResult<()> {
        stdenv::set_current_dir(path).map_err(|source| ShellError::ChangeDir {
            path: path.to_path_buf(),
            source,
        })?;
        self.current_dir = stdenv::current_dir().unwrap_or_else(|_| path.to_path_buf());
        Ok(())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn passwd_home_dir() -> Option<PathBuf> {
    // SAFETY: getpwuid returns either null or a pointer to a static record that
    // stays valid until the next user-database call; the directory is copied out
    // immediately. The shell is single-threaded.
    unsafe {
        let entry = libc::getpwuid(libc::getuid());
        if entry.is_null() || (*entry).pw_dir.is_null() {
            return None;
        }
        let dir = CStr::from_ptr((*entry).pw_dir).to_string_lossy().into_owned();
        if dir.is_empty() { None } else { Some(PathBuf::from(dir)) }
    }
}
