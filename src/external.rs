use crate::env::Environment;
use std::ffi::OsStr;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};

/// Search path used when the environment has no `PATH`.
pub const DEFAULT_PATH: &str = "/bin:/usr/bin";

/// A program that is not a builtin, resolved to an executable file.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    current_dir: PathBuf,
}

impl ExternalCommand {
    /// Resolve `argv[0]` against the environment's `PATH`.
    ///
    /// Returns `None` when no executable can be found for it.
    pub fn resolve(env: &Environment, argv: &[String]) -> Option<Self> {
        let (name, args) = argv.split_first()?;
        let search_paths = env.get_var("PATH").unwrap_or_else(|| DEFAULT_PATH.to_string());
        let program = find_command_path(OsStr::new(&search_paths), Path::new(name))?;
        Some(Self {
            name: name.clone(),
            program,
            args: args.to_vec(),
            current_dir: env.current_dir.clone(),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Start the program with the given standard streams; stderr is inherited.
    ///
    /// The child keeps the name the user typed as its `argv[0]` and starts in the
    /// directory the shell last changed into.
    pub fn spawn(&self, stdin: Stdio, stdout: Stdio) -> io::Result<Child> {
        std::process::Command::new(&self.program)
            .arg0(&self.name)
            .args(&self.args)
            .current_dir(&self.current_dir)
            .stdin(stdin)
            .stdout(stdout)
            .spawn()
    }
}

/// Shell-style exit code of a finished child: its status, or 128 + signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => -1,
    }
}

/// Resolve a command path the way a typical shell would.
///
/// - A name containing a `/` (absolute, `./foo`, `bin/sh`) is used as given.
/// - A bare name is looked up in each directory of `search_paths`, first hit wins.
/// - An empty name never resolves.
///
/// Only regular files with an execute bit count as hits.
pub fn find_command_path(search_paths: &OsStr, path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(_), None) if !path.is_absolute() && !path.starts_with(".") => {
            std::env::split_paths(search_paths)
                .map(|dir| dir.join(path))
                .find(|candidate| is_executable(candidate))
        }
        _ => is_executable(path).then(|| path.to_path_buf()),
    }
}

fn is_executable(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::{self, File};

    fn osstr(s: &str) -> &OsStr {
        OsStr::new(s)
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "rayshell_external_{}_{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn absolute_existing() {
        let found = find_command_path(osstr("/nowhere"), Path::new("/bin/sh"));
        assert_eq!(found.as_deref(), Some(Path::new("/bin/sh")));
    }

    #[test]
    fn absolute_missing() {
        assert!(find_command_path(osstr("/bin"), Path::new("/bin/nonexisting")).is_none());
    }

    #[test]
    fn bare_name_found_in_path() {
        let found = find_command_path(osstr("/nowhere:/bin"), Path::new("sh"))
            .expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found, Path::new("/bin/sh"));
    }

    #[test]
    fn bare_name_not_found() {
        assert!(find_command_path(osstr("/bin"), Path::new("nonexisting-rayshell")).is_none());
    }

    #[test]
    fn empty_name_is_none() {
        assert!(find_command_path(osstr("/bin"), Path::new("")).is_none());
    }

    #[test]
    fn directories_and_plain_files_are_skipped() {
        let dir = scratch_dir("plain");
        fs::create_dir_all(dir.join("tool")).unwrap();
        File::create(dir.join("data")).unwrap();
        let search = dir.as_os_str();

        assert!(find_command_path(search, Path::new("tool")).is_none());
        assert!(find_command_path(search, Path::new("data")).is_none());

        let script = dir.join("data");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(find_command_path(search, Path::new("data")), Some(script));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn resolve_uses_environment_path() {
        let env = Environment {
            vars: HashMap::from([("PATH".to_string(), "/bin".to_string())]),
            current_dir: PathBuf::from("/"),
        };
        let argv = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let cmd = ExternalCommand::resolve(&env, &argv).expect("sh resolves");
        assert_eq!(cmd.program(), Path::new("/bin/sh"));

        let status = cmd
            .spawn(Stdio::null(), Stdio::null())
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(exit_code(status), 3);
    }

    #[test]
    fn spawn_starts_in_the_environment_directory() {
        let dir = fs::canonicalize(scratch_dir("cwd")).unwrap();
        let env = Environment {
            vars: HashMap::from([("PATH".to_string(), "/bin:/usr/bin".to_string())]),
            current_dir: dir.clone(),
        };
        let argv = vec!["touch".to_string(), "made-here".to_string()];
        let cmd = ExternalCommand::resolve(&env, &argv).expect("touch resolves");
        cmd.spawn(Stdio::null(), Stdio::null())
            .unwrap()
            .wait()
            .unwrap();
        assert!(dir.join("made-here").exists());
        let _ = fs::remove_dir_all(dir);
    }
}
