use crate::env::Environment;
use crate::errors::{ShellError, ShellResult};
use argh::FromArgs;
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed with [`argh`] (`FromArgs`) and run inside the shell process
/// instead of a child, because their effect (working directory, resource limits)
/// must be inherited by later commands.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Every name the command answers to, e.g. `["cd", "chdir"]`.
    fn names() -> &'static [&'static str];

    fn execute(self, env: &mut Environment) -> ShellResult<()>;
}

fn try_builtin<T: BuiltinCommand>(
    argv: &[String],
    env: &mut Environment,
) -> Option<ShellResult<()>> {
    let (name, args) = argv.split_first()?;
    if !T::names().contains(&name.as_str()) {
        return None;
    }
    // Builtins take no options, so every word after the name is positional.
    let words: Vec<&str> = std::iter::once("--")
        .chain(args.iter().map(String::as_str))
        .collect();
    // A rejected argument list means the line is run as an external program.
    let cmd = T::from_args(&[name.as_str()], &words).ok()?;
    debug!(builtin = %name, "running builtin");
    Some(cmd.execute(env))
}

/// Run `argv` as a builtin if it names one with a matching argument count.
///
/// Returns `None` when the line is not a builtin invocation.
pub fn dispatch(argv: &[String], env: &mut Environment) -> Option<ShellResult<()>> {
    try_builtin::<Cd>(argv, env).or_else(|| try_builtin::<Limit>(argv, env))
}

#[derive(FromArgs)]
/// Change the current working directory.
/// Without a target, or with `~`, changes to the user's home directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to change into.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn names() -> &'static [&'static str] {
        &["cd", "chdir"]
    }

    fn execute(self, env: &mut Environment) -> ShellResult<()> {
        let target = match self.target.as_deref() {
            None | Some("~") => env.home_dir()?,
            Some(path) => PathBuf::from(path),
        };
        env.change_dir(&target)
    }
}

#[derive(FromArgs)]
/// Set the soft data-segment limit of the shell and all of its future children.
pub struct Limit {
    #[argh(positional)]
    /// new limit in bytes; decimal, `0x` hex or leading-`0` octal.
    pub value: String,
}

impl BuiltinCommand for Limit {
    fn names() -> &'static [&'static str] {
        &["limit"]
    }

    fn execute(self, _env: &mut Environment) -> ShellResult<()> {
        let bytes = parse_limit(&self.value).ok_or(ShellError::InvalidLimit(self.value))?;
        set_soft_data_limit(bytes).map_err(ShellError::LimitRejected)
    }
}

/// Parse an unsigned number the way `strtoul(.., 0)` does.
///
/// A `0x` prefix selects hexadecimal and a leading `0` octal. An optional `+` is
/// accepted; signs, trailing garbage and overflow are not.
pub fn parse_limit(text: &str) -> Option<libc::rlim_t> {
    let unsigned = text.strip_prefix('+').unwrap_or(text);
    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    libc::rlim_t::from_str_radix(digits, radix).ok()
}

/// Current `(soft, hard)` data-segment limits.
pub fn data_limit() -> io::Result<(libc::rlim_t, libc::rlim_t)> {
    let mut current = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `current` is a valid, writable rlimit.
    if unsafe { libc::getrlimit(libc::RLIMIT_DATA, &mut current) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((current.rlim_cur, current.rlim_max))
}

/// Lower or raise the soft data limit; the hard limit is left as it is, since
/// once reduced it can never grow back.
pub fn set_soft_data_limit(bytes: libc::rlim_t) -> io::Result<()> {
    let (_, hard) = data_limit()?;
    let wanted = libc::rlimit {
        rlim_cur: bytes,
        rlim_max: hard,
    };
    // SAFETY: `wanted` is a valid rlimit that outlives the call.
    if unsafe { libc::setrlimit(libc::RLIMIT_DATA, &wanted) } != 0 {
        return Err(io::Error::last_os_error());
    }
    debug!(soft = bytes, hard, "data limit changed");
    Ok(())
}
