use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Read, Write};

/// Result of one attempt to read a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A complete line, without its newline.
    Line(String),
    /// The read was cut short by an interrupt; any partial line was dropped.
    Interrupted,
    /// No more input.
    Eof,
}

/// Where the read loop gets its lines from.
pub trait LineSource {
    /// Show `prompt` (if non-empty) and read the next line.
    fn read_line(&mut self, prompt: &str) -> Result<ReadEvent>;

    /// Called for every line that is submitted as a command.
    fn remember(&mut self, _line: &str) {}
}

/// Unbuffered standard input.
///
/// Reading byte by byte straight from the descriptor leaves the file offset right
/// after the current line, so programs started by the shell see the rest of a
/// redirected script.
pub struct RawStdin;

impl Read for RawStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

/// Line source over any byte stream, used for redirected input and tests.
pub struct StreamSource<R, W> {
    input: R,
    prompt_out: W,
    pending: Vec<u8>,
    at_eof: bool,
}

impl<R: Read, W: Write> StreamSource<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self {
            input,
            prompt_out,
            pending: Vec::with_capacity(128),
            at_eof: false,
        }
    }

    /// Return the writer that received the prompts.
    pub fn into_prompt_output(self) -> W {
        self.prompt_out
    }

    fn take_line(&mut self) -> ReadEvent {
        let bytes = std::mem::take(&mut self.pending);
        ReadEvent::Line(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl StreamSource<RawStdin, io::Stdout> {
    pub fn stdin() -> Self {
        Self::new(RawStdin, io::stdout())
    }
}

impl<R: Read, W: Write> LineSource for StreamSource<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadEvent> {
        if self.at_eof {
            return Ok(ReadEvent::Eof);
        }
        if !prompt.is_empty() {
            self.prompt_out.write_all(prompt.as_bytes())?;
            self.prompt_out.flush()?;
        }

        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => {
                    self.at_eof = true;
                    // A last line without a newline still counts.
                    if self.pending.is_empty() {
                        return Ok(ReadEvent::Eof);
                    }
                    return Ok(self.take_line());
                }
                Ok(_) if byte[0] == b'\n' => return Ok(self.take_line()),
                Ok(_) => self.pending.push(byte[0]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    self.pending.clear();
                    return Ok(ReadEvent::Interrupted);
                }
                Err(err) => return Err(err).context("failed to read input"),
            }
        }
    }
}

/// Line editor for interactive terminals.
pub struct TerminalSource {
    editor: DefaultEditor,
}

impl TerminalSource {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().context("failed to set up line editor")?;
        Ok(Self { editor })
    }
}

impl LineSource for TerminalSource {
    fn read_line(&mut self, prompt: &str) -> Result<ReadEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadEvent::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadEvent::Interrupted),
            Err(ReadlineError::Io(err)) if err.kind() == io::ErrorKind::Interrupted => {
                Ok(ReadEvent::Interrupted)
            }
            Err(ReadlineError::Eof) => Ok(ReadEvent::Eof),
            Err(err) => Err(err).context("failed to read line"),
        }
    }

    fn remember(&mut self, line: &str) {
        // Recall is a convenience; a failure here must not stop the shell.
        let _ = self.editor.add_history_entry(line);
    }
}
