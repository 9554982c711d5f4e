//! Splitting of raw command lines into argument vectors.
//!
//! The grammar is deliberately tiny: words are separated by single spaces, and a
//! lone `|` word splits the line into a producer and a consumer stage. There is no
//! quoting, escaping or expansion.

use crate::errors::{ShellError, ShellResult};

/// The word that separates the two stages of a pipeline.
pub const PIPE_SEPARATOR: &str = "|";

/// Upper bound on the number of words in one stage.
pub const MAX_ARGS: usize = 256;

/// A tokenized command line: one stage, or two stages joined through the FIFO.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    pub first: Vec<String>,
    pub second: Option<Vec<String>>,
}

/// Split `line` into whitespace-free words.
///
/// Only the space character separates words; consecutive spaces never yield empty words.
pub fn split_into_tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(' ').filter(|word| !word.is_empty())
}

/// Tokenize `line` into one or two argument vectors.
///
/// `fifo_configured` tells whether a FIFO was supplied at startup; without one any
/// pipe separator makes the whole line fail before anything is spawned.
pub fn split_into_stages(line: &str, fifo_configured: bool) -> ShellResult<CommandLine> {
    let mut first = Vec::new();
    let mut second: Option<Vec<String>> = None;

    for word in split_into_tokens(line) {
        if word == PIPE_SEPARATOR {
            if !fifo_configured {
                return Err(ShellError::FifoRequired);
            }
            if second.is_some() {
                return Err(ShellError::TooManyStages);
            }
            second = Some(Vec::new());
            continue;
        }

        let stage = match second.as_mut() {
            Some(stage) => stage,
            None => &mut first,
        };
        if stage.len() == MAX_ARGS {
            return Err(ShellError::TooManyArguments { limit: MAX_ARGS });
        }
        stage.push(word.to_owned());
    }

    if let Some(stage) = &second {
        if first.is_empty() || stage.is_empty() {
            return Err(ShellError::EmptyStage);
        }
    }

    Ok(CommandLine { first, second })
}
