use crate::config::ShellConfig;
use crate::env::Environment;
use crate::executor::Executor;
use crate::history::HistoryRing;
use crate::io_adapters::{LineSource, ReadEvent};
use crate::signals::InterruptFlag;
use anyhow::{Context, Result};
use tracing::debug;

/// Prompt shown before each command when reading from a terminal.
pub const PROMPT: &str = "> ";

/// Question asked after an interrupt.
pub const QUIT_QUESTION: &str = "\nAre you sure you want to quit (y/n)? ";

/// Where the interrupt protocol currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptState {
    Normal,
    /// The quit question is outstanding; the next line is an answer, not a command.
    AwaitingConfirmation,
}

/// Why [`Shell::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    EndOfInput,
    QuitConfirmed,
}

/// The read-eval loop and all of its state.
pub struct Shell {
    executor: Executor,
    interrupt: InterruptFlag,
    state: InterruptState,
    interactive: bool,
    at_eof: bool,
}

impl Shell {
    pub fn new(config: &ShellConfig, interrupt: InterruptFlag) -> Self {
        Self {
            executor: Executor::new(Environment::new(), config.fifo_path.clone()),
            interrupt,
            state: InterruptState::Normal,
            interactive: config.interactive,
            at_eof: false,
        }
    }

    pub fn history(&self) -> &HistoryRing {
        self.executor.history()
    }

    pub fn interrupt(&self) -> InterruptFlag {
        self.interrupt
    }

    /// Read and execute lines until the input ends or a quit is confirmed.
    pub fn run(&mut self, source: &mut dyn LineSource) -> Result<ExitReason> {
        while !self.at_eof {
            if let Some(reason) = self.step(source)? {
                return Ok(reason);
            }
        }
        Ok(ExitReason::EndOfInput)
    }

    /// One iteration: maybe ask the quit question, then read and handle one line.
    pub fn step(&mut self, source: &mut dyn LineSource) -> Result<Option<ExitReason>> {
        self.check_interrupt()?;

        let prompt = match self.state {
            InterruptState::AwaitingConfirmation => QUIT_QUESTION,
            InterruptState::Normal if self.interactive => PROMPT,
            InterruptState::Normal => "",
        };

        match source.read_line(prompt)? {
            ReadEvent::Eof => {
                self.at_eof = true;
                Ok(None)
            }
            ReadEvent::Interrupted => {
                if self.state == InterruptState::Normal {
                    self.interrupt.raise();
                }
                Ok(None)
            }
            ReadEvent::Line(line) => {
                // An interrupt that landed while the line was being typed turns it
                // into the answer.
                self.check_interrupt()?;
                match self.state {
                    InterruptState::AwaitingConfirmation => self.answer(&line),
                    InterruptState::Normal => {
                        self.submit(&line, source);
                        Ok(None)
                    }
                }
            }
        }
    }

    fn check_interrupt(&mut self) -> Result<()> {
        if self.state == InterruptState::Normal && self.interrupt.is_pending() {
            self.interrupt
                .suspend()
                .context("failed to ignore SIGINT")?;
            self.state = InterruptState::AwaitingConfirmation;
        }
        Ok(())
    }

    fn answer(&mut self, line: &str) -> Result<Option<ExitReason>> {
        if line == "y" || line == "Y" {
            debug!("quit confirmed");
            return Ok(Some(ExitReason::QuitConfirmed));
        }
        self.interrupt
            .rearm()
            .context("failed to reinstall SIGINT handler")?;
        self.interrupt.clear();
        self.state = InterruptState::Normal;
        Ok(None)
    }

    fn submit(&mut self, line: &str, source: &mut dyn LineSource) {
        if line.is_empty() {
            return;
        }
        source.remember(line);
        match self.executor.execute(line) {
            Ok(outcome) => debug!(?outcome, "command finished"),
            Err(err) => eprintln!("{}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed list of read results and records the prompts it was given.
    struct Scripted {
        events: VecDeque<ReadEvent>,
        prompts: Vec<String>,
        remembered: Vec<String>,
    }

    impl Scripted {
        fn new(events: Vec<ReadEvent>) -> Self {
            Self {
                events: events.into(),
                prompts: Vec::new(),
                remembered: Vec::new(),
            }
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self, prompt: &str) -> Result<ReadEvent> {
            self.prompts.push(prompt.to_string());
            Ok(self.events.pop_front().unwrap_or(ReadEvent::Eof))
        }

        fn remember(&mut self, line: &str) {
            self.remembered.push(line.to_string());
        }
    }

    fn line(s: &str) -> ReadEvent {
        ReadEvent::Line(s.to_string())
    }

    fn shell(interactive: bool) -> Shell {
        let config = ShellConfig {
            fifo_path: None,
            interactive,
        };
        Shell::new(&config, InterruptFlag::detached())
    }

    #[test]
    fn test_runs_until_end_of_input() {
        let mut sh = shell(false);
        let mut src = Scripted::new(vec![line("true"), line(""), line("true")]);
        assert_eq!(sh.run(&mut src).unwrap(), ExitReason::EndOfInput);
        assert_eq!(sh.history().iter().collect::<Vec<_>>(), vec!["true", "true"]);
        assert_eq!(src.remembered, vec!["true", "true"]);
    }

    #[test]
    fn test_prompt_only_when_interactive() {
        let mut quiet = shell(false);
        let mut src = Scripted::new(vec![line("true")]);
        quiet.run(&mut src).unwrap();
        assert!(src.prompts.iter().all(|p| p.is_empty()));

        let mut tty = shell(true);
        let mut src = Scripted::new(vec![line("true")]);
        tty.run(&mut src).unwrap();
        assert!(src.prompts.iter().all(|p| p == PROMPT));
    }

    #[test]
    fn test_interrupt_then_yes_quits() {
        let mut sh = shell(false);
        let mut src = Scripted::new(vec![
            ReadEvent::Interrupted,
            line("y"),
            line("true"),
        ]);
        assert_eq!(sh.run(&mut src).unwrap(), ExitReason::QuitConfirmed);
        assert!(sh.history().is_empty());
        assert_eq!(src.prompts[1], QUIT_QUESTION);
    }

    #[test]
    fn test_capital_yes_quits() {
        let mut sh = shell(false);
        sh.interrupt().raise();
        let mut src = Scripted::new(vec![line("Y")]);
        assert_eq!(sh.run(&mut src).unwrap(), ExitReason::QuitConfirmed);
    }

    #[test]
    fn test_no_answer_is_discarded_and_next_command_runs() {
        let mut sh = shell(false);
        let mut src = Scripted::new(vec![
            ReadEvent::Interrupted,
            line("n"),
            line("true"),
        ]);
        assert_eq!(sh.run(&mut src).unwrap(), ExitReason::EndOfInput);
        assert_eq!(sh.history().iter().collect::<Vec<_>>(), vec!["true"]);
        assert_eq!(sh.state, InterruptState::Normal);
        assert!(!sh.interrupt().is_pending());
    }

    #[test]
    fn test_any_other_answer_counts_as_no() {
        for answer in ["", "yes", "no", "ls -l"] {
            let mut sh = shell(false);
            sh.interrupt().raise();
            let mut src = Scripted::new(vec![line(answer), line("true")]);
            assert_eq!(sh.run(&mut src).unwrap(), ExitReason::EndOfInput);
            assert_eq!(sh.history().iter().collect::<Vec<_>>(), vec!["true"]);
        }
    }

    #[test]
    fn test_second_interrupt_after_no_asks_again() {
        let mut sh = shell(false);
        let mut src = Scripted::new(vec![
            ReadEvent::Interrupted,
            line("n"),
            ReadEvent::Interrupted,
            line("y"),
        ]);
        assert_eq!(sh.run(&mut src).unwrap(), ExitReason::QuitConfirmed);
        let questions = src.prompts.iter().filter(|p| *p == QUIT_QUESTION).count();
        assert_eq!(questions, 2);
    }

    #[test]
    fn test_interrupt_while_awaiting_is_ignored() {
        let mut sh = shell(false);
        sh.interrupt().raise();
        let mut src = Scripted::new(vec![ReadEvent::Interrupted, line("y")]);
        assert_eq!(sh.run(&mut src).unwrap(), ExitReason::QuitConfirmed);
    }

    /// Raises the interrupt in the middle of the first read, like a Ctrl-C typed
    /// after the line is already on its way.
    struct InterruptedMidRead {
        flag: InterruptFlag,
        inner: Scripted,
    }

    impl LineSource for InterruptedMidRead {
        fn read_line(&mut self, prompt: &str) -> Result<ReadEvent> {
            if self.inner.prompts.is_empty() {
                self.flag.raise();
            }
            self.inner.read_line(prompt)
        }
    }

    #[test]
    fn test_line_read_during_interrupt_is_the_answer() {
        let mut sh = shell(false);
        let mut src = InterruptedMidRead {
            flag: sh.interrupt(),
            inner: Scripted::new(vec![line("n"), line("true")]),
        };
        assert_eq!(sh.run(&mut src).unwrap(), ExitReason::EndOfInput);
        assert_eq!(sh.history().iter().collect::<Vec<_>>(), vec!["true"]);
        assert!(!sh.interrupt().is_pending());

        let mut sh = shell(false);
        let mut src = InterruptedMidRead {
            flag: sh.interrupt(),
            inner: Scripted::new(vec![line("y"), line("true")]),
        };
        assert_eq!(sh.run(&mut src).unwrap(), ExitReason::QuitConfirmed);
        assert!(sh.history().is_empty());
    }

    #[test]
    fn test_command_errors_do_not_stop_the_loop() {
        let mut sh = shell(false);
        let mut src = Scripted::new(vec![
            line("ls | wc"),
            line("limit abc"),
            line("no-such-program-rayshell"),
            line("true"),
        ]);
        assert_eq!(sh.run(&mut src).unwrap(), ExitReason::EndOfInput);
        assert_eq!(sh.history().len(), 4);
    }
}
