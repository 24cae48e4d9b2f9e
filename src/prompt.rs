//! Operator confirmation prompts.
use std::io::{self, BufRead, Write};

use crate::error::NsmError;

/// Question asked before destructive uninstalls.
pub const UNINSTALL_QUESTION: &str = "Are you sure you wish to continue? ([no]|yes): ";

/// Question asked when an optional dependency looks unreachable.
pub const CONTINUE_QUESTION: &str = "Continue? [y|N]: ";

/// Source of operator answers.
pub trait Prompter {
    /// Shows `question` and returns the raw answer. End of input reads as an empty answer.
    fn ask(&mut self, question: &str) -> Result<String, NsmError>;
}

/// [`Prompter`] reading from a terminal or any buffered input.
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompter<io::StdinLock<'static>, io::Stderr> {
    /// Prompts on stderr and reads answers from stdin.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn ask(&mut self, question: &str) -> Result<String, NsmError> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(answer.trim().to_string())
    }
}

/// Asks [`UNINSTALL_QUESTION`] until the answer is `yes`, `no` or empty.
///
/// Returns `true` only for `yes`.
pub fn confirm_uninstall(prompter: &mut dyn Prompter) -> Result<bool, NsmError> {
    loop {
        let answer = prompter.ask(UNINSTALL_QUESTION)?.to_ascii_lowercase();
        match answer.as_str() {
            "yes" => return Ok(true),
            "no" | "" => return Ok(false),
            _ => continue,
        }
    }
}

/// Asks [`CONTINUE_QUESTION`] once; anything but `y` declines.
pub fn confirm_continue(prompter: &mut dyn Prompter) -> Result<bool, NsmError> {
    Ok(prompter.ask(CONTINUE_QUESTION)?.eq_ignore_ascii_case("y"))
}
