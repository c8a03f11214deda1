//! Interactive confirmation for destructive actions.

use std::io::{BufRead, Write};

/// Asks a yes/no question. Anything other than an explicit yes is a no.
pub trait Confirm {
    fn confirm(&self, question: &str) -> bool;
}

/// Prompts on stderr and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> bool {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{question} [y/N]: ");
        let _ = stderr.flush();

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

/// Fixed answer; used for `--no-prompt` paths and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, question: &str) -> bool {
        tracing::debug!(question, answer = self.0, "auto-confirm");
        self.0
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
