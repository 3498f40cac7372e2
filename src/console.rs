use colored::Colorize;
use rustyline::{error::ReadlineError, DefaultEditor};
use std::path::PathBuf;
use tracing::debug;

use crate::utils::rule;

const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Failure,
}

/// Everything the session loops need from the operator.
///
/// Ctrl-C and Ctrl-D mean "no" at every prompt. They are not errors.
pub trait Console {
    /// Prints a block of generated text between two rules.
    fn show_script(&mut self, title: &str, script: &str);
    fn say(&mut self, tone: Tone, message: &str);
    /// Yes/no question. Only an explicit yes counts as yes.
    fn confirm(&mut self, question: &str) -> Result<bool, ReadlineError>;
    /// Free-text question. `None` when the operator backs out.
    fn ask(&mut self, question: &str) -> Result<Option<String>, ReadlineError>;
    /// Blocks until the operator presses Enter. `false` when they back out.
    fn pause(&mut self, message: &str) -> Result<bool, ReadlineError>;
}

pub struct TerminalConsole {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
}

impl TerminalConsole {
    pub fn new() -> Result<Self, ReadlineError> {
        let mut editor = DefaultEditor::new()?;
        let history_path = Self::get_history_file_path();
        if let Some(path) = &history_path {
            let _ = editor.load_history(path);
        }

        Ok(Self {
            editor,
            history_path,
        })
    }

    fn get_history_file_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".scriptwright_history"))
    }

    /// Reads the task description. `None` when the operator enters nothing
    /// or hits Ctrl-C/Ctrl-D.
    pub fn read_task(&mut self) -> Result<Option<String>, ReadlineError> {
        println!("{}", "What do you want to install or remove?".bold());
        let line = match self.readline("> ")? {
            Some(line) => line.trim().to_string(),
            None => return Ok(None),
        };
        if line.is_empty() {
            return Ok(None);
        }

        self.editor.add_history_entry(line.as_str())?;
        if let Some(path) = &self.history_path {
            if let Err(e) = self.editor.save_history(path) {
                debug!(error = %e, "could not save history");
            }
        }
        Ok(Some(line))
    }

    fn readline(&mut self, prompt: &str) -> Result<Option<String>, ReadlineError> {
        backed_out(self.editor.readline(prompt))
    }
}

/// Folds Ctrl-C/Ctrl-D into `None`.
fn backed_out(read: Result<String, ReadlineError>) -> Result<Option<String>, ReadlineError> {
    match read {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e),
    }
}

impl Console for TerminalConsole {
    fn show_script(&mut self, title: &str, script: &str) {
        let rule = rule(RULE_WIDTH);
        println!("\n{}", title.bold());
        println!("{}", rule.dimmed());
        println!("{}", script);
        println!("{}", rule.dimmed());
    }

    fn say(&mut self, tone: Tone, message: &str) {
        match tone {
            Tone::Info => println!("{}", message.bright_blue()),
            Tone::Success => println!("{}", message.green().bold()),
            Tone::Warning => println!("{}", message.yellow()),
            Tone::Failure => println!("{}", message.red().bold()),
        }
    }

    fn confirm(&mut self, question: &str) -> Result<bool, ReadlineError> {
        let answer = self.readline(&format!("{} (y/n): ", question))?;
        Ok(answer.is_some_and(|answer| is_yes(&answer)))
    }

    fn ask(&mut self, question: &str) -> Result<Option<String>, ReadlineError> {
        println!("{}", question);
        let answer = self.readline("> ")?;
        Ok(answer.map(|answer| answer.trim().to_string()))
    }

    fn pause(&mut self, message: &str) -> Result<bool, ReadlineError> {
        Ok(self.readline(message)?.is_some())
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" Y \n"));
        assert!(is_yes("yes"));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_ctrl_c_and_ctrl_d_back_out() {
        assert_eq!(backed_out(Err(ReadlineError::Interrupted)).unwrap(), None);
        assert_eq!(backed_out(Err(ReadlineError::Eof)).unwrap(), None);
        assert_eq!(
            backed_out(Ok("apt-get".to_string())).unwrap(),
            Some("apt-get".to_string())
        );
        assert!(backed_out(Err(ReadlineError::WindowResized)).is_err());
    }

    #[test]
    fn test_history_file_location() {
        if let Some(path) = TerminalConsole::get_history_file_path() {
            assert!(path.ends_with(".scriptwright_history"));
        }
    }
}
