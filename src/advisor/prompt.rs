//! Interactive input for the exclusion builder

use super::AdvisorError;
use std::io::{self, BufRead, Write};

/// Source of answers to interactive questions
pub trait Prompt {
    /// Show `question` and return the trimmed answer
    fn ask(&mut self, question: &str) -> Result<String, AdvisorError>;
}

/// Reads answers from the terminal
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> Result<String, AdvisorError> {
        print!("{}", question);
        io::stdout().flush().map_err(AdvisorError::Input)?;

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(AdvisorError::Input)?;
        if read == 0 {
            return Err(AdvisorError::InputClosed);
        }

        Ok(line.trim().to_string())
    }
}

/// Replays a fixed list of answers, recording the questions asked
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: std::collections::VecDeque<String>,
    pub questions: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            questions: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn ask(&mut self, question: &str) -> Result<String, AdvisorError> {
        self.questions.push(question.to_string());
        self.answers.pop_front().ok_or(AdvisorError::InputClosed)
    }
}
