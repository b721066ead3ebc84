//! Operator input for interactive commands

use anyhow::{Context, Result};
use dialoguer::Input;

/// Source of free-text answers to questions
pub trait Prompter {
    fn ask(&mut self, question: &str) -> Result<String>;
}

/// Reads answers from the terminal
#[derive(Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(question)
            .allow_empty(true)
            .interact_text()
            .context("Failed to read answer from terminal")
    }
}

/// Canned answers, consumed in order
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
    /// Questions asked so far
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.asked.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("No answer scripted for: {}", question))
    }
}
