//! Interactive decisions about broken links and unresolvable citations.
//!
//! Every menu also accepts `a` (apply the last choice to every remaining
//! case of this menu without asking) and `q` (quit the run).

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{BufRead, Write};

use crate::error::{Error, Result};

/// One entry of a choice menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub key: &'static str,
    pub description: &'static str,
}

/// A named menu. The name keys the remembered choice.
#[derive(Debug, Clone, Copy)]
pub struct Menu {
    pub name: &'static str,
    pub question: &'static str,
    pub choices: &'static [Choice],
}

const APPLY_ALL: Choice = Choice {
    key: "a",
    description: "apply default to all",
};
const QUIT: Choice = Choice {
    key: "q",
    description: "quit",
};

/// Where answers come from.
pub trait Prompt {
    /// Ask `question`; returns the raw answer, `default` on empty input.
    fn choose(&mut self, question: &str, choices: &[Choice], default: &str) -> Result<String>;

    /// Ask for a line of free text.
    fn input(&mut self, label: &str) -> Result<String>;

    /// Tell the user something that needs no answer.
    fn notify(&mut self, message: &str);
}

/// Prompts on stderr, answers from stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(Error::Aborted);
        }
        Ok(line.trim().to_string())
    }
}

impl Prompt for TerminalPrompt {
    fn choose(&mut self, question: &str, choices: &[Choice], default: &str) -> Result<String> {
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{question}")?;
        for choice in choices {
            writeln!(stderr, "{}: {}", choice.key, choice.description)?;
        }
        write!(stderr, "Please enter (defaults to '{default}'): ")?;
        stderr.flush()?;
        drop(stderr);

        let answer = self.read_line()?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    fn input(&mut self, label: &str) -> Result<String> {
        let mut stderr = std::io::stderr().lock();
        write!(stderr, "{label}: ")?;
        stderr.flush()?;
        drop(stderr);
        self.read_line()
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Answers from a fixed script; the default once the script runs out.
///
/// Used for non-interactive runs and in tests.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }

    /// Never asks; every menu takes its default and every input is empty.
    pub fn defaults() -> Self {
        Self::default()
    }
}

impl Prompt for ScriptedPrompt {
    fn choose(&mut self, _question: &str, _choices: &[Choice], default: &str) -> Result<String> {
        Ok(self
            .answers
            .pop_front()
            .unwrap_or_else(|| default.to_string()))
    }

    fn input(&mut self, _label: &str) -> Result<String> {
        Ok(self.answers.pop_front().unwrap_or_default())
    }

    fn notify(&mut self, message: &str) {
        log::info!("{message}");
    }
}

/// Choices remembered for the rest of one run.
#[derive(Debug, Default)]
pub struct ChoiceMemory {
    last: HashMap<&'static str, &'static str>,
    apply_all: HashSet<&'static str>,
}

impl ChoiceMemory {
    /// The key to use when the user just presses enter.
    fn default_for(&self, menu: &Menu) -> &'static str {
        self.last
            .get(menu.name)
            .copied()
            .or_else(|| menu.choices.first().map(|c| c.key))
            .unwrap_or(QUIT.key)
    }
}

/// A prompt plus the run's remembered choices.
pub struct Interaction {
    prompt: Box<dyn Prompt>,
    memory: ChoiceMemory,
}

impl std::fmt::Debug for Interaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interaction")
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

impl Interaction {
    pub fn new(prompt: Box<dyn Prompt>) -> Self {
        Self {
            prompt,
            memory: ChoiceMemory::default(),
        }
    }

    /// Never asks anything.
    pub fn non_interactive() -> Self {
        Self::new(Box::new(ScriptedPrompt::defaults()))
    }

    /// Ask `menu`, returning the chosen entry.
    ///
    /// `q` ends the run with [`Error::Aborted`]. `a` picks the default and
    /// stops asking this menu for the rest of the run.
    pub fn choose(&mut self, menu: &Menu) -> Result<Choice> {
        let default = self.memory.default_for(menu);

        if self.memory.apply_all.contains(menu.name)
            && let Some(choice) = find_choice(menu, default)
        {
            self.prompt
                .notify(&format!("{} {}", menu.question, choice.description));
            return Ok(choice);
        }

        let mut offered: Vec<Choice> = menu.choices.to_vec();
        offered.extend([APPLY_ALL, QUIT]);

        loop {
            let answer = self.prompt.choose(menu.question, &offered, default)?;
            match answer.as_str() {
                "q" => return Err(Error::Aborted),
                "a" => {
                    self.memory.apply_all.insert(menu.name);
                    if let Some(choice) = find_choice(menu, default) {
                        return Ok(choice);
                    }
                }
                key => {
                    if let Some(choice) = find_choice(menu, key) {
                        self.memory.last.insert(menu.name, choice.key);
                        return Ok(choice);
                    }
                    self.prompt
                        .notify(&format!("Error: '{key}' is not a valid choice."));
                }
            }
        }
    }

    pub fn input(&mut self, label: &str) -> Result<String> {
        self.prompt.input(label)
    }

    pub fn notify(&mut self, message: &str) {
        self.prompt.notify(message);
    }
}

fn find_choice(menu: &Menu, key: &str) -> Option<Choice> {
    menu.choices.iter().find(|c| c.key == key).copied()
}
