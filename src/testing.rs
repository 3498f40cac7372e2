//! Deterministic stand-ins for the model, the OS and the operator.

use rustyline::error::ReadlineError;
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    io,
    path::PathBuf,
};

use crate::{
    console::{is_yes, Console, Tone},
    external::{ExecError, Execution, Invocation, Runner},
    llm::{Generator, LlmError},
    store::ScriptSink,
};

/// Pops queued responses in order; the last one repeats forever.
fn next_repeating<T: Clone>(queue: &RefCell<VecDeque<T>>) -> Option<T> {
    let mut queue = queue.borrow_mut();
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

pub struct FakeGenerator {
    responses: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: RefCell::new(responses.iter().map(|r| r.to_string()).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(&[response])
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Generator for FakeGenerator {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        next_repeating(&self.responses).ok_or(LlmError::EmptyResponse)
    }
}

pub struct FakeRunner {
    results: RefCell<VecDeque<Execution>>,
    invocations: RefCell<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new(results: &[(i32, &str)]) -> Self {
        Self {
            results: RefCell::new(
                results
                    .iter()
                    .map(|(exit_code, output)| Execution {
                        exit_code: *exit_code,
                        output: output.to_string(),
                    })
                    .collect(),
            ),
            invocations: RefCell::new(Vec::new()),
        }
    }

    pub fn always(exit_code: i32, output: &str) -> Self {
        Self::new(&[(exit_code, output)])
    }

    pub fn calls(&self) -> usize {
        self.invocations.borrow().len()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }
}

impl Runner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> Result<Execution, ExecError> {
        self.invocations.borrow_mut().push(invocation.clone());
        next_repeating(&self.results).ok_or_else(|| ExecError::Spawn {
            command: invocation.describe(),
            source: io::Error::new(io::ErrorKind::NotFound, "no scripted result"),
        })
    }
}

/// Hands out fake paths and remembers what it was asked to save.
#[derive(Default)]
pub struct MemoryStore {
    scripts: RefCell<Vec<String>>,
    counter: Cell<usize>,
}

impl MemoryStore {
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.borrow().clone()
    }
}

impl ScriptSink for MemoryStore {
    fn persist(&self, script: &str) -> io::Result<PathBuf> {
        self.scripts.borrow_mut().push(script.to_string());
        let n = self.counter.get() + 1;
        self.counter.set(n);
        Ok(PathBuf::from(format!("./install_fake{n}.sh")))
    }
}

/// Scripted reply standing in for Ctrl-C.
pub const CTRL_C: &str = "^C";

/// Answers questions from a script of replies. [`CTRL_C`] backs out of the
/// prompt; running out of replies is an `Eof` error.
#[derive(Default)]
pub struct ScriptedConsole {
    answers: VecDeque<String>,
    pub shown: Vec<(String, String)>,
    pub messages: Vec<(Tone, String)>,
    pub questions: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    fn next_answer(&mut self, question: &str) -> Result<String, ReadlineError> {
        self.questions.push(question.to_string());
        self.answers.pop_front().ok_or(ReadlineError::Eof)
    }

    pub fn said(&self, needle: &str) -> bool {
        self.messages.iter().any(|(_, m)| m.contains(needle))
    }
}

impl Console for ScriptedConsole {
    fn show_script(&mut self, title: &str, script: &str) {
        self.shown.push((title.to_string(), script.to_string()));
    }

    fn say(&mut self, tone: Tone, message: &str) {
        self.messages.push((tone, message.to_string()));
    }

    fn confirm(&mut self, question: &str) -> Result<bool, ReadlineError> {
        self.next_answer(question).map(|a| is_yes(&a))
    }

    fn ask(&mut self, question: &str) -> Result<Option<String>, ReadlineError> {
        self.next_answer(question)
            .map(|answer| Some(answer).filter(|a| a != CTRL_C))
    }

    fn pause(&mut self, message: &str) -> Result<bool, ReadlineError> {
        self.next_answer(message).map(|answer| answer != CTRL_C)
    }
}
