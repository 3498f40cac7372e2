//! Bounded generate/run/diagnose/regenerate loop.
//!
//! Pure: the driver in `session` performs each [`Effect`] and feeds the
//! result back as an [`Event`].

use super::{Outcome, TransitionError};
use crate::{
    external::Execution, prompt::correction_task, sanitize::strip_fences, utils::tail_chars,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealingPolicy {
    pub max_attempts: u32,
    pub failure_context_chars: usize,
}

impl Default for HealingPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            failure_context_chars: 2000,
        }
    }
}

pub struct Context {
    task: String,
    policy: HealingPolicy,
}

impl Context {
    pub fn new(task: &str, policy: HealingPolicy) -> Self {
        Self {
            task: task.to_string(),
            policy,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }
}

/// A failed attempt, kept only long enough to write the next prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub index: u32,
    pub script: String,
    /// Tail of the combined output, at most `failure_context_chars` long.
    pub output_tail: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Drafting {
        attempt: u32,
        previous: Option<Attempt>,
    },
    AwaitingApproval {
        attempt: u32,
        script: String,
    },
    Running {
        attempt: u32,
        script: String,
    },
    Succeeded {
        attempts: u32,
    },
    AbortedByOperator {
        attempt: u32,
    },
    Exhausted {
        attempts: u32,
        last: Attempt,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Generated(String),
    Approved,
    Declined,
    Finished(Execution),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Generate { attempt: u32, task: String },
    AskApproval { attempt: u32, script: String },
    Execute { attempt: u32, script: String },
    Finish(Outcome),
}

pub fn start(ctx: &Context) -> (State, Effect) {
    (
        State::Drafting {
            attempt: 1,
            previous: None,
        },
        Effect::Generate {
            attempt: 1,
            task: ctx.task.clone(),
        },
    )
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Drafting { .. } => "drafting",
            State::AwaitingApproval { .. } => "awaiting approval",
            State::Running { .. } => "running",
            State::Succeeded { .. } => "succeeded",
            State::AbortedByOperator { .. } => "aborted",
            State::Exhausted { .. } => "exhausted",
        }
    }

    pub fn transition(self, event: Event, ctx: &Context) -> Result<(State, Effect), TransitionError> {
        match (self, event) {
            (State::Drafting { attempt, .. }, Event::Generated(raw)) => {
                let script = strip_fences(&raw);
                Ok((
                    State::AwaitingApproval {
                        attempt,
                        script: script.clone(),
                    },
                    Effect::AskApproval { attempt, script },
                ))
            }
            (State::AwaitingApproval { attempt, script }, Event::Approved) => Ok((
                State::Running {
                    attempt,
                    script: script.clone(),
                },
                Effect::Execute { attempt, script },
            )),
            (State::AwaitingApproval { attempt, .. }, Event::Declined) => Ok((
                State::AbortedByOperator { attempt },
                Effect::Finish(Outcome::AbortedByOperator),
            )),
            (State::Running { attempt, .. }, Event::Finished(execution)) if execution.success() => {
                Ok((
                    State::Succeeded { attempts: attempt },
                    Effect::Finish(Outcome::Succeeded { attempts: attempt }),
                ))
            }
            (State::Running { attempt, script }, Event::Finished(execution)) => {
                let failed = Attempt {
                    index: attempt,
                    script,
                    output_tail: tail_chars(&execution.output, ctx.policy.failure_context_chars)
                        .to_string(),
                    exit_code: execution.exit_code,
                };

                if attempt >= ctx.policy.max_attempts {
                    return Ok((
                        State::Exhausted {
                            attempts: attempt,
                            last: failed,
                        },
                        Effect::Finish(Outcome::Exhausted { attempts: attempt }),
                    ));
                }

                let next = attempt + 1;
                Ok((
                    State::Drafting {
                        attempt: next,
                        previous: Some(failed.clone()),
                    },
                    Effect::Generate {
                        attempt: next,
                        task: retry_task(&ctx.task, &failed),
                    },
                ))
            }
            (state, event) => Err(TransitionError::Unexpected {
                state: state.name(),
                event: event.name(),
            }),
        }
    }
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Generated(_) => "generated",
            Event::Approved => "approved",
            Event::Declined => "declined",
            Event::Finished(_) => "finished",
        }
    }
}

/// A failure that printed nothing gives the model nothing to work with, so
/// the task goes out unchanged.
fn retry_task(task: &str, failed: &Attempt) -> String {
    if failed.output_tail.is_empty() {
        task.to_string()
    } else {
        correction_task(task, &failed.output_tail, &failed.script)
    }
}
