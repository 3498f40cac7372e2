//! Draft/approve/revise loop. The operator decides when it ends.

use super::TransitionError;
use crate::{prompt::revision_task, sanitize::strip_fences};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalPolicy {
    /// Give up after this many revision requests. `None` loops for as long
    /// as the operator keeps asking.
    pub max_revisions: Option<u32>,
}

pub struct Context {
    task: String,
    policy: ApprovalPolicy,
}

impl Context {
    pub fn new(task: &str, policy: ApprovalPolicy) -> Self {
        Self {
            task: task.to_string(),
            policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Drafting { revisions: u32 },
    AwaitingApproval { script: String, revisions: u32 },
    AwaitingCorrection { revisions: u32 },
    Approved { script: String },
    Abandoned { revisions: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Raw model output, fences and all.
    Generated(String),
    Approved,
    Declined,
    Corrected(String),
    /// The operator backed out of the correction prompt.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Generate { task: String },
    AskApproval { script: String },
    AskCorrection,
    Approved { script: String },
    Abandoned,
}

pub fn start(ctx: &Context) -> (State, Effect) {
    (
        State::Drafting { revisions: 0 },
        Effect::Generate {
            task: ctx.task.clone(),
        },
    )
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Drafting { .. } => "drafting",
            State::AwaitingApproval { .. } => "awaiting approval",
            State::AwaitingCorrection { .. } => "awaiting correction",
            State::Approved { .. } => "approved",
            State::Abandoned { .. } => "abandoned",
        }
    }

    pub fn transition(self, event: Event, ctx: &Context) -> Result<(State, Effect), TransitionError> {
        match (self, event) {
            (State::Drafting { revisions }, Event::Generated(raw)) => {
                let script = strip_fences(&raw);
                Ok((
                    State::AwaitingApproval {
                        script: script.clone(),
                        revisions,
                    },
                    Effect::AskApproval { script },
                ))
            }
            (State::AwaitingApproval { script, .. }, Event::Approved) => Ok((
                State::Approved {
                    script: script.clone(),
                },
                Effect::Approved { script },
            )),
            (State::AwaitingApproval { revisions, .. }, Event::Declined) => {
                match ctx.policy.max_revisions {
                    Some(max) if revisions >= max => {
                        Ok((State::Abandoned { revisions }, Effect::Abandoned))
                    }
                    _ => Ok((State::AwaitingCorrection { revisions }, Effect::AskCorrection)),
                }
            }
            (State::AwaitingCorrection { revisions }, Event::Corrected(correction)) => Ok((
                State::Drafting {
                    revisions: revisions + 1,
                },
                Effect::Generate {
                    task: revision_task(&ctx.task, &correction),
                },
            )),
            (State::AwaitingCorrection { revisions }, Event::Cancelled) => {
                Ok((State::Abandoned { revisions }, Effect::Abandoned))
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
            Event::Corrected(_) => "corrected",
            Event::Cancelled => "cancelled",
        }
    }
}
