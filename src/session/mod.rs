pub mod approval;
pub mod healing;

use std::fmt;
use tracing::{info, warn};

use crate::{
    console::{Console, Tone},
    error::{AppError, AppResult},
    external::{Execution, Invocation, Runner},
    llm::Generator,
    platform::Platform,
    prompt,
    store::ScriptSink,
};

pub use approval::ApprovalPolicy;
pub use healing::HealingPolicy;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { attempts: u32 },
    AbortedByOperator,
    /// Every attempt in the self-healing budget failed.
    Exhausted { attempts: u32 },
    /// A single-shot run failed; there was no budget to exhaust.
    Failed { exit_code: i32 },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded { attempts } => write!(f, "succeeded after {} attempt(s)", attempts),
            Outcome::AbortedByOperator => f.write_str("aborted by operator"),
            Outcome::Exhausted { attempts } => write!(f, "failed after {} attempt(s)", attempts),
            Outcome::Failed { exit_code } => write!(f, "failed with exit code {}", exit_code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("unexpected event '{event}' while {state}")]
    Unexpected {
        state: &'static str,
        event: &'static str,
    },
}

/// What the approval loop asks the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Script,
    CommandList,
}

impl Artifact {
    fn prompt(self, task: &str, platform: Platform) -> String {
        match self {
            Artifact::Script => prompt::script_prompt(task, platform),
            Artifact::CommandList => prompt::command_list_prompt(task, platform),
        }
    }

    fn title(self) -> &'static str {
        match self {
            Artifact::Script => "Generated Bash Script:",
            Artifact::CommandList => "Generated Shell Commands:",
        }
    }
}

const RUN_QUESTION: &str = "Do you want to run this script?";

/// One operator session: the collaborators plus the detected platform.
pub struct Session<'a> {
    pub(crate) generator: &'a dyn Generator,
    pub(crate) runner: &'a dyn Runner,
    pub(crate) store: &'a dyn ScriptSink,
    pub(crate) console: &'a mut dyn Console,
    pub(crate) platform: Platform,
}

impl<'a> Session<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        runner: &'a dyn Runner,
        store: &'a dyn ScriptSink,
        console: &'a mut dyn Console,
        platform: Platform,
    ) -> Self {
        Self {
            generator,
            runner,
            store,
            console,
            platform,
        }
    }

    /// Approve-or-revise, then run the approved script once.
    pub fn run_interactive(&mut self, task: &str, policy: ApprovalPolicy) -> AppResult<Outcome> {
        let outcome = match self.draft(task, policy, Artifact::Script)? {
            None => Outcome::AbortedByOperator,
            Some(script) => {
                let execution = self.execute_script(&script)?;
                if execution.success() {
                    Outcome::Succeeded { attempts: 1 }
                } else {
                    Outcome::Failed {
                        exit_code: execution.exit_code,
                    }
                }
            }
        };
        self.report(outcome);
        Ok(outcome)
    }

    /// Generate, approve, run; on failure feed the output back and try again,
    /// up to the policy's attempt budget.
    pub fn run_self_heal(&mut self, task: &str, policy: HealingPolicy) -> AppResult<Outcome> {
        let ctx = healing::Context::new(task, policy);
        let (mut state, mut effect) = healing::start(&ctx);

        loop {
            let event = match effect {
                healing::Effect::Generate {
                    attempt,
                    task: attempt_task,
                } => {
                    info!(attempt, max = ctx.max_attempts(), "generating script");
                    self.console.say(
                        Tone::Info,
                        &format!("\nAttempt {} to achieve goal: {}", attempt, ctx.task()),
                    );
                    let raw = self
                        .generator
                        .complete(&Artifact::Script.prompt(&attempt_task, self.platform))?;
                    healing::Event::Generated(raw)
                }
                healing::Effect::AskApproval { script, .. } => {
                    self.console.show_script(Artifact::Script.title(), &script);
                    if self.console.confirm(RUN_QUESTION)? {
                        healing::Event::Approved
                    } else {
                        healing::Event::Declined
                    }
                }
                healing::Effect::Execute { attempt, script } => {
                    let execution = self.execute_script(&script)?;
                    if !execution.success() {
                        warn!(attempt, exit_code = execution.exit_code, "attempt failed");
                        self.console.say(
                            Tone::Failure,
                            &format!(
                                "\nScript failed with exit code {}. Trying to self-heal...",
                                execution.exit_code
                            ),
                        );
                    }
                    healing::Event::Finished(execution)
                }
                healing::Effect::Finish(outcome) => {
                    self.report(outcome);
                    return Ok(outcome);
                }
            };
            (state, effect) = state.transition(event, &ctx)?;
        }
    }

    /// Runs the approval loop until the operator accepts a draft.
    /// `None` when the revision cap ended it or the operator backed out of
    /// the correction prompt.
    pub(crate) fn draft(
        &mut self,
        task: &str,
        policy: ApprovalPolicy,
        artifact: Artifact,
    ) -> AppResult<Option<String>> {
        let ctx = approval::Context::new(task, policy);
        let (mut state, mut effect) = approval::start(&ctx);

        loop {
            let event = match effect {
                approval::Effect::Generate { task } => {
                    self.console.say(Tone::Info, "Generating...");
                    let raw = self.generator.complete(&artifact.prompt(&task, self.platform))?;
                    approval::Event::Generated(raw)
                }
                approval::Effect::AskApproval { script } => {
                    self.console.show_script(artifact.title(), &script);
                    if self.console.confirm(RUN_QUESTION)? {
                        approval::Event::Approved
                    } else {
                        approval::Event::Declined
                    }
                }
                approval::Effect::AskCorrection => {
                    match self
                        .console
                        .ask("What needs to be modified in the script?")?
                    {
                        Some(correction) => approval::Event::Corrected(correction),
                        None => approval::Event::Cancelled,
                    }
                }
                approval::Effect::Approved { script } => return Ok(Some(script)),
                approval::Effect::Abandoned => return Ok(None),
            };
            (state, effect) = state.transition(event, &ctx)?;
        }
    }

    fn execute_script(&mut self, script: &str) -> AppResult<Execution> {
        let path = self.store.persist(script).map_err(AppError::Persist)?;
        self.console
            .say(Tone::Info, &format!("\nRunning: {}\n", path.display()));
        Ok(self.runner.run(&Invocation::Script(path))?)
    }

    fn report(&mut self, outcome: Outcome) {
        info!(%outcome, "run finished");
        match outcome {
            Outcome::Succeeded { .. } => self.console.say(Tone::Success, "\nGoal achieved!"),
            Outcome::AbortedByOperator => self.console.say(Tone::Warning, "Aborted by user."),
            Outcome::Exhausted { .. } => self.console.say(
                Tone::Failure,
                "\nMaximum attempts reached. Could not achieve the goal automatically.",
            ),
            Outcome::Failed { exit_code } => self
                .console
                .say(Tone::Failure, &format!("\nScript exited with code {}.", exit_code)),
        }
    }
}
