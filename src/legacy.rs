//! Command-list mode: run generated lines one at a time, with one
//! fix-and-retry per failing line.

use tracing::{info, warn};

use crate::{
    console::Tone,
    error::AppResult,
    external::{Execution, Invocation},
    prompt::error_fixer_prompt,
    sanitize::strip_fences,
    session::{ApprovalPolicy, Artifact, Outcome, Session},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub command: String,
    /// Exit code of the last run of `command` (the retry, if there was one).
    pub exit_code: i32,
    /// The fix that was applied before the retry.
    pub fix: Option<String>,
}

impl CommandReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Splits generated text into runnable lines, dropping blanks.
pub fn command_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl Session<'_> {
    pub fn run_commands(&mut self, task: &str, policy: ApprovalPolicy) -> AppResult<Outcome> {
        let Some(text) = self.draft(task, policy, Artifact::CommandList)? else {
            self.console.say(Tone::Warning, "Aborted by user.");
            return Ok(Outcome::AbortedByOperator);
        };

        let reports = self.execute_commands(&command_lines(&text))?;
        let failed: Vec<&CommandReport> = reports.iter().filter(|r| !r.succeeded()).collect();

        let outcome = match failed.last() {
            None => Outcome::Succeeded { attempts: 1 },
            Some(last) => Outcome::Failed {
                exit_code: last.exit_code,
            },
        };
        if failed.is_empty() {
            self.console.say(Tone::Success, "\nAll commands succeeded.");
        } else {
            self.console.say(
                Tone::Failure,
                &format!("\n{} of {} command(s) failed:", failed.len(), reports.len()),
            );
            for report in failed {
                self.console.say(Tone::Failure, &format!("  {}", report.command));
            }
        }
        Ok(outcome)
    }

    /// Runs each command in order. A failing command gets one model-suggested
    /// fix (applied after the operator presses Enter) and is then re-run
    /// exactly once, whatever the fix did. Backing out of the keypress skips
    /// both the fix and the retry.
    pub fn execute_commands(&mut self, commands: &[String]) -> AppResult<Vec<CommandReport>> {
        let mut reports = Vec::with_capacity(commands.len());

        for command in commands {
            let first = self.run_line(command)?;
            if first.success() {
                reports.push(CommandReport {
                    command: command.clone(),
                    exit_code: 0,
                    fix: None,
                });
                continue;
            }

            self.console.say(Tone::Info, "Diagnosing error...");
            let fix = strip_fences(&self.generator.complete(&error_fixer_prompt(&first.output))?);
            self.console.show_script("Suggested Fix:", &fix);
            if !self.console.pause("Press Enter to apply fix...")? {
                warn!(%command, "fix skipped by operator");
                self.console.say(Tone::Warning, "Fix skipped.");
                reports.push(CommandReport {
                    command: command.clone(),
                    exit_code: first.exit_code,
                    fix: None,
                });
                continue;
            }

            let fix_result = self.run_line(&fix)?;
            if !fix_result.success() {
                // The retry below happens regardless.
                warn!(%command, %fix, exit_code = fix_result.exit_code, "fix failed");
            }

            self.console.say(Tone::Info, "Retrying original command...");
            let retry = self.run_line(command)?;
            info!(%command, exit_code = retry.exit_code, "retry finished");
            reports.push(CommandReport {
                command: command.clone(),
                exit_code: retry.exit_code,
                fix: Some(fix),
            });
        }

        Ok(reports)
    }

    fn run_line(&mut self, line: &str) -> AppResult<Execution> {
        self.console.say(Tone::Info, &format!("\nRunning: {}", line));
        let execution = self.runner.run(&Invocation::Command(line.to_string()))?;
        if execution.success() {
            self.console.say(Tone::Success, "Success");
        } else {
            self.console.say(Tone::Failure, "Error");
        }
        Ok(execution)
    }
}
