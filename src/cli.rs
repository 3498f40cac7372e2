use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::{Config, Mode};

#[derive(Debug, Parser)]
#[command(author, version, about = "Turn an install request into a shell script, run it, and fix it when it fails", long_about = None)]
pub struct Cli {
    /// What to install or remove. Asked for interactively when omitted.
    pub task: Vec<String>,

    /// Execution strategy
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Attempt budget for self-heal mode
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Model name sent to the completion endpoint
    #[arg(long)]
    pub model: Option<String>,

    /// Config file (defaults to <config dir>/scriptwright/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn task(&self) -> Option<String> {
        let task = self.task.join(" ");
        let task = task.trim();
        (!task.is_empty()).then(|| task.to_string())
    }

    /// Command-line flags win over the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.healing.max_attempts = max_attempts;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
    }
}
