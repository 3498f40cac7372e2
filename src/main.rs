use clap::Parser;
use colored::Colorize;
use std::{env, error::Error, process};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod console;
mod error;
mod external;
mod legacy;
mod llm;
mod platform;
mod prompt;
mod sanitize;
mod session;
mod store;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use config::{Config, Mode};
use console::{Console, TerminalConsole, Tone};
use error::AppResult;
use external::ShellRunner;
use llm::OpenAiClient;
use session::Session;
use store::ScriptStore;

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "error:".red().bold(), e);
        process::exit(1);
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> AppResult<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    info!(mode = %config.mode, model = %config.llm.model, "starting");

    let mut console = TerminalConsole::new()?;

    let detection = config.platform.detector().detect();
    let banner = match &detection.pretty_name {
        Some(name) => format!("Detected OS: {} ({})", detection.platform, name),
        None => format!("Detected OS: {}", detection.platform),
    };
    console.say(Tone::Info, &banner);

    let task = match cli.task() {
        Some(task) => task,
        None => match console.read_task()? {
            Some(task) => task,
            None => return Ok(()),
        },
    };

    let generator = OpenAiClient::new(config.llm.clone())?;
    let runner = ShellRunner::new(env::current_dir()?, config.execution.elevation);
    let store = ScriptStore::new(config.execution.script_dir.clone());

    let mut session = Session::new(
        &generator,
        &runner,
        &store,
        &mut console,
        detection.platform,
    );
    let outcome = match config.mode {
        Mode::Interactive => session.run_interactive(&task, config.approval_policy())?,
        Mode::SelfHeal => session.run_self_heal(&task, config.healing_policy())?,
        Mode::Commands => session.run_commands(&task, config.approval_policy())?,
    };

    info!(%outcome, scripts = %store.dir().display(), "done");
    Ok(())
}
