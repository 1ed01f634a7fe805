use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{error, info};
use std::fs;
use std::path::PathBuf;

use cycler::checkpoint::GateMode;
use cycler::cli::Cli;
use cycler::domain::{SessionOutcome, SummaryKind};
use cycler::orchestrator::Orchestrator;
use cycler::presenter::{ConsolePresenter, Presenter};
use cycler::signals::InterruptCounter;
use cycler::tui::SplitPanePresenter;
use cycler::workspace::Workspace;

fn setup_logging(verbose: bool) -> Result<PathBuf> {
    let project = env!("CARGO_PKG_NAME");
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(project)
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join(format!("{}.log", project));

    // Never log to the terminal: it belongs to the presenter
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

fn print_summary(outcome: &SessionOutcome) {
    match outcome.summary_kind() {
        SummaryKind::Finished => println!("{} {}", "✔".green().bold(), outcome.to_string().green()),
        SummaryKind::UserAborted => println!("{} {}", "✋".yellow().bold(), outcome.to_string().yellow()),
        SummaryKind::Errors => {
            if let SessionOutcome::PreflightFailed(missing) = outcome {
                println!("{}", "✘ missing tools:".red().bold());
                for tool in missing {
                    println!("  - {}", tool);
                }
            } else {
                println!("{} {}", "✘".red().bold(), outcome.to_string().red());
            }
        }
    }
}

async fn run_session(cli: &Cli, orchestrator: &Orchestrator) -> Result<SessionOutcome> {
    let mut presenter: Box<dyn Presenter> = if cli.tui {
        Box::new(SplitPanePresenter::new(50).context("Failed to start the terminal interface")?)
    } else {
        let interrupts = InterruptCounter::listen().context("Failed to install SIGINT handler")?;
        Box::new(ConsolePresenter::new(cli.mode_tag(), interrupts))
    };

    let outcome = orchestrator.run(presenter.as_mut()).await;

    // restores the terminal before the summary is printed
    drop(presenter);
    Ok(outcome)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = setup_logging(cli.is_verbose()).context("Failed to setup logging")?;
    if cli.is_verbose() {
        println!("{} {}", "Logging to".yellow(), log_file.display());
    }

    let workspace = Workspace::new(cli.workspace_dir());
    info!(
        "Starting in {} at {} (config: {:?})",
        cli.mode_tag(),
        workspace.root().display(),
        cli.config
    );

    let mode: GateMode = cli.gate_mode();
    let orchestrator = Orchestrator::new(workspace, cli.config.clone(), mode);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    let outcome = runtime.block_on(run_session(&cli, &orchestrator))?;
    // a killed stage may leave nothing worth waiting for
    runtime.shutdown_background();

    print_summary(&outcome);
    let code = outcome.exit_code();
    if code != 0 {
        error!("Exiting with code {}: {}", code, outcome);
    }
    std::process::exit(code);
}
