use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use futures::StreamExt;
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

mod cli;

use cli::Cli;
use cli::commands::Commands;
use kube_helper::config::Config;
use kube_helper::engine::{Engine, PresenterUpdate};
use kube_helper::llm::Message;
use kube_helper::tools::{self, ToolId};

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join(format!("{}.log", env!("CARGO_PKG_NAME")));

    // Setup env_logger with file output; RUST_LOG wins over the config
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.unwrap_or("info")))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None | Some(Commands::Chat) => handle_chat_command(cli, config).await,
        Some(Commands::Ask { question }) => handle_ask_command(&question.join(" "), cli, config).await,
        Some(Commands::Tools) => handle_tools_command(),
    }
}

fn build_engine(config: &Config) -> Result<Engine> {
    for status in tools::probe_binaries() {
        if !status.available() {
            warn!("{} not found on PATH", status.tool.program());
            println!(
                "{} {} not found on PATH; {} calls will fail",
                "Warning:".yellow(),
                status.tool.program(),
                status.tool.name()
            );
        }
    }
    Engine::from_config(config).context("Failed to initialize engine")
}

/// Print progress for one turn and return the final update
async fn run_turn(
    engine: &Engine,
    question: &str,
    history: &[Message],
    summary: &str,
    verbose: bool,
) -> Option<PresenterUpdate> {
    let mut updates = engine.submit(question, history.to_vec(), summary);
    let mut last = None;

    while let Some(update) = updates.next().await {
        if update.is_final() {
            last = Some(update);
            continue;
        }
        println!("{}", update.status.dimmed());
        if verbose && !update.early_stop.is_empty() {
            println!("{}", update.early_stop.dimmed());
        }
    }

    last
}

fn print_final(update: &PresenterUpdate, verbose: bool) {
    let answer = update.answer.as_deref().unwrap_or_default();
    if update.failed {
        println!("{} {}", "Error:".red(), answer);
        return;
    }

    println!("{}", answer);
    if verbose {
        println!("{} {}", "Status:".cyan(), update.status);
        if let Some(summary) = update.summary.as_deref().filter(|s| !s.is_empty()) {
            println!("{} {}", "Summary:".cyan(), summary);
        }
    }
}

async fn handle_ask_command(question: &str, cli: &Cli, config: &Config) -> Result<()> {
    info!("Answering one question");
    let engine = build_engine(config)?;

    match run_turn(&engine, question, &[], "", cli.is_verbose()).await {
        Some(update) if update.failed => {
            print_final(&update, cli.is_verbose());
            Err(eyre::eyre!("Turn failed"))
        }
        Some(update) => {
            print_final(&update, cli.is_verbose());
            Ok(())
        }
        None => Err(eyre::eyre!("Turn ended without an answer")),
    }
}

async fn handle_chat_command(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting interactive chat");
    let engine = build_engine(config)?;

    println!(
        "{} context {}. Type {} to leave.",
        "kube-helper".green().bold(),
        config.context.cyan(),
        "exit".yellow()
    );

    let mut history: Vec<Message> = Vec::new();
    let mut summary = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", ">".green());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let Some(update) = run_turn(&engine, question, &history, &summary, cli.is_verbose()).await else {
            continue;
        };
        print_final(&update, cli.is_verbose());

        if let Some(new_summary) = &update.summary {
            summary = new_summary.clone();
        }
        if !update.failed {
            history.push(Message::user(question));
            history.push(Message::assistant(update.answer.unwrap_or_default()));
        }
    }

    info!("Chat ended after {} turn(s)", history.len() / 2);
    Ok(())
}

fn handle_tools_command() -> Result<()> {
    info!("Listing tools");

    for status in tools::probe_binaries() {
        let location = match &status.path {
            Some(path) => path.display().to_string().green(),
            None => "not found on PATH".red(),
        };
        println!("{} ({}): {}", status.tool.name().bold(), status.tool.program(), location);
        println!("  params: {}", status.tool.accepted_params().join(", "));
    }

    let definitions: Vec<_> = ToolId::ALL.iter().map(ToolId::definition).collect();
    match tools::validate_definitions(&definitions) {
        Ok(()) => println!("{}", "Tool schemas match their adapters".green()),
        Err(e) => {
            println!("{} {}", "Schema check failed:".red(), e);
            return Err(e).context("Tool registry is inconsistent");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(context) = &cli.context {
        config.context = context.clone();
    }

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
