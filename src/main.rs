use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use thinkview::config::{Config, config};
use thinkview::engine::Engine;
use thinkview::stream::Phase;
use thinkview::{logging, provider, tui};

#[derive(Parser, Debug)]
#[command(name = "thinkview")]
#[command(version = env!("THINKVIEW_VERSION"))]
#[command(about = "Watch a local reasoning model think, then answer")]
struct Args {
    /// Replay a tagged transcript instead of running a model
    #[arg(long, global = true, conflicts_with = "model_command")]
    script: Option<PathBuf>,

    /// Model command that reads a ChatML prompt on stdin
    #[arg(long = "command", value_name = "CMD", global = true)]
    model_command: Option<String>,

    /// Write debug lines to the log file
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single prompt without the TUI and print the result
    Run {
        /// The prompt to send
        prompt: String,

        /// Print the final snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write a commented default config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init();
    logging::cleanup_old_logs();
    logging::set_trace(args.trace);
    logging::info(&format!("thinkview {} starting", env!("THINKVIEW_VERSION")));

    if let Err(e) = run_main(args).await {
        logging::error(&format!("{:?}", e));
        return Err(e);
    }

    Ok(())
}

async fn run_main(args: Args) -> Result<()> {
    let cfg = config();

    match args.command {
        Some(Command::Config { init }) => {
            if init {
                init_config()?;
            } else {
                println!("{}", cfg.display_string());
            }
        }
        Some(Command::Run { prompt, json }) => {
            let provider = provider::from_args(
                args.script.as_deref(),
                args.model_command.as_deref(),
                &cfg.provider,
            )?;
            let mut engine = Engine::new(provider, &cfg.render);
            run_headless(&mut engine, &prompt, json).await?;
        }
        None => {
            let provider = provider::from_args(
                args.script.as_deref(),
                args.model_command.as_deref(),
                &cfg.provider,
            )?;
            let engine = Engine::new(provider, &cfg.render);
            tui::run(engine, cfg).await?;
        }
    }

    Ok(())
}

fn init_config() -> Result<()> {
    if let Some(path) = Config::path().filter(|p| p.exists()) {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    let path = Config::create_default_config_file()?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

async fn run_headless(engine: &mut Engine, prompt: &str, json: bool) -> Result<()> {
    engine.submit(prompt).await?;
    let phase = engine.run_to_end().await;
    let snapshot = engine.snapshot();

    let mut out = io::stdout().lock();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&snapshot)?)?;
    } else {
        let thinking = snapshot.thinking.text();
        if !thinking.is_empty() {
            writeln!(out, "[thinking]\n{}\n", thinking)?;
        }
        writeln!(out, "{}", snapshot.answer.text())?;
    }
    out.flush()?;

    if phase == Phase::Error {
        anyhow::bail!("Generation failed");
    }
    Ok(())
}
