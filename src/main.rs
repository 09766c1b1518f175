//! hdkb CLI: learn DSL files into a fresh session, then query or prove.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use hdkb::config::SessionConfig;
use hdkb::session::Session;

#[derive(Parser)]
#[command(name = "hdkb", version, about = "Theory-driven hyperdimensional knowledge base")]
struct Cli {
    /// Session configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of theory files; overrides `theory_dir` from the config.
    #[arg(long, global = true)]
    theory_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn DSL files in order, then optionally prove or query.
    Learn {
        /// DSL files, each learned atomically.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Ground goal to prove afterwards, e.g. "isA Poodle Animal".
        #[arg(long)]
        prove: Option<String>,

        /// Pattern with ?holes to query afterwards, e.g. "isA ?x Animal".
        #[arg(long)]
        query: Option<String>,
    },
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(dir) = cli.theory_dir {
        config.theory_dir = Some(dir);
    }

    match cli.command {
        Commands::Learn { files, prove, query } => {
            let mut session = Session::new(config)?;
            let mut all_ok = true;
            for file in &files {
                let text = std::fs::read_to_string(file).into_diagnostic()?;
                let label = file.display().to_string();
                let outcome = session.learn_from(&text, Some(label.as_str()));
                all_ok &= outcome.success;
                print_json(&serde_json::json!({ "file": label, "learn": outcome }))?;
            }
            if let Some(goal) = prove {
                print_json(&session.prove(&goal)?)?;
            }
            if let Some(pattern) = query {
                print_json(&session.query(&pattern)?)?;
            }
            session.close();
            if !all_ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
