//! heppipe CLI
//!
//! Runs a declarative analysis sequence over collider event files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use heppipe::{config::EE_ZH_TEMPLATE, init_rayon, run_pipeline, run_single_event, Config, Sequence};

#[derive(Parser)]
#[command(name = "heppipe")]
#[command(about = "Run an event-processing analysis sequence", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Override the number of chunks processed in parallel
    #[arg(long, global = true)]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis (default if no command specified)
    Run {
        /// Process only this event of the first chunk, with the detector display on
        iev: Option<usize>,

        /// Override the number of events per chunk
        #[arg(long)]
        n_events: Option<usize>,

        /// Override the output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Validate configuration and the stage sequence
    Validate,

    /// Print the stage sequence and the fields it produces
    Show,

    /// Generate the ee -> ZH configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => {
            run_command(cli.config, cli.jobs, None, None, None)?;
        }

        Some(Commands::Run {
            iev,
            n_events,
            output_dir,
        }) => {
            run_command(cli.config, cli.jobs, iev, n_events, output_dir)?;
        }

        Some(Commands::Validate) => {
            validate_command(cli.config)?;
        }

        Some(Commands::Show) => {
            show_command(cli.config)?;
        }

        Some(Commands::GenerateConfig { output }) => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

fn run_command(
    config_path: PathBuf,
    jobs: Option<usize>,
    iev: Option<usize>,
    n_events: Option<usize>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = Config::from_file(&config_path)?;

    // Apply overrides
    if let Some(j) = jobs {
        config.looper.jobs = Some(j);
    }
    if let Some(n) = n_events {
        config.looper.n_events = Some(n);
    }
    if let Some(dir) = output_dir {
        config.looper.output_dir = dir;
    }

    config.validate()?;

    if let Some(iev) = iev {
        tracing::info!("Interactive mode: event {}", iev);
        run_single_event(config, iev)?;
        return Ok(());
    }

    init_rayon(config.looper.jobs)?;
    run_pipeline(config)?;

    Ok(())
}

fn validate_command(config_path: PathBuf) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    config.validate()?;
    Sequence::build(&config.sequence)?;
    println!("Configuration is valid");
    Ok(())
}

fn show_command(config_path: PathBuf) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    config.validate()?;
    let sequence = Sequence::build(&config.sequence)?;

    println!("\n=== Sequence ===");
    for (i, stage) in config.sequence.iter().enumerate() {
        println!("{:>3}. {:<24} {}", i + 1, stage.name, stage.stage.kind_name());
    }

    println!("\n=== Fields ===");
    print!("{}", sequence.schema());

    println!("\n=== Components ===");
    for component in &config.components {
        println!(
            "{}: {} files, split factor {}",
            component.name,
            component.files.len(),
            component.split_factor
        );
    }
    println!();

    Ok(())
}

fn generate_config_command(output: PathBuf) -> Result<()> {
    std::fs::write(&output, EE_ZH_TEMPLATE)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}
