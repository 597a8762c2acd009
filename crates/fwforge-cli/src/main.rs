use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fwforge_cli::commands::{self, ProjectArgs};
use tracing::Level;

#[derive(Parser)]
#[command(name = "fwforge", version, about = "Firmware build and upload driver")]
struct Cli {
    /// Print full tool command lines and debug logs.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the requested targets (default: buildprog and size).
    Run {
        /// Project directory containing fwforge.yaml or fwforge.toml.
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
        /// Target to run (size, checkprogsize, upload, buildprog, nobuild, ...).
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },
    /// Print the composed flags, target graph and upload plan as JSON.
    Plan {
        /// Project directory containing fwforge.yaml or fwforge.toml.
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
        /// Targets the plan is computed for.
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },
}

fn main() {
    if let Err(message) = run_cli() {
        let _ = exit_with_error(&message);
    }
}

fn run_cli() -> Result<(), String> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run {
            project_dir,
            targets,
        } => {
            let report = commands::run::run(ProjectArgs {
                project_dir,
                targets,
                verbose: cli.verbose,
            })?;
            for path in &report.built {
                println!("built={}", path.display());
            }
            for path in &report.up_to_date {
                println!("up_to_date={}", path.display());
            }
            if report.uploaded {
                println!("uploaded=true");
            }
            Ok(())
        }
        Command::Plan {
            project_dir,
            targets,
        } => {
            let plan = commands::plan::run(ProjectArgs {
                project_dir,
                targets,
                verbose: cli.verbose,
            })?;
            let text = serde_json::to_string_pretty(&plan)
                .map_err(|err| format!("failed to render plan: {}", err))?;
            println!("{}", text);
            Ok(())
        }
    }
}

fn exit_with_error(message: &str) -> Result<(), String> {
    eprintln!("{}", message);
    std::process::exit(1);
}
