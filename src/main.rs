use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fallout::{
    engine,
    export::{ExportWriter, RunReport},
    scenario::{Overrides, Scenario, ScenarioLoader},
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Airborne particle fallout simulator")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, global = true, default_value = "scenarios/default.yaml")]
    scenario: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one release and write the density grid and report
    Run {
        /// Override the particle count
        #[arg(long)]
        particles: Option<u32>,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Spread particles across all cores
        #[arg(long)]
        parallel: bool,

        /// Directory for outputs
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
    /// Serve the release API over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_logging(scenario: &Scenario) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&scenario.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&cli.scenario)?;
    init_logging(&scenario);

    match cli.command {
        Command::Run {
            particles,
            seed,
            parallel,
            out,
        } => {
            scenario.apply(&Overrides {
                particles,
                seed,
                parallel: parallel.then_some(true),
                ..Overrides::default()
            });
            let params = scenario.release_params()?;
            let outcome = engine::run(params.clone())?;
            let report = RunReport::new(&scenario.name, &params, &outcome);
            let dir = ExportWriter::new(&out).write(&report, &outcome.grid)?;
            println!("{}", report.duration_line());
            println!(
                "Scenario '{}': {} landed, {} off-grid. Outputs in {}",
                scenario.name,
                report.landed,
                report.rejected,
                dir.display()
            );
        }
        Command::Serve { host, port } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(web::run(WebServerConfig {
                scenario,
                host,
                port,
            }))?;
        }
    }
    Ok(())
}
