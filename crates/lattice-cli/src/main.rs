//! lattice — render and check cluster descriptions.
//!
//! # Usage
//!
//! ```text
//! lattice render-volume cluster.toml r0
//! lattice render-constraints cluster.toml
//! lattice check cluster.toml r0 --format json
//! lattice ports cluster.toml
//! lattice preview cluster.toml --kind colocation web db --score -INFINITY
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use lattice_core::ConstraintKind;

mod commands;
mod definition;

#[derive(Parser)]
#[command(
    name = "lattice",
    about = "Lattice — constraint graph and replicated-volume config tooling",
    version,
    propagate_version = true,
)]
struct Cli {
    /// lattice.toml overriding the description's [config] table
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configuration block of a replicated-volume resource
    RenderVolume {
        /// Cluster description file
        file: PathBuf,
        /// Volume resource name
        resource: String,
    },
    /// Print every constraint in the cluster, orders first
    RenderConstraints {
        /// Cluster description file
        file: PathBuf,
    },
    /// Report incorrect and changed fields of a volume resource or service
    Check {
        /// Cluster description file
        file: PathBuf,
        /// Volume resource or service name
        resource: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// List replication ports and devices per host
    Ports {
        /// Cluster description file
        file: PathBuf,
    },
    /// Dry-run a new constraint and print what it would do
    Preview {
        /// Cluster description file
        file: PathBuf,
        #[arg(short, long, value_enum, default_value = "colocation")]
        kind: KindArg,
        /// `first` for orders, `rsc` for colocations
        first: String,
        /// `then` for orders, `with-rsc` for colocations
        then: String,
        #[arg(short, long, default_value = "INFINITY", allow_hyphen_values = true)]
        score: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Order,
    Colocation,
}

impl From<KindArg> for ConstraintKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Order => ConstraintKind::Order,
            KindArg::Colocation => ConstraintKind::Colocation,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries rendered configuration.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,lattice=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::RenderVolume { file, resource } => {
            commands::render::volume(&file, config, &resource)
        }
        Commands::RenderConstraints { file } => {
            commands::render::constraints(&file, config)
        }
        Commands::Check { file, resource, format } => {
            commands::check::check(&file, config, &resource, &format)
        }
        Commands::Ports { file } => {
            commands::ports::ports(&file, config)
        }
        Commands::Preview { file, kind, first, then, score } => {
            commands::preview::preview(&file, config, kind.into(), &first, &then, &score).await
        }
    }
}
