//! Traceability Verifier CLI
//!
//! Checks the Merkle tree of a secured traceability operation, or seals an
//! operation file into the documents such a check expects.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traceability_verifier::config::AppConfig;
use traceability_verifier::traceability::{seal_operations, DigestAlgorithm, MerkleVerifier, StatusCode};
use traceability_verifier::workspace::FsWorkspace;

#[derive(Parser)]
#[command(name = "traceability-verifier")]
#[command(about = "Verify logbook traceability operations against their Merkle tree")]
struct Cli {
    /// Configuration file (defaults to ./traceability-verifier.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a traceability operation's Merkle tree
    Verify {
        /// Traceability operation name in the workspace
        #[arg(short, long)]
        object_name: String,

        /// Traceability descriptor (JSON)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Workspace root directory
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Digest algorithm (SHA-256, SHA-384, SHA-512)
        #[arg(short, long)]
        algorithm: Option<DigestAlgorithm>,
    },
    /// Compute the Merkle root of an operation file
    Seal {
        /// Operation file, one JSON operation per line
        #[arg(short = 'i', long)]
        data: PathBuf,

        /// Digest algorithm (SHA-256, SHA-384, SHA-512)
        #[arg(short, long)]
        algorithm: Option<DigestAlgorithm>,

        /// Where to write the secured Merkle tree document
        #[arg(short, long)]
        merkle_out: Option<PathBuf>,

        /// Where to write the traceability descriptor
        #[arg(short, long)]
        descriptor_out: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Configuration loaded: workspace {:?}, digest {}",
        config.workspace_root, config.digest_algorithm
    );

    let result = match cli.command {
        Commands::Verify {
            object_name,
            descriptor,
            workspace,
            algorithm,
        } => verify(&config, &object_name, &descriptor, workspace, algorithm),
        Commands::Seal {
            data,
            algorithm,
            merkle_out,
            descriptor_out,
        } => seal(
            &data,
            algorithm.unwrap_or(config.digest_algorithm),
            merkle_out.as_deref(),
            descriptor_out.as_deref(),
        )
        .map(|_| StatusCode::Ok),
    };

    match result {
        Ok(StatusCode::Ok) => ExitCode::SUCCESS,
        Ok(StatusCode::Fatal) => ExitCode::from(2),
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn verify(
    config: &AppConfig,
    object_name: &str,
    descriptor: &Path,
    workspace: Option<PathBuf>,
    algorithm: Option<DigestAlgorithm>,
) -> Result<StatusCode> {
    let workspace = FsWorkspace::new(workspace.unwrap_or_else(|| config.workspace_root.clone()));
    let verifier = MerkleVerifier::new(workspace, algorithm.unwrap_or(config.digest_algorithm));

    let status = verifier.execute(object_name, descriptor);
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(status.global_status)
}

fn seal(
    data: &Path,
    algorithm: DigestAlgorithm,
    merkle_out: Option<&Path>,
    descriptor_out: Option<&Path>,
) -> Result<()> {
    let file = File::open(data)
        .map_err(|e| anyhow!("Failed to open operation file {}: {}", data.display(), e))?;
    let sealed = seal_operations(BufReader::new(file), algorithm)?;

    if let Some(path) = merkle_out {
        fs::write(path, serde_json::to_string_pretty(&sealed.merkle_tree)?)
            .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
        info!("Merkle tree written to {}", path.display());
    }

    if let Some(path) = descriptor_out {
        fs::write(path, serde_json::to_string_pretty(&sealed.event)?)
            .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
        info!("Traceability descriptor written to {}", path.display());
    }

    println!("{}", sealed.merkle_tree.root);
    Ok(())
}
