mod handlers;
mod stress;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::handlers::{ApiResponse, ClassifyResponse, StressRequest};

#[derive(Parser)]
#[command(
    name = "once",
    about = "once: execute-at-most-once guards for threads and async tasks",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a guarded block (Rust expression) and pick its guard variant
    Classify {
        /// Read the block from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Hammer a fresh guard with concurrent callers and report what each saw
    Stress {
        /// Number of simultaneous callers
        #[arg(short, long, default_value = "100", env = "ONCE_CALLERS")]
        callers: usize,

        /// Guard variant: "blocking" or "cooperative"
        #[arg(long, default_value = "blocking", env = "ONCE_VARIANT")]
        variant: String,

        /// Call the guard again from inside its own block
        #[arg(long)]
        reentrant: bool,

        /// Make the guarded block fail
        #[arg(long)]
        fail: bool,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() {
    // stdout carries the JSON result
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let succeeded = match cli.command {
        Commands::Classify { file } => print_json(classify(file.as_deref())),
        Commands::Stress {
            callers,
            variant,
            reentrant,
            fail,
        } => {
            let request = StressRequest {
                variant,
                callers,
                reentrant,
                fail,
            };
            let registry = once_core::GuardRegistry::global();
            print_json(stress::run(&request, registry).await)
        }
        Commands::Version => {
            println!("once {}", env!("CARGO_PKG_VERSION"));
            println!("Execute-at-most-once guards for threads and cooperative tasks");
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
}

fn read_source(file: Option<&Path>) -> Result<String, String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e)),
        None => {
            eprintln!("Reading guarded block from stdin...");
            let mut input = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut input)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            Ok(input)
        }
    }
}

#[cfg(feature = "classify")]
fn classify(file: Option<&Path>) -> Result<ClassifyResponse, String> {
    use once_core::{SourceClassifier, VariantSelector};

    let source = read_source(file)?;
    let flags = SourceClassifier::new()
        .classify(&source)
        .map_err(|e| e.to_string())?;
    tracing::info!(
        is_asynchronous = flags.is_asynchronous,
        is_failable = flags.is_failable,
        "Block classified"
    );
    Ok(ClassifyResponse::from(flags))
}

#[cfg(not(feature = "classify"))]
fn classify(file: Option<&Path>) -> Result<ClassifyResponse, String> {
    let _ = read_source(file)?;
    Err("once was built without the `classify` feature".to_string())
}

/// Print the outcome as an `ApiResponse` envelope. Returns whether it succeeded.
fn print_json<T: Serialize>(outcome: Result<T, String>) -> bool {
    let succeeded = outcome.is_ok();
    let response = match outcome {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ApiResponse::err(e)
        }
    };

    match serde_json::to_string_pretty(&response) {
        Ok(json) => {
            println!("{}", json);
            succeeded
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            false
        }
    }
}
