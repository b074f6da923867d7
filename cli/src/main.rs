//! opskit CLI - SSH sessions, tunnels, ordered steps and TAP tests

use std::process::ExitCode;

use clap::Parser;

use opskit::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
