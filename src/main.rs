//! Kiln CLI - launch, provision, and bake single cloud instances

use clap::Parser;

use kiln_cli::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
