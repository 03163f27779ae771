use anyhow::Result;
use clap::Parser;
use hearth::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    hearth::logging::init_tracing(cli.verbose);
    cli.run().await
}
