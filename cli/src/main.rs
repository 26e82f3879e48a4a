use clap::Parser;
use comps_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    comps_cli::init_tracing();
    comps_cli::run(Cli::parse()).await
}
