use anyhow::Result;
use commons::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
