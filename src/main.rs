use anyhow::Result;
use clap::Parser;

mod app;
mod cli;
mod recognizer;
mod telemetry;
mod terminal;

use app::App;
use cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init()?;

    let app = App::new(cli)?;
    app.run().await?;

    Ok(())
}
