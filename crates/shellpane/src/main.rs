//! # shellpane
//!
//! Run a shell in a headless embedded terminal and print its screen.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shellpane::{run, RunOptions, RunReport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = RunOptions::parse();

    if options.schema {
        println!("{}", RunReport::schema_json()?);
        return Ok(());
    }

    let settings = options.settings()?;

    // Logs go to stderr so the screen output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    tracing::info!("shellpane v{} starting", env!("CARGO_PKG_VERSION"));

    let report = run(&options, settings).await?;

    if options.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{json}");
    } else {
        println!("{}", report.render_text(options.scrollback));
    }

    if !report.condition_met {
        anyhow::bail!(
            "timed out after {}ms waiting for {:?}",
            report.waited_ms,
            options.wait_for.unwrap_or_default()
        );
    }

    Ok(())
}
