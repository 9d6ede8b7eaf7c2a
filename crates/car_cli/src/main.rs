//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `car_core` linkage with a deterministic probe.
//! - Optionally dump the first page of a car database as JSON lines.

use car_core::{
    CallContext, CarRepository, CarService, ServiceConfig, StaticIdentityResolver,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "car_cli", about = "Car record service probe", version)]
struct Cli {
    /// SQLite database to read; only the probe runs when omitted.
    #[arg(long, value_name = "path")]
    db: Option<PathBuf>,
    /// JSON service config; `--db` overrides its database path.
    #[arg(long, value_name = "path")]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 1)]
    page: i64,
    #[arg(long = "page-size", default_value_t = 0)]
    page_size: i64,
    /// Case-sensitive model substring filter.
    #[arg(long)]
    model: Option<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("car_cli: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    println!("car_core ping={}", car_core::ping());
    println!("car_core version={}", car_core::core_version());

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    match cli.db {
        Some(path) => config.database.path = path.to_string_lossy().into_owned(),
        None if cli.config.is_none() => return Ok(()),
        None => {}
    }
    config.validate()?;
    car_core::init_logging_from_config(&config.log)?;

    // No identity service is reachable from the CLI; owner names print empty.
    let repo = CarRepository::new(Arc::new(StaticIdentityResolver::default()));
    let service = CarService::new(config.database.open()?, repo, config.pagination);
    let ctx = CallContext::background();
    let page = service.list_car(&ctx, cli.page, cli.page_size, cli.model)?;

    println!("total={}", page.total);
    for item in &page.items {
        println!("{}", serde_json::to_string(item)?);
    }
    service.into_database().close()?;
    Ok(())
}
