mod app;
mod completion;
mod config;
mod http;
mod relay;
mod session;

use crate::app::AppHandles;
use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::log::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

const VERSION: &str = env!("VERSION");

#[derive(Parser)]
#[command(name = "whatsapp-gemini-relay")]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version = VERSION)]
struct CliArguments {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Never ask for the GEMINI_API_KEY on the terminal.
    #[arg(long)]
    no_prompt: bool,
}

pub type TracingReloadHandle = reload::Handle<EnvFilter, Registry>;

fn init_tracing() -> TracingReloadHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, reload_handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .init();
    info!("build version: {VERSION}");

    reload_handle
}

fn main() -> Result<()> {
    dotenv().ok();

    let tracing_reload = init_tracing();
    let args = CliArguments::parse();
    let config = config::AppConfig::load(args.config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async move {
            let handles = AppHandles::new(config, tracing_reload, !args.no_prompt).await?;
            handles.run().await;
            Ok(())
        })
}
