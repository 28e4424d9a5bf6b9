use clap::Parser;
use exemplar_core::ExemplarConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use exemplar_server::{http, AppContext};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "exemplar.toml")]
    config: String,

    /// Check the embedder and example store, then exit.
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (OPENAI_API_KEY in development)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match ExemplarConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let ctx = match AppContext::from_config(config).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to initialise exemplar ({}): {}", e.code(), e);
            std::process::exit(1);
        }
    };

    if args.health {
        match ctx.store.count().await {
            Ok(n) => println!(
                "✅ Store {} ({}) reachable: {} examples",
                ctx.store.name(),
                ctx.store.collection(),
                n
            ),
            Err(e) => {
                println!("❌ Store check failed: {}", e);
                std::process::exit(1);
            }
        }

        match ctx.embedder.embed("health check").await {
            Ok(v) => println!("✅ Embedder {} returned {} dimensions", ctx.embedder.signature(), v.len()),
            Err(e) => {
                println!("❌ Embedder check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Exemplar health check passed");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if !ctx.config.http.enabled {
        tracing::warn!("HTTP API disabled in config; nothing to serve");
        return Ok(());
    }

    http::start_http_server(ctx, tx.subscribe()).await?;

    tracing::info!("Exemplar stopped");
    Ok(())
}
