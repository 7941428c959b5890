// Main entry point
use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use finsight_cache::infrastructure::config::{
    generate_config_sample, get_config_path, get_database_path, load_config, StoreBackend,
};
use finsight_cache::infrastructure::logging::init_logging;
use finsight_cache::interfaces::cli::Cli;
use finsight_cache::presentation::report;
use finsight_cache::{AppState, FinsightError, ResponseEnvelope};
use serde::Serialize;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup graceful shutdown handler
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Failed to listen for shutdown signal: {}", e);
        } else {
            eprintln!("\n收到中断信号，正在优雅关闭...");
            let _ = shutdown_tx.send(());
        }
    });

    let cli = Cli::parse();

    if cli.generate_config {
        generate_config_sample()?;
        return Ok(());
    }

    let config = load_config()?;

    if config.logging.enable {
        init_logging(&config.logging)?;
    }

    if cli.explain {
        if cli.query.is_empty() {
            eprintln!("{}", "Please provide a query".red());
            std::process::exit(1);
        }
        print!("{}", report::format_explain(&cli.query.join(" "), &cli.intent));
        return Ok(());
    }

    let state = AppState::connect(config).await;

    tokio::select! {
        result = run(&cli, &state) => {
            state.close().await;
            result
        }
        _ = shutdown_rx => {
            eprintln!("操作被中断");
            state.close().await;
            Ok(())
        }
    }
}

async fn run(cli: &Cli, state: &AppState) -> anyhow::Result<()> {
    if cli.status {
        return print_status(state, cli.json).await;
    }
    if let Some(hours) = cli.clear {
        let deleted = state.queries.clear_cache(hours).await;
        println!("Cleared {} query cache entries older than {} hours", deleted, hours);
        return Ok(());
    }
    if let Some(hours) = cli.clear_videos {
        let deleted = state.videos.clear_video_cache(hours).await;
        println!("Cleared {} video cache entries older than {} hours", deleted, hours);
        return Ok(());
    }
    if cli.purge {
        let queries = state.queries.purge_expired().await;
        let videos = state.videos.purge_expired().await;
        println!("Purged {} expired queries and {} expired videos", queries, videos);
        return Ok(());
    }
    if let Some(text) = &cli.search_videos {
        let results = state.videos.search_videos(text).await;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            print!("{}", report::format_video_results(&results));
        }
        return Ok(());
    }

    // Handle query
    if cli.query.is_empty() {
        eprintln!("{}", "Please provide a query".red());
        std::process::exit(1);
    }
    let query = cli.query.join(" ");

    if let Some(raw) = &cli.put {
        let value: serde_json::Value =
            serde_json::from_str(raw).context("--put expects a JSON object")?;
        let response = ResponseEnvelope::from_value(value)?;
        if state.queries.cache_response(&query, &cli.intent, &response).await {
            println!("{}", "Cached".green());
        } else {
            eprintln!("{}", "Response was not cached".yellow());
        }
        return Ok(());
    }

    let lookup = state.queries.lookup(&query, &cli.intent).await;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&lookup.into_response())?);
    } else {
        print!("{}", report::format_lookup(&query, &lookup));
    }

    Ok(())
}

async fn print_status(state: &AppState, json: bool) -> anyhow::Result<()> {
    let queries = state.queries.get_cache_stats().await;
    let videos = state.videos.get_video_stats().await;

    if json {
        let status = serde_json::json!({
            "queries": stats_json(queries),
            "videos": stats_json(videos),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "finsight Status".green().bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = &state.config;
    match config.store.backend {
        StoreBackend::Sqlite => println!("Database: {}", get_database_path(config).display()),
        StoreBackend::Memory => println!("Database: in-memory"),
    }
    println!(
        "Config: {}",
        get_config_path()
            .filter(|p| p.exists())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "Not found".to_string())
    );
    println!(
        "Caching: {}",
        if config.cache.enabled { "enabled" } else { "disabled" }
    );
    println!();

    match queries {
        Ok(stats) => print!("{}", report::format_cache_stats(&stats)),
        Err(e) => println!("{} {}", "Query Cache:".green().bold(), e.to_string().red()),
    }
    println!();
    match videos {
        Ok(stats) => print!("{}", report::format_video_stats(&stats)),
        Err(e) => println!("{} {}", "Video Cache:".green().bold(), e.to_string().red()),
    }

    Ok(())
}

// 统计失败时输出 {"error": ...}
fn stats_json<T: Serialize>(stats: Result<T, FinsightError>) -> serde_json::Value {
    match stats {
        Ok(stats) => serde_json::to_value(stats).unwrap_or(serde_json::Value::Null),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    }
}
