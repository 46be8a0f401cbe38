use anyhow::Result;
use dotenvy::dotenv;
use std::path::Path;

use tubefetch::cli::{Cli, Commands};
use tubefetch::core::config::{self, AppConfig};
use tubefetch::core::logging::{init_logger, log_path_writable, log_startup_diagnostics};
use tubefetch::core::web_server::start_web_server;
use tubefetch::download::{ytdlp, MediaFormat};
use tubefetch::service::MediaService;

/// Main entry point
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails or the command itself fails.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present, before reading config
    let _ = dotenv();
    let config = AppConfig::from_env();

    let log_file = if log_path_writable(Path::new(&config.log_file_path)) {
        config.log_file_path.clone()
    } else {
        eprintln!(
            "Log directory for {} does not exist, logging to {}",
            config.log_file_path,
            config::LOG_FILE_PATH
        );
        config::LOG_FILE_PATH.to_string()
    };
    init_logger(&log_file, cli.verbose)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => run_server(config, host, port).await,
        Some(Commands::Search { query, json }) => run_search(&config, &query, json).await,
        Some(Commands::Download {
            video_id,
            title,
            format,
        }) => run_download(&config, &video_id, &title, &format).await,
        Some(Commands::Version) => run_version(&config).await,
        None => {
            log::info!("No command specified, starting the HTTP server");
            run_server(config, None, None).await
        }
    }
}

async fn run_server(config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    log_startup_diagnostics(&config).await;

    let service = MediaService::from_config(&config)?;
    let host = host.unwrap_or_else(|| config.web_host.clone());
    let port = port.unwrap_or(config.web_port);
    start_web_server(&host, port, service).await
}

async fn run_search(config: &AppConfig, query: &str, json: bool) -> Result<()> {
    let service = MediaService::from_config(config)?;
    let results = service.search(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results (videos longer than {}s are skipped)", config.max_duration_secs);
    }
    for result in results {
        println!("{}  {}", result.id, result.title);
    }
    Ok(())
}

/// Downloads without a lease: the CLI keeps the file.
async fn run_download(config: &AppConfig, video_id: &str, title: &str, format: &str) -> Result<()> {
    let service = MediaService::from_config(config)?;
    let file = service
        .downloads()
        .download(video_id, title, format.parse::<MediaFormat>()?)
        .await?;
    println!("{} ({} bytes)", file.path.display(), file.size);
    Ok(())
}

async fn run_version(config: &AppConfig) -> Result<()> {
    println!("tubefetch {}", env!("CARGO_PKG_VERSION"));
    match ytdlp::tool_version(&config.ytdl_bin).await {
        Ok(version) => println!("yt-dlp {}", version),
        Err(e) => println!("yt-dlp unavailable: {}", e),
    }
    Ok(())
}
