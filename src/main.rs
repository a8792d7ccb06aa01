pub mod config;
pub mod executor;
pub mod query;
pub mod server;
pub mod session;
pub mod storage;

use anyhow::{Context, Result};
use clap::Parser;
use config::ServerConfig;
use executor::Executor;
use server::Server;
use std::path::PathBuf;
use std::sync::Arc;
use storage::csv::CsvStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Column-store database server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML 설정 파일
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long, env = "COLDB_LISTEN")]
    listen: Option<String>,

    #[arg(short, long, value_name = "DIR", env = "COLDB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// 시작할 때 CSV를 다시 읽지 않는다
    #[arg(long)]
    no_restore: bool,

    #[arg(long, env = "COLDB_LOG_LEVEL")]
    log_level: Option<String>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    print_config: bool,
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    // 명령행 인자가 설정 파일보다 우선
    if let Some(listen) = &args.listen {
        config.listen_addr = listen.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if args.no_restore {
        config.restore_on_start = false;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if args.verbose {
        config.log_level = "debug".to_string();
    }
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("coldb={level}")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }
    init_logging(&config.log_level);

    let executor = Executor::new(CsvStore::new(&config.data_dir))
        .with_persist_on_shutdown(config.persist_on_shutdown);
    if config.restore_on_start {
        let tables = executor
            .store()
            .restore(executor.catalog())
            .await
            .with_context(|| format!("failed to restore {}", config.data_dir.display()))?;
        info!(tables, "catalog ready");
    }
    let executor = Arc::new(executor);

    let server = Server::bind(&config.listen_addr, executor.clone())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, persisting before exit");
            executor.shutdown().await;
        }
    }
    Ok(())
}
