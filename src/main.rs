mod aggregator;
mod collectors;
mod config;
mod http;
mod metrics;
mod snapshot;
mod static_files;

use aggregator::{Policies, SnapshotAggregator};
use axum::serve;
use clap::Parser;
use collectors::command::{CommandRunner, SystemCommandRunner};
use collectors::cpu::{CpuSampler, ProcStat};
use collectors::pools::PoolLister;
use collectors::system::SysinfoHost;
use collectors::updates::UpdateChecker;
use config::Config;
use http::HttpAppState;
use metrics::Metrics;
use static_files::PublicRoot;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostpulse")]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    listen: Option<String>,
    #[arg(long)]
    public_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "не удалось загрузить конфигурацию");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(listen) = cli.listen {
        cfg.listen = listen;
    }
    if let Some(public_dir) = cli.public_dir {
        cfg.public_dir = public_dir;
    }
    if let Err(err) = cfg.validate() {
        error!(error = %err, "некорректная конфигурация");
        std::process::exit(1);
    }

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "не удалось инициализировать метрики");
            std::process::exit(1);
        }
    };

    let public = match PublicRoot::new(&cfg.public_dir) {
        Ok(root) => {
            info!(public_dir = %root.path().display(), "каталог статики");
            Some(Arc::new(root))
        }
        Err(err) => {
            warn!(
                public_dir = %cfg.public_dir.display(),
                error = %err,
                "каталог статики недоступен, дашборд отдаваться не будет"
            );
            None
        }
    };

    let state = HttpAppState {
        metrics: metrics.clone(),
        aggregator: Arc::new(build_aggregator(&cfg).with_metrics(metrics)),
        public,
    };

    let addr = match cfg.listen_addr() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "некорректный адрес listen");
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, listen = %addr, "не удалось запустить HTTP-сервер");
            std::process::exit(1);
        }
    };

    info!(
        listen = %addr,
        cpu_sample_interval_ms = cfg.cpu_sample_interval_ms,
        command_timeout_ms = cfg.command_timeout_ms,
        "запуск hostpulse"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let http_task = tokio::spawn(async move {
        let app = http::build_router(state);
        let server = serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        if let Err(err) = server.await {
            error!(error = %err, "ошибка HTTP-сервера");
        }
    });

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "не удалось дождаться Ctrl+C");
    }
    info!("получен Ctrl+C, выполняется остановка");

    let _ = shutdown_tx.send(true);
    let _ = http_task.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_aggregator(cfg: &Config) -> SnapshotAggregator {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new(cfg.command_timeout()));
    let sources = &cfg.sources;

    let cpu = CpuSampler::with_interval(Arc::new(ProcStat::new()), cfg.cpu_sample_interval());
    let pools = sources
        .pools
        .enabled
        .then(|| PoolLister::new(runner.clone()));
    let updates = sources
        .updates
        .enabled
        .then(|| UpdateChecker::new(runner.clone()));

    SnapshotAggregator::new(
        cpu,
        pools,
        updates,
        Arc::new(SysinfoHost),
        Policies {
            cpu: sources.cpu.on_failure,
            pools: sources.pools.on_failure,
            updates: sources.updates.on_failure,
        },
    )
}
