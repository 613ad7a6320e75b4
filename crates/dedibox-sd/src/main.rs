mod config;
mod discovery;
mod error;
mod handler;
mod labels;
mod model;
mod synth;
#[cfg(test)]
mod testing;
mod upstream;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use env_flags::env_flags;
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*};

use crate::config::{UserConfig, load_user_config, pick, resolve_home};
use crate::handler::{AppState, router};
use crate::labels::{DEFAULT_FLATTEN_DEPTH, DEFAULT_FLATTEN_PREFIX, LabelPolicy};
use crate::synth::{DEFAULT_SCRAPE_PORT, Synthesizer};
use crate::upstream::{DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS, UpstreamClient, UpstreamSettings};

#[derive(Debug, Clone, Copy)]
enum LogFormat {
    Json,
    Compact,
    Pretty,
    Full,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(format: LogFormat, ansi: bool, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = tracing_subscriber::fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);
    match format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Full => base.boxed(),
    }
}

fn init_tracing(sd_home: &Path, user_cfg: Option<&UserConfig>) {
    env_flags! {
        /// Tracing filter, e.g. "info", "debug", or targets format.
        RUST_LOG: &str = "info";
        /// Preferred filter env (alias). If set, overrides RUST_LOG.
        TRACING_FILTER: &str = "";
        /// Pretty formatting for logs (ignored if TRACING_JSON=true).
        TRACING_PRETTY: bool = false;
        /// Compact single-line formatting for logs (ignored if TRACING_JSON=true)
        TRACING_COMPACT: bool = true;
        /// JSON formatting for logs
        TRACING_JSON: bool = false;
        /// If true, also log to a daily file under LOG_DIR
        LOG_TO_FILE: bool = false;
        /// Optional explicit log directory. Defaults to <SD_HOME>/logs
        LOG_DIR: &str = "";
    }

    let env_set = |k: &str| std::env::var_os(k).is_some();
    let cfg = user_cfg.and_then(|c| c.logging.as_ref());

    // TRACING_FILTER first, then RUST_LOG, then config file.
    let level = if !(*TRACING_FILTER).is_empty() {
        (*TRACING_FILTER).to_string()
    } else if env_set("RUST_LOG") {
        (*RUST_LOG).to_string()
    } else {
        cfg.and_then(|c| c.level.clone())
            .unwrap_or_else(|| (*RUST_LOG).to_string())
    };
    let json = pick("TRACING_JSON", *TRACING_JSON, cfg.and_then(|c| c.json));
    let compact = pick("TRACING_COMPACT", *TRACING_COMPACT, cfg.and_then(|c| c.compact));
    let pretty = pick("TRACING_PRETTY", *TRACING_PRETTY, cfg.and_then(|c| c.pretty));
    let to_file = pick("LOG_TO_FILE", *LOG_TO_FILE, cfg.and_then(|c| c.to_file));
    let log_dir = pick(
        "LOG_DIR",
        (*LOG_DIR).to_string(),
        cfg.and_then(|c| c.dir.clone()),
    );

    let format = if json {
        LogFormat::Json
    } else if compact {
        LogFormat::Compact
    } else if pretty {
        LogFormat::Pretty
    } else {
        LogFormat::Full
    };

    // Always write to stderr; stdout stays free for tooling.
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(format, true, std::io::stderr)];

    static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
    let mut file_error = None;
    if to_file {
        let dir = if log_dir.is_empty() {
            sd_home.join("logs")
        } else {
            config::expand_home(&log_dir)
        };
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&dir, "dedibox-sd.log");
                let (nb, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);
                layers.push(fmt_layer(format, false, nb));
            }
            Err(e) => file_error = Some(format!("failed to create log dir {}: {}", dir.display(), e)),
        }
    }

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
    {
        tracing::debug!("tracing already set: {:?}", e);
    }
    if let Some(msg) = file_error {
        tracing::warn!("{}", msg);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_flags! {
        /// Service home holding config.toml and logs. Defaults to $HOME/.dedibox-sd
        SD_HOME: &str = "";
    }

    let sd_home = resolve_home(*SD_HOME);
    let (user_cfg, cfg_error) = match load_user_config(&sd_home) {
        Ok(cfg) => (cfg, None),
        Err(e) => (None, Some(e)),
    };

    // Initialize tracing early
    init_tracing(&sd_home, user_cfg.as_ref());
    if let Some(e) = cfg_error {
        tracing::warn!(
            "ignoring {}: {} (using defaults)",
            sd_home.join("config.toml").display(),
            e
        );
    }

    env_flags! {
        /// Bearer token for the Online API (required)
        ONLINE_API_TOKEN: &str = "";
        /// API base including version path
        ONLINE_API_BASE: &str = DEFAULT_API_BASE;
        /// Listen address for the discovery endpoint
        SD_HOST: &str = "0.0.0.0";
        SD_PORT: u16 = 8000;
        /// Discovery endpoint path
        SD_PATH: &str = "/scw-sd";
        /// Port appended to each server's primary address
        SD_SCRAPE_PORT: u16 = DEFAULT_SCRAPE_PORT;
        /// Metadata label policy: "tags" or "flatten"
        SD_LABEL_POLICY: &str = "tags";
        /// Root prefix and depth bound for the flatten policy
        SD_FLATTEN_PREFIX: &str = DEFAULT_FLATTEN_PREFIX;
        SD_FLATTEN_DEPTH: usize = DEFAULT_FLATTEN_DEPTH;
        /// Rewrite label names into the Prometheus charset (off keeps `tag_<value>` verbatim)
        SD_SANITIZE_LABELS: bool = false;
        /// Max in-flight detail calls per discovery request (1 = sequential)
        SD_DETAIL_CONCURRENCY: usize = 1;
        /// Per-call upstream timeout in seconds
        SD_REQUEST_TIMEOUT_SECS: u64 = DEFAULT_TIMEOUT_SECS;
    }

    let d = user_cfg.as_ref().and_then(|c| c.discovery.as_ref());
    let api_base = pick(
        "ONLINE_API_BASE",
        (*ONLINE_API_BASE).to_string(),
        d.and_then(|d| d.api_base.clone()),
    );
    let host = pick("SD_HOST", (*SD_HOST).to_string(), d.and_then(|d| d.host.clone()));
    let port = pick("SD_PORT", *SD_PORT, d.and_then(|d| d.port));
    let mut path = pick("SD_PATH", (*SD_PATH).to_string(), d.and_then(|d| d.path.clone()));
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    let scrape_port = pick("SD_SCRAPE_PORT", *SD_SCRAPE_PORT, d.and_then(|d| d.scrape_port));
    let policy_name = pick(
        "SD_LABEL_POLICY",
        (*SD_LABEL_POLICY).to_string(),
        d.and_then(|d| d.label_policy.clone()),
    );
    let flatten_prefix = pick(
        "SD_FLATTEN_PREFIX",
        (*SD_FLATTEN_PREFIX).to_string(),
        d.and_then(|d| d.flatten_prefix.clone()),
    );
    let flatten_depth = pick("SD_FLATTEN_DEPTH", *SD_FLATTEN_DEPTH, d.and_then(|d| d.flatten_depth));
    let sanitize_labels = pick(
        "SD_SANITIZE_LABELS",
        *SD_SANITIZE_LABELS,
        d.and_then(|d| d.sanitize_labels),
    );
    let detail_concurrency = pick(
        "SD_DETAIL_CONCURRENCY",
        *SD_DETAIL_CONCURRENCY,
        d.and_then(|d| d.detail_concurrency),
    )
    .max(1);
    let timeout_secs = pick(
        "SD_REQUEST_TIMEOUT_SECS",
        *SD_REQUEST_TIMEOUT_SECS,
        d.and_then(|d| d.request_timeout_secs),
    );

    let policy = match policy_name.parse::<LabelPolicy>() {
        Ok(LabelPolicy::Flatten { .. }) => LabelPolicy::Flatten {
            prefix: flatten_prefix,
            max_depth: flatten_depth,
        },
        Ok(p) => p,
        Err(e) => {
            tracing::error!("{}", e);
            anyhow::bail!(e);
        }
    };

    let client = match UpstreamClient::new(&UpstreamSettings {
        api_base: api_base.clone(),
        token: (*ONLINE_API_TOKEN).to_string(),
        timeout: Duration::from_secs(timeout_secs),
    }) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    let state = AppState {
        api: Arc::new(client),
        synthesizer: Arc::new(Synthesizer {
            scrape_port,
            policy,
            sanitize_labels,
        }),
        detail_concurrency,
    };
    tracing::debug!(
        "synthesizer: scrape_port={}, policy={:?}, sanitize_labels={}, detail_concurrency={}",
        state.synthesizer.scrape_port,
        state.synthesizer.policy,
        state.synthesizer.sanitize_labels,
        state.detail_concurrency
    );
    let app = router(&path, state);

    let addr = format!("{host}:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("failed to bind {}: {}", addr, e);
            return Err(e).with_context(|| format!("binding {addr}"));
        }
    };
    tracing::info!(
        "dedibox-sd listening on {} (path={}, api_base={}, timeout_secs={})",
        addr,
        path,
        api_base,
        timeout_secs
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("discovery server error")?;
    tracing::info!("server stopped");
    Ok(())
}
