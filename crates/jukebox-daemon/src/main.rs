mod console;
mod http;
mod spotify;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use jukebox_core::config::Config;
use jukebox_core::coordinator::Coordinator;
use jukebox_core::dispatcher::PlaybackDispatcher;
use jukebox_core::reader::TagReader;
use jukebox_core::registration::Registrar;
use jukebox_core::session::AuthSession;
use jukebox_core::store::MappingStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn init_logging() -> anyhow::Result<std::path::PathBuf> {
    let data_dir = jukebox_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // File log for the unattended Pi, stderr for an interactive session.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,jukebox_daemon=debug,jukebox_core=debug")
            }),
        )
        .init();

    Ok(log_path)
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run());
    // An abandoned registration can leave a blocking read that never returns.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run() -> anyhow::Result<()> {
    let log_path = init_logging()?;
    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let store = MappingStore::open(&config.store.db_path)
        .await
        .with_context(|| format!("opening {}", config.store.db_path.display()))?;

    let coordinator = Arc::new(Coordinator::new());
    let reader: Arc<dyn TagReader> = Arc::new(console::ConsoleReader::spawn());
    let session = AuthSession::from_cache_and_env(&config.spotify.token_cache);
    let controller = spotify::SpotifyController::new(&config.spotify, session.clone())?;

    if config.registration.resume_timeout_secs.is_none() {
        warn!("registration.resume_timeout_secs unset: an abandoned registration keeps playback paused");
    }
    let registrar = Arc::new(Registrar::new(
        Arc::clone(&coordinator),
        Arc::clone(&reader),
        store.clone(),
        config.registration.resume_timeout(),
    ));

    let shutdown = CancellationToken::new();

    // Playback failing to start does not take the registration form down.
    let dispatcher = PlaybackDispatcher::new(
        Arc::clone(&coordinator),
        Arc::clone(&reader),
        store,
        controller,
        session,
        config.dispatcher.clone(),
    );
    let dispatcher_handle = tokio::spawn({
        let shutdown = shutdown.child_token();
        async move {
            match dispatcher.run(shutdown).await {
                Ok(()) => info!("Dispatcher stopped"),
                Err(e) => error!("Dispatcher exited: {}", e),
            }
        }
    });

    let http_handle = http::start_server(
        config.http.bind_address.clone(),
        config.http.port,
        registrar,
        shutdown.child_token(),
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    shutdown.cancel();

    if let Err(e) = dispatcher_handle.await {
        error!("Dispatcher task failed: {}", e);
    }
    // A registration blocked on a tag read keeps its request open.
    if tokio::time::timeout(SHUTDOWN_GRACE, http_handle).await.is_err() {
        warn!("HTTP server still busy after {:?}, not waiting", SHUTDOWN_GRACE);
    }
    Ok(())
}
