//! librisd: the libris catalog API server.
//!
//! Serves the HTTP API over the same database the CLI uses, writes a PID
//! file so `libris server` subcommands can discover it, and shuts down
//! gracefully on SIGINT/SIGTERM.

use miette::{IntoDiagnostic, Result};

use libris::api::{self, AppState};
use libris::catalog::Catalog;
use libris::client;
use libris::config::Config;
use libris::paths::LibrisPaths;
use libris::store::BookStore;
use libris::uploads::UploadCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let paths = LibrisPaths::resolve()?;
    paths.ensure_dirs()?;

    let config = Config::load_or_default(&paths.config_file())?;
    let addr = config.listen_addr();

    let store = BookStore::open(config.database_path(&paths.data_dir))?;
    let catalog = Catalog::new(store.clone());
    let uploads = UploadCoordinator::new(catalog.clone(), store, config.storage.clone());

    if let Err(e) = uploads.ensure_bucket().await {
        tracing::warn!(error = %e, "could not ensure storage bucket; uploads will fail until it exists");
    }

    let app = api::router(AppState { catalog, uploads });

    let listener = tokio::net::TcpListener::bind(&addr).await.into_diagnostic()?;
    tracing::info!("librisd listening on {addr}");

    // Write PID file so `libris server` subcommands can discover this process.
    if let Err(e) = client::write_pid_file(&paths, config.server.port, &config.server.bind) {
        tracing::warn!("failed to write PID file: {e}");
    }

    // Serve with graceful shutdown on SIGTERM/SIGINT.
    let paths_for_shutdown = paths.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut sigterm =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                        .expect("failed to register SIGTERM handler");
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            #[cfg(not(unix))]
            {
                ctrl_c.await.ok();
            }
            tracing::info!("librisd shutting down");
            client::remove_pid_file(&paths_for_shutdown);
        })
        .await
        .into_diagnostic()?;

    // Belt-and-suspenders: clean up PID file on normal exit too.
    client::remove_pid_file(&paths);
    Ok(())
}
