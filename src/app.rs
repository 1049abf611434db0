use crate::config::Config;
use crate::jobs::JobManager;
use crate::portal::PortalLayout;
use crate::portal::chromium::ChromiumDriver;
use crate::scrape::ScrapePipeline;
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Main application struct: configuration plus the wired-up shared state.
pub struct App {
    config: Config,
    state: AppState,
}

impl App {
    /// Build the driver, pipeline and job manager from `config`.
    pub fn new(config: Config) -> Self {
        let layout = PortalLayout::new(config.portal_base_url.clone());
        let driver = ChromiumDriver::new(layout, config.browser.clone(), config.timeouts);
        let pipeline = ScrapePipeline::new(Arc::new(driver), config.timeouts);
        let jobs = JobManager::new(Arc::new(pipeline), config.jobs);
        let state = AppState::new(jobs, config.jobs.heartbeat_interval);

        info!(
            portal = %config.portal_base_url,
            headless = config.browser.headless,
            navigation_timeout = fmt_duration(config.timeouts.navigation),
            selector_timeout = fmt_duration(config.timeouts.selector),
            job_timeout = fmt_duration(config.jobs.timeout),
            job_retention = fmt_duration(config.jobs.retention),
            "application configured"
        );

        App { config, state }
    }

    /// Serve HTTP until a shutdown signal, then drain within the shutdown timeout.
    pub async fn run(self) -> ExitCode {
        match self.serve().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = ?e, "web server failed");
                ExitCode::FAILURE
            }
        }
    }

    async fn serve(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(%addr, "web server listening");

        let shutdown = self.state.shutdown.clone();
        let router = create_router(self.state.clone());
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future();
        let mut server = tokio::spawn(server);

        tokio::select! {
            joined = &mut server => {
                return joined.context("web server task panicked")?.context("web server error");
            }
            () = wait_for_signal() => {}
        }

        // Open event streams end on cancellation; in-flight jobs are not awaited.
        shutdown.cancel();
        let stats = self.state.jobs.stats();
        info!(
            running_jobs = stats.running,
            timeout = fmt_duration(self.config.shutdown_timeout),
            "shutting down"
        );

        match tokio::time::timeout(self.config.shutdown_timeout, server).await {
            Ok(joined) => joined
                .context("web server task panicked")?
                .context("web server error"),
            Err(_) => {
                warn!("graceful shutdown timed out, exiting anyway");
                Ok(())
            }
        }
    }
}

/// Resolve on Ctrl+C, or on SIGTERM where available.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}
