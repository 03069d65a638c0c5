use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use remark_core::{Builder, Config, MemFs, NativeFs, builder::SHELL_TEMPLATE, copy_dir};
use tokio::{net::TcpListener, sync::oneshot, task::JoinSet};
use tracing::{error, info, warn};

pub mod clients;
pub mod rebuild;
pub mod server;
pub mod watcher;

pub use clients::ClientRegistry;
pub use rebuild::Rebuilder;
pub use server::{HOT_RELOAD_PATH, hot_reload_script};
pub use watcher::WatchRoots;

pub const DEFAULT_PORT: u16 = 31337;

/// Configuration for the development server
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Deck directories
    pub site: Config,
    /// Auto-open browser
    pub open: bool,
    /// How long the watcher waits for a burst of events to settle
    pub debounce: Duration,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            site: Config::default(),
            open: false,
            debounce: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Status::Stopped => "stopped",
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Stopping => "stopping",
        };
        write!(f, "{status}")
    }
}

struct Running {
    watcher: watcher::FileWatcher,
    shutdown: oneshot::Sender<()>,
    tasks: JoinSet<Result<()>>,
    local_addr: SocketAddr,
}

/// Serves the deck out of an in-memory mirror and pushes updates to
/// connected browsers as files change.
///
/// Dropping a running server tears it down as well, but without waiting for
/// the background tasks; prefer [`DevServer::stop`].
pub struct DevServer {
    config: DevServerConfig,
    mirror: MemFs,
    clients: ClientRegistry,
    status: Status,
    running: Option<Running>,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            config,
            mirror: MemFs::new(),
            clients: ClientRegistry::new(),
            status: Status::Stopped,
            running: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn mirror(&self) -> &MemFs {
        &self.mirror
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Address the HTTP listener is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.status != Status::Stopped {
            bail!("dev server is already {}", self.status);
        }

        self.status = Status::Starting;
        match self.boot().await {
            Ok(running) => {
                let addr = running.local_addr;
                self.running = Some(running);
                self.status = Status::Running;

                info!("Devserver started at http://{addr}");
                if self.config.open {
                    if let Err(e) = open::that(format!("http://{addr}")) {
                        warn!("failed to open browser: {e}");
                    }
                }
                Ok(())
            }
            Err(e) => {
                self.status = Status::Stopped;
                Err(e)
            }
        }
    }

    async fn boot(&mut self) -> Result<Running> {
        let site = self.config.site.clone();

        // preload the mirror
        self.mirror.remove(&site.public_dir);
        self.mirror.remove(&site.slide_source);
        copy_dir(&NativeFs, &site.public_dir, &self.mirror, &site.public_dir)
            .await
            .with_context(|| format!("failed to load {}", site.public_dir.display()))?;
        copy_dir(&NativeFs, &site.slide_source, &self.mirror, &site.slide_source)
            .await
            .with_context(|| format!("failed to load {}", site.slide_source.display()))?;

        let mut builder = Builder::new(site.clone(), self.mirror.clone());
        builder.load().await?;
        let html = builder.build(&self.mirror).await?;
        self.mirror
            .write_file(site.out_dir.join(SHELL_TEMPLATE), html.as_bytes())?;

        let roots = WatchRoots::new(&[&site.public_dir, &site.slide_source])?;
        let (watcher, changes) = watcher::watch(&roots, self.config.debounce)?;

        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .with_context(|| format!("failed to bind {}:{}", self.config.host, self.config.port))?;
        let local_addr = listener.local_addr()?;

        let state = server::AppState::new(
            self.mirror.clone(),
            self.clients.clone(),
            &site.out_dir,
            local_addr.port(),
        );
        let app = server::router(state);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let mut tasks = JoinSet::new();
        tasks.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .context("http server failed")
        });

        let rebuilder = Rebuilder::new(builder, self.mirror.clone(), self.clients.clone(), roots);
        tasks.spawn(rebuilder.run(changes));

        Ok(Running {
            watcher,
            shutdown,
            tasks,
            local_addr,
        })
    }

    /// Resolves when a background task (HTTP server or rebuild loop) ends,
    /// with that task's error if it failed.
    pub async fn wait(&mut self) -> Result<()> {
        let Some(running) = self.running.as_mut() else {
            return Ok(());
        };

        match running.tasks.join_next().await {
            Some(Ok(result)) => result,
            Some(Err(e)) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Stop watching, disconnect every client, close the listener, and wait
    /// for the background tasks to finish.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        self.status = Status::Stopping;

        let Running {
            watcher,
            shutdown,
            mut tasks,
            ..
        } = running;

        drop(watcher);
        self.clients.close_all();
        let _ = shutdown.send(());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("{e:#}"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!("dev server task panicked: {e}"),
            }
        }

        self.status = Status::Stopped;
        info!("Devserver stopped");
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            warn!("dev server dropped while running, shutting down");
            self.clients.close_all();
            let _ = running.shutdown.send(());
        }
    }
}
