use crate::commands::{self, Command};
use crate::config::{Config, Timings};
use crate::error::NetworkError;
use crate::models::MovieDetail;
use crate::render;
use crate::state::AppState;
use crate::store::{JsonFileStore, KeyValueStore};
use crate::tmdb::{CatalogApi, MoviePage, TmdbClient};
use crate::view::{Effect, Intent, ViewController};
use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const MAX_CONCURRENT_FETCHES: usize = 4;

/// A finished catalog request, tagged with the generation it was issued under.
#[derive(Debug)]
pub enum Completion {
    Page {
        generation: u64,
        result: Result<MoviePage, NetworkError>,
    },
    Detail {
        generation: u64,
        result: Result<MovieDetail, NetworkError>,
    },
}

/// Owns the controller and executes its effects. Fetches run as spawned tasks
/// and come back through the completion channel.
pub struct Session {
    controller: ViewController,
    catalog: Arc<dyn CatalogApi>,
    completions: UnboundedSender<Completion>,
    fetch_sem: Arc<Semaphore>,
}

impl Session {
    pub fn new(
        controller: ViewController,
        catalog: Arc<dyn CatalogApi>,
    ) -> (Self, UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            controller,
            catalog,
            completions: tx,
            fetch_sem: Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES)),
        };
        (session, rx)
    }

    pub fn controller(&self) -> &ViewController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ViewController {
        &mut self.controller
    }

    /// Loads the genre list, then requests the first listing.
    pub async fn start(&mut self) -> bool {
        match self.catalog.fetch_genres().await {
            Ok(genres) => {
                info!("Loaded {} genres", genres.len());
                self.controller.set_genres(genres);
            }
            Err(e) => warn!("Failed to load genres: {}", e),
        }
        let effects = self.controller.start();
        self.dispatch(effects)
    }

    /// Returns whether the view needs rendering.
    pub fn handle(&mut self, intent: Intent, now: Instant) -> bool {
        let effects = self.controller.handle(intent, now);
        self.dispatch(effects)
    }

    pub fn apply(&mut self, completion: Completion, now: Instant) -> bool {
        let effects = match completion {
            Completion::Page { generation, result } => {
                self.controller.on_page_loaded(generation, result, now)
            }
            Completion::Detail { generation, result } => {
                self.controller.on_detail_loaded(generation, result, now)
            }
        };
        self.dispatch(effects)
    }

    /// Timer housekeeping: fires a due search and drops expired notifications.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.controller.expire_notifications(now);
        let effects = self.controller.flush_search(now);
        self.dispatch(effects)
    }

    fn dispatch(&self, effects: Vec<Effect>) -> bool {
        let mut render = false;
        for effect in effects {
            match effect {
                Effect::Render => render = true,
                Effect::FetchPage {
                    generation,
                    criteria,
                } => {
                    debug!(generation, mode = ?criteria.mode, page = criteria.page, "Fetching listing");
                    let catalog = self.catalog.clone();
                    let tx = self.completions.clone();
                    let sem = self.fetch_sem.clone();
                    tokio::spawn(async move {
                        let _permit = match sem.acquire_owned().await {
                            Ok(p) => p,
                            Err(_) => return,
                        };
                        let result = catalog.fetch_page(&criteria).await;
                        if tx.send(Completion::Page { generation, result }).is_err() {
                            debug!(generation, "Session gone; dropping listing result");
                        }
                    });
                }
                Effect::FetchDetail { generation, id } => {
                    debug!(generation, id, "Fetching movie details");
                    let catalog = self.catalog.clone();
                    let tx = self.completions.clone();
                    let sem = self.fetch_sem.clone();
                    tokio::spawn(async move {
                        let _permit = match sem.acquire_owned().await {
                            Ok(p) => p,
                            Err(_) => return,
                        };
                        let result = catalog.fetch_detail(id).await;
                        if tx.send(Completion::Detail { generation, result }).is_err() {
                            debug!(generation, "Session gone; dropping detail result");
                        }
                    });
                }
            }
        }
        render
    }
}

/// Interactive shell: stdin lines in, rendered frames out on stdout.
pub async fn run(config: Config) -> Result<()> {
    let files = JsonFileStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open data dir {}", config.data_dir.display()))?;
    info!("Library stored in {}", files.dir().display());
    let store: Arc<dyn KeyValueStore> = Arc::new(files);
    let state = AppState::hydrate(store);
    let catalog: Arc<dyn CatalogApi> =
        Arc::new(TmdbClient::new(&config).context("Failed to build catalog client")?);
    let controller = ViewController::new(state, Timings::from(&config));
    let (mut session, mut completions) = Session::new(controller, catalog);

    let mut out = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    write_out(&mut out, commands::HELP).await?;
    let render = session.start().await;
    present(&mut out, &mut session, render).await?;

    loop {
        let deadline = session.controller().next_deadline();
        let timer = tokio::time::Instant::from_std(deadline.unwrap_or_else(Instant::now));
        let render = tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    info!("Input closed");
                    break;
                };
                match commands::parse(&line) {
                    Ok(None) => false,
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Help)) => {
                        write_out(&mut out, commands::HELP).await?;
                        false
                    }
                    Ok(Some(Command::Genres)) => {
                        let text = render::genres(
                            session.controller().state().genres(),
                            Utc::now().year(),
                        );
                        write_out(&mut out, &text).await?;
                        false
                    }
                    Ok(Some(Command::Intent(intent))) => session.handle(intent, Instant::now()),
                    Err(e) => {
                        write_out(&mut out, &format!("(!) {e}")).await?;
                        false
                    }
                }
            }
            Some(done) = completions.recv() => session.apply(done, Instant::now()),
            _ = tokio::time::sleep_until(timer), if deadline.is_some() => {
                session.tick(Instant::now())
            }
        };
        present(&mut out, &mut session, render).await?;
    }
    info!("Session closed");
    Ok(())
}

async fn present(out: &mut tokio::io::Stdout, session: &mut Session, render: bool) -> Result<()> {
    let mut text = String::new();
    if render {
        text.push_str(&render::frame(&session.controller().view_model()));
    }
    for n in session.controller_mut().take_notifications() {
        text.push_str(&render::notification(&n));
        text.push('\n');
    }
    if !text.is_empty() {
        write_out(out, text.trim_end()).await?;
    }
    Ok(())
}

async fn write_out(out: &mut tokio::io::Stdout, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
