//! Application wiring.
//!
//! Builds the store and adapters from configuration, registers sources and
//! runs either one cycle per source or the long-running pipeline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::extract::ReadabilityExtractor;
use crate::feed::RssFetcher;
use crate::ingest::{job_queue, Job, JobSender, Planner, Worker};
use crate::notify::TelegramBot;
use crate::retrieve::{FlareSolverr, RetrieveOptions};
use crate::store::{SqlStore, WatermarkStore};
use crate::{CourierError, Result};

/// Register every source, ignoring names that already exist.
pub async fn register_sources<'a, I>(store: &dyn WatermarkStore, names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for name in names {
        match store.create_source(name).await {
            Ok(id) => info!("Registered source {} (id {})", name, id),
            Err(CourierError::SourceAlreadyExists(_)) => {
                debug!("Source {} already registered", name)
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Start one planner task per source, each feeding jobs into `sender`.
pub fn schedule_sources(
    planner: &Planner,
    sources: &[(String, Duration)],
    sender: &JobSender,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(sources.len());
    for (name, every) in sources {
        let sender = sender.clone();
        let source = name.clone();
        let handle = planner.schedule(name, *every, move || {
            let sender = sender.clone();
            let job = Job::new(source.clone());
            async move {
                if let Err(e) = sender.enqueue(job).await {
                    warn!("Could not enqueue job: {}", e);
                }
            }
        })?;
        handles.push(handle);
    }
    Ok(handles)
}

/// The assembled application.
pub struct App {
    config: Config,
    store: Arc<SqlStore>,
    bot: Arc<TelegramBot>,
    worker: Arc<Worker>,
}

impl App {
    /// Open the database and build every component.
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::open(&config.database.url, config.database.max_connections).await?;
        let store = Arc::new(SqlStore::new(
            Arc::new(db),
            Duration::from_secs(config.database.op_timeout_secs),
        ));

        let feeds = config
            .sources
            .iter()
            .map(|(name, source)| (name.clone(), source.feed_url.clone()))
            .collect();
        let fetcher = Arc::new(RssFetcher::new(&config.fetcher, feeds)?);
        let retriever = Arc::new(FlareSolverr::new(&config.flaresolverr)?);
        let extractor = Arc::new(ReadabilityExtractor::new()?);
        let bot = Arc::new(TelegramBot::new(&config.telegram)?);

        let worker = Worker::new(
            store.clone(),
            fetcher,
            retriever,
            extractor,
            bot.clone(),
        )
        .with_retrieve_options(RetrieveOptions {
            disable_media: config.flaresolverr.disable_media,
        })
        .with_bootstrap_lookback(Duration::from_secs(
            config.scheduler.bootstrap_lookback_secs,
        ));

        Ok(Self {
            config,
            store,
            bot,
            worker: Arc::new(worker),
        })
    }

    async fn register(&self) -> Result<()> {
        register_sources(
            self.store.as_ref(),
            self.config.sources.keys().map(String::as_str),
        )
        .await
    }

    /// Run one cycle per source, in name order. Returns the number of
    /// failed cycles.
    pub async fn run_once(&self) -> Result<usize> {
        self.register().await?;

        let mut failures = 0;
        for name in self.config.sources.keys() {
            if !self.worker.handle(&Job::new(name.as_str())).await {
                failures += 1;
            }
        }
        Ok(failures)
    }

    /// Run scheduler, worker and feedback listener until `shutdown_signal`
    /// resolves.
    pub async fn run<S>(self, shutdown_signal: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        self.register().await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (sender, jobs) = job_queue(self.config.scheduler.queue_capacity);

        let sources: Vec<(String, Duration)> = self
            .config
            .sources
            .iter()
            .map(|(name, source)| (name.clone(), self.config.update_interval(source)))
            .collect();
        let planner = Planner::new(shutdown_rx.clone());
        let schedulers = schedule_sources(&planner, &sources, &sender)?;
        drop(sender);

        let worker = Arc::clone(&self.worker);
        let worker_shutdown = shutdown_rx.clone();
        let worker_task = tokio::spawn(async move { worker.run(jobs, worker_shutdown).await });

        let bot = Arc::clone(&self.bot);
        let store: Arc<dyn WatermarkStore> = self.store.clone();
        let listener_task = tokio::spawn(async move { bot.listen(store, shutdown_rx).await });

        info!("feedcourier running with {} source(s)", sources.len());
        shutdown_signal.await;
        info!("Shutting down");
        let _ = shutdown_tx.send(true);

        // The worker goes first: dropping its queue releases planners
        // blocked on a full queue.
        if let Err(e) = worker_task.await {
            warn!("Worker task ended abnormally: {}", e);
        }
        for handle in schedulers {
            let _ = handle.await;
        }
        if let Err(e) = listener_task.await {
            warn!("Feedback listener ended abnormally: {}", e);
        }

        info!("Shutdown complete");
        Ok(())
    }
}
