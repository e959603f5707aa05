//! Per-institution polling worker
//!
//! Each worker owns the fetchers of one institution and runs a loop:
//! startup jitter, then one cycle every `interval_secs` measured from the end
//! of the previous cycle. A cycle fetches the window, merges, compiles and
//! publishes a new [`Snapshot`]. Failures are logged and recorded in the
//! [`CycleStatus`]; the previously published snapshot stays in place.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rand::Rng;
use tokio::sync::watch;

use super::fetcher::{PlanFetcher, WindowFetch};
use crate::config::{Config, FeedRole, InstitutionConfig, WorkerConfig};
use crate::content::{build_servable_content, ServableContent, TenantSource};
use crate::error::{CrawlErrorTrait, Error, Result};
use crate::export::{normalize, BatchSink, JsonDirectorySink};
use crate::merge::{merge_day_schedules, MergeOptions};
use crate::models::MergedSchedule;
use crate::parser::ParseOptions;
use crate::utils::error::FetchError;

/// Immutable result of one successful cycle
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub institution: String,
    pub published_at: DateTime<Utc>,
    pub student: MergedSchedule,
    pub teacher: Option<MergedSchedule>,
    pub content: ServableContent,
}

/// Outcome of the most recent cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    /// No cycle has finished yet
    Pending,
    Ok { at: DateTime<Utc> },
    Failed { at: DateTime<Utc>, message: String },
}

impl CycleStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug)]
struct SharedState {
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    status: RwLock<CycleStatus>,
}

/// Read access to a worker's published state
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: String,
    title: String,
    shared: Arc<SharedState>,
}

impl WorkerHandle {
    fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            shared: Arc::new(SharedState {
                snapshot: RwLock::new(None),
                status: RwLock::new(CycleStatus::Pending),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Last published snapshot, `None` until the first cycle succeeds
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.shared
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outcome of the most recent cycle
    pub fn status(&self) -> CycleStatus {
        self.shared
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, snapshot: Arc<Snapshot>) {
        *self
            .shared
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    fn set_status(&self, status: CycleStatus) {
        *self
            .shared
            .status
            .write()
            .unwrap_or_else(PoisonError::into_inner) = status;
    }
}

/// Polling worker of one institution
pub struct InstitutionWorker {
    config: InstitutionConfig,
    settings: WorkerConfig,
    timezone: Tz,
    student: PlanFetcher,
    teacher: Option<PlanFetcher>,
    sink: Option<Arc<dyn BatchSink>>,
    handle: WorkerHandle,
}

impl InstitutionWorker {
    /// Create a worker and its fetchers
    ///
    /// # Errors
    ///
    /// Fails on an unknown timezone, a malformed feed URL or if the HTTP
    /// client cannot be built
    pub fn new(config: InstitutionConfig, settings: WorkerConfig) -> Result<Self> {
        let timezone = config.tz().map_err(|e| Error::config(format!("{e:#}")))?;
        let options = ParseOptions {
            locale: config.locale,
            timezone,
            relaxed_class_names: false,
        };

        let student = PlanFetcher::new(&config.student, FeedRole::Student, &settings, options)?;
        let teacher = config
            .teacher
            .as_ref()
            .map(|feed| {
                let options = ParseOptions {
                    relaxed_class_names: true,
                    ..options
                };
                PlanFetcher::new(feed, FeedRole::Teacher, &settings, options)
            })
            .transpose()?;

        let sink = settings
            .export_dir
            .as_ref()
            .map(|dir| Arc::new(JsonDirectorySink::new(dir)) as Arc<dyn BatchSink>);

        let handle = WorkerHandle::new(&config.id, &config.title);

        Ok(Self {
            config,
            settings,
            timezone,
            student,
            teacher,
            sink,
            handle,
        })
    }

    /// Forward freshly fetched days to `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn BatchSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// First day of the window in the institution's timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// Run one cycle starting at `first` and publish the result
    ///
    /// # Errors
    ///
    /// Any fetch, merge or compile failure. The published snapshot is left
    /// untouched in that case.
    pub async fn run_cycle_from(
        &self,
        first: NaiveDate,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Arc<Snapshot>> {
        let days = self.settings.window_days;
        let teacher_window = async {
            match &self.teacher {
                Some(fetcher) => fetcher.fetch_window(first, days, cancel).await.map(Some),
                None => Ok(None),
            }
        };
        let (student_window, teacher_window) = tokio::try_join!(
            self.student.fetch_window(first, days, cancel),
            teacher_window
        )?;

        let merge_options = MergeOptions {
            keep_course_teachers: true,
        };
        let student = merge_day_schedules(&student_window.schedules, merge_options)?;
        let teacher = teacher_window
            .as_ref()
            .map(|window| merge_day_schedules(&window.schedules, merge_options))
            .transpose()?;

        let content = build_servable_content(
            self.config.legacy,
            TenantSource {
                schedule: &student,
                password: self.config.student.requested_password.as_deref(),
                with_courses: self.config.student.with_courses(FeedRole::Student),
            },
            self.config
                .teacher
                .as_ref()
                .zip(teacher.as_ref())
                .map(|(feed, schedule)| TenantSource {
                    schedule,
                    password: feed.requested_password.as_deref(),
                    with_courses: feed.with_courses(FeedRole::Teacher),
                }),
        )?;

        let snapshot = Arc::new(Snapshot {
            institution: self.config.id.clone(),
            published_at: Utc::now(),
            student,
            teacher,
            content,
        });
        self.handle.publish(Arc::clone(&snapshot));

        tracing::info!(
            institution = %self.config.id,
            days = snapshot.student.days.len(),
            classes = snapshot.student.classes.len(),
            fallback = student_window.used_fallback,
            "snapshot published"
        );

        self.export(&student_window).await;
        if let Some(window) = &teacher_window {
            self.export(window).await;
        }

        Ok(snapshot)
    }

    /// Run one cycle for today's window
    ///
    /// # Errors
    ///
    /// See [`Self::run_cycle_from`]
    pub async fn run_cycle(&self, cancel: &watch::Receiver<bool>) -> Result<Arc<Snapshot>> {
        self.run_cycle_from(self.today(), cancel).await
    }

    async fn export(&self, window: &WindowFetch) {
        let Some(sink) = &self.sink else {
            return;
        };

        for schedule in &window.schedules {
            if !window.fresh_dates.contains(&schedule.date) {
                continue;
            }

            let batch = normalize(schedule);
            if let Err(e) = sink.upsert(&self.config.id, &batch).await {
                tracing::warn!(
                    institution = %self.config.id,
                    date = %schedule.date,
                    category = %e.category(),
                    "batch export failed: {e}"
                );
            }
        }
    }

    /// Run one cycle and record its outcome
    async fn tick(&self, cancel: &watch::Receiver<bool>) {
        tracing::info!(institution = %self.config.id, "cycle started");

        match self.run_cycle(cancel).await {
            Ok(_) => self.handle.set_status(CycleStatus::Ok { at: Utc::now() }),
            Err(Error::Fetch(FetchError::Cancelled)) => {
                tracing::info!(institution = %self.config.id, "cycle cancelled");
            }
            Err(e) => {
                tracing::error!(
                    institution = %self.config.id,
                    category = %e.category(),
                    recoverable = e.is_recoverable(),
                    "cycle failed: {e}"
                );
                self.handle.set_status(CycleStatus::Failed {
                    at: Utc::now(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn startup_jitter(&self) -> Duration {
        let max_ms = self.settings.startup_jitter_secs.saturating_mul(1000);
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Poll until `shutdown` turns true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.settings.interval_secs);
        let jitter = self.startup_jitter();

        tracing::info!(
            institution = %self.config.id,
            jitter_ms = jitter.as_millis() as u64,
            "worker starting"
        );

        if sleep_or_shutdown(jitter, &mut shutdown).await {
            loop {
                self.tick(&shutdown).await;
                if !sleep_or_shutdown(interval, &mut shutdown).await {
                    break;
                }
            }
        }

        tracing::info!(institution = %self.config.id, "worker stopped");
    }
}

/// Sleep for `duration`; false if shutdown was requested first
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.wait_for(|stop| *stop) => false,
    }
}

/// All running workers of the process
pub struct WorkerRegistry {
    handles: Vec<WorkerHandle>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerRegistry {
    /// Build one worker per configured institution and spawn them
    ///
    /// # Errors
    ///
    /// Fails if any worker cannot be created; nothing is spawned then
    pub fn start(config: &Config) -> Result<Self> {
        let workers = config
            .institutions
            .iter()
            .map(|institution| InstitutionWorker::new(institution.clone(), config.worker.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::spawn(workers))
    }

    /// Spawn already constructed workers
    pub fn spawn(workers: Vec<InstitutionWorker>) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handles = workers.iter().map(InstitutionWorker::handle).collect();
        let tasks = workers
            .into_iter()
            .map(|worker| tokio::spawn(worker.run(shutdown_rx.clone())))
            .collect();

        Self {
            handles,
            tasks,
            shutdown,
        }
    }

    pub fn handles(&self) -> &[WorkerHandle] {
        &self.handles
    }

    pub fn get(&self, id: &str) -> Option<&WorkerHandle> {
        self.handles.iter().find(|handle| handle.id() == id)
    }

    /// `(id, title)` of every institution
    pub fn institutions(&self) -> Vec<(String, String)> {
        self.handles
            .iter()
            .map(|handle| (handle.id.clone(), handle.title.clone()))
            .collect()
    }

    /// Health summary
    ///
    /// `OK` when every worker is running and its last cycle did not fail,
    /// otherwise one `issues at <id>` line per affected institution.
    pub fn status_report(&self) -> String {
        status_report(
            self.handles
                .iter()
                .zip(&self.tasks)
                .map(|(handle, task)| (handle, task.is_finished())),
        )
    }

    /// Stop all workers and wait for them
    ///
    /// # Errors
    ///
    /// Returns an error if a worker task panicked
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.wait().await
    }

    /// Wait until every worker has stopped
    ///
    /// # Errors
    ///
    /// Returns an error if a worker task panicked
    pub async fn wait(self) -> Result<()> {
        for (handle, task) in self.handles.iter().zip(self.tasks) {
            task.await.map_err(|e| {
                Error::with_source(format!("worker {} terminated abnormally", handle.id), e)
            })?;
        }
        Ok(())
    }
}

fn status_report<'a>(workers: impl ExactSizeIterator<Item = (&'a WorkerHandle, bool)>) -> String {
    if workers.len() == 0 {
        return String::from("no institutions configured");
    }

    let issues: Vec<String> = workers
        .filter(|(handle, finished)| *finished || handle.status().is_failed())
        .map(|(handle, _)| format!("issues at {}", handle.id))
        .collect();

    if issues.is_empty() {
        String::from("OK")
    } else {
        issues.join("\n")
    }
}
