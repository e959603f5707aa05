//! HTTP fetcher for dated plan files
//!
//! This module fetches the plan files of one feed with features including:
//! - Basic authentication
//! - Conditional requests (`If-None-Match` / `If-Modified-Since`) backed by a
//!   per-URL cache of the last parsed schedule
//! - Optional HEAD probe to detect missing dates cheaply
//! - Charset detection for the response body
//! - Cancellation through a shutdown channel

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED},
    Client, Method,
};
use tokio::sync::watch;

use crate::config::{FeedConfig, FeedRole, WorkerConfig};
use crate::models::DaySchedule;
use crate::parser::{parse_plan_file, ParseOptions};
use crate::utils::decode_body;
use crate::utils::error::FetchError;

/// Result of fetching one date
#[derive(Debug, Clone)]
pub enum DateOutcome {
    /// The body was downloaded and parsed in this call
    Fetched(DaySchedule),
    /// The server confirmed the cached copy is current
    Unchanged(DaySchedule),
    /// No plan exists for this date
    Skipped { status: u16 },
}

/// Schedules gathered for one window
#[derive(Debug, Clone, Default)]
pub struct WindowFetch {
    pub schedules: Vec<DaySchedule>,
    /// Dates downloaded in this cycle, as opposed to served from cache
    pub fresh_dates: Vec<NaiveDate>,
    pub used_fallback: bool,
}

#[derive(Debug, Clone)]
struct CachedPlan {
    etag: Option<String>,
    last_modified: Option<String>,
    schedule: DaySchedule,
}

impl CachedPlan {
    /// Whether a 304 carrying `last_modified` can no longer be trusted
    fn is_stale(&self, last_modified: Option<&str>, stale_after: chrono::Duration) -> bool {
        let Some(current) = last_modified.and_then(parse_http_date) else {
            return false;
        };
        let Some(previous) = self.last_modified.as_deref().and_then(parse_http_date) else {
            return true;
        };

        (current - previous).abs() >= stale_after
    }
}

/// Status and body of one request
#[derive(Debug)]
struct RawResponse {
    status: u16,
    etag: Option<String>,
    last_modified: Option<String>,
    body: Option<String>,
}

/// Fetcher for the plan files of one feed
///
/// One instance belongs to one worker; the conditional request cache lives
/// as long as the fetcher.
pub struct PlanFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Data directory, ending in `/`
    base_url: String,

    username: String,
    password: String,

    /// File name prefix of dated plans, e.g. `PlanKl`
    plan_prefix: String,

    /// Whole-roster file, e.g. `Klassen.xml`
    fallback_file: String,

    parse_options: ParseOptions,

    probe_with_head: bool,

    stale_after: chrono::Duration,

    cache: Mutex<HashMap<String, CachedPlan>>,
}

impl PlanFetcher {
    /// Create a fetcher for one feed
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` for a malformed base URL and
    /// `FetchError::Http` if the HTTP client cannot be created
    pub fn new(
        feed: &FeedConfig,
        role: FeedRole,
        worker: &WorkerConfig,
        parse_options: ParseOptions,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(worker.request_timeout())
            .user_agent(&worker.user_agent)
            .gzip(true)
            .build()?;

        Self::with_client(client, feed, role, worker, parse_options)
    }

    /// Create a fetcher reusing an existing client
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` for a malformed base URL
    pub fn with_client(
        client: Client,
        feed: &FeedConfig,
        role: FeedRole,
        worker: &WorkerConfig,
        parse_options: ParseOptions,
    ) -> Result<Self, FetchError> {
        url::Url::parse(&feed.url).map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", feed.url)))?;

        let base_url = if feed.url.ends_with('/') {
            feed.url.clone()
        } else {
            format!("{}/", feed.url)
        };

        let stale_after = i64::try_from(worker.stale_after_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX);

        Ok(Self {
            client,
            base_url,
            username: feed.username.clone(),
            password: feed.password.clone(),
            plan_prefix: feed.plan_prefix(role).to_string(),
            fallback_file: feed.fallback_file(role).to_string(),
            parse_options,
            probe_with_head: worker.probe_with_head,
            stale_after,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Number of plans held for conditional requests
    pub fn cached_plans(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// URL of the plan file for `date`
    pub fn plan_url(&self, date: NaiveDate) -> String {
        format!("{}{}{}.xml", self.base_url, self.plan_prefix, date.format("%Y%m%d"))
    }

    /// URL of the whole-roster fallback file
    pub fn fallback_url(&self) -> String {
        format!("{}{}", self.base_url, self.fallback_file)
    }

    /// Fetch `days` consecutive dates starting at `first`, falling back to the
    /// roster file if none of them has a plan
    ///
    /// All dates are requested concurrently and awaited together; the first
    /// error in date order fails the whole window.
    ///
    /// # Errors
    ///
    /// Any fatal per-date error, or `FetchError::NoDataAvailable` if the
    /// window is empty and the fallback file is missing
    pub async fn fetch_window(
        &self,
        first: NaiveDate,
        days: u32,
        cancel: &watch::Receiver<bool>,
    ) -> Result<WindowFetch, FetchError> {
        let dates: Vec<NaiveDate> = first.iter_days().take(days as usize).collect();
        let results = join_all(dates.iter().map(|date| self.fetch_date(*date, cancel))).await;

        let window_urls: HashSet<String> = dates.iter().map(|date| self.plan_url(*date)).collect();
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|url, _| window_urls.contains(url));

        let mut window = WindowFetch::default();
        for (date, result) in dates.into_iter().zip(results) {
            match result? {
                DateOutcome::Fetched(schedule) => {
                    tracing::debug!(date = %date, "fetched plan");
                    window.fresh_dates.push(date);
                    window.schedules.push(schedule);
                }
                DateOutcome::Unchanged(schedule) => {
                    tracing::debug!(date = %date, "plan unchanged");
                    window.schedules.push(schedule);
                }
                DateOutcome::Skipped { status } => {
                    tracing::debug!(date = %date, status, "no plan for date");
                }
            }
        }

        if window.schedules.is_empty() {
            tracing::info!(url = %self.fallback_url(), "no dated plans, using fallback");
            let schedule = self.fetch_fallback(cancel).await?;
            window.fresh_dates.push(schedule.date);
            window.schedules.push(schedule);
            window.used_fallback = true;
        }

        Ok(window)
    }

    /// Fetch and parse the plan for a single date
    ///
    /// # Errors
    ///
    /// Returns `FetchError::UnexpectedHttpStatus` for unrecognized statuses,
    /// `FetchError::DateMismatch` if the file declares another date, and
    /// `FetchError::Parse` for invalid content
    pub async fn fetch_date(
        &self,
        date: NaiveDate,
        cancel: &watch::Receiver<bool>,
    ) -> Result<DateOutcome, FetchError> {
        let url = self.plan_url(date);

        if self.probe_with_head {
            let probe = cancellable(cancel, self.request(Method::HEAD, &url, None)).await?;
            if is_skip_status(probe.status) {
                return Ok(DateOutcome::Skipped {
                    status: probe.status,
                });
            }
        }

        let cached = self.cached(&url);
        let response = cancellable(cancel, self.request(Method::GET, &url, cached.as_ref())).await?;

        if response.status == 304 {
            if let Some(entry) = cached {
                if !entry.is_stale(response.last_modified.as_deref(), self.stale_after) {
                    return Ok(DateOutcome::Unchanged(entry.schedule));
                }
            }

            tracing::debug!(url = %url, "not-modified signal is stale, refetching");
            let response = cancellable(cancel, self.request(Method::GET, &url, None)).await?;
            return self.accept(date, &url, response);
        }

        self.accept(date, &url, response)
    }

    /// Fetch the whole-roster fallback file
    ///
    /// # Errors
    ///
    /// Returns `FetchError::NoDataAvailable` if the file is missing
    pub async fn fetch_fallback(
        &self,
        cancel: &watch::Receiver<bool>,
    ) -> Result<DaySchedule, FetchError> {
        let url = self.fallback_url();
        let response = cancellable(cancel, self.request(Method::GET, &url, None)).await?;

        match response.status {
            300 | 404 => Err(FetchError::NoDataAvailable { url }),
            200 => self.parse(&url, response.body.as_deref().unwrap_or_default()),
            status => Err(FetchError::UnexpectedHttpStatus { url, status }),
        }
    }

    fn accept(
        &self,
        date: NaiveDate,
        url: &str,
        response: RawResponse,
    ) -> Result<DateOutcome, FetchError> {
        match response.status {
            status if is_skip_status(status) => Ok(DateOutcome::Skipped { status }),
            200 => {
                let schedule = self.parse(url, response.body.as_deref().unwrap_or_default())?;
                if schedule.date != date {
                    return Err(FetchError::DateMismatch {
                        requested: date,
                        actual: schedule.date,
                    });
                }

                self.store(
                    url,
                    CachedPlan {
                        etag: response.etag,
                        last_modified: response.last_modified,
                        schedule: schedule.clone(),
                    },
                );
                Ok(DateOutcome::Fetched(schedule))
            }
            status => Err(FetchError::UnexpectedHttpStatus {
                url: url.to_string(),
                status,
            }),
        }
    }

    fn parse(&self, url: &str, body: &str) -> Result<DaySchedule, FetchError> {
        parse_plan_file(body, &self.parse_options).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })
    }

    /// Send one request and read the body of successful responses
    async fn request(
        &self,
        method: Method,
        url: &str,
        cached: Option<&CachedPlan>,
    ) -> Result<RawResponse, FetchError> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .basic_auth(&self.username, Some(&self.password));

        if let Some(entry) = cached {
            if let Some(etag) = &entry.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &entry.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers();
        let etag = header_string(headers, ETAG.as_str());
        let last_modified = header_string(headers, LAST_MODIFIED.as_str());
        let content_type = header_string(headers, CONTENT_TYPE.as_str()).unwrap_or_default();

        let body = if status == 200 && method != Method::HEAD {
            let bytes = response.bytes().await.map_err(map_reqwest_error)?;
            Some(decode_body(&bytes, &content_type)?)
        } else {
            None
        };

        Ok(RawResponse {
            status,
            etag,
            last_modified,
            body,
        })
    }

    fn cached(&self, url: &str) -> Option<CachedPlan> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    fn store(&self, url: &str, entry: CachedPlan) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), entry);
    }
}

/// Statuses meaning "no plan for this date"
fn is_skip_status(status: u16) -> bool {
    matches!(status, 300 | 404 | 503)
}

fn map_reqwest_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(error)
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Run `future` unless the shutdown flag is raised first
async fn cancellable<T>(
    cancel: &watch::Receiver<bool>,
    future: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    let mut cancel = cancel.clone();
    if *cancel.borrow() {
        return Err(FetchError::Cancelled);
    }

    tokio::select! {
        result = future => result,
        _ = async {
            // a dropped sender never cancels
            if cancel.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        } => Err(FetchError::Cancelled),
    }
}
