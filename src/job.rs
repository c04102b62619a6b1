//! Job state for one book compilation.
//!
//! The job record is a plain value: [`run_job`] takes it in, reports every
//! change through [`CompilationProgressCallback::on_job_transition`], and
//! hands the final state back. Persisting it is the caller's business.
//!
//! ```text
//!  Pending ──start──▶ Generating ──complete──▶ Complete
//!     ▲                   │
//!     │                   └──fail / expire──▶ Failed ──start──▶ Generating
//! ```
//!
//! A process that dies mid-compilation leaves its record in `Generating`.
//! [`JobState::expire_if_stale`] turns such a record into `Failed` once it
//! has not moved for `stale_after`, which lets a sweeper restart it.
//!
//! [`CompilationProgressCallback::on_job_transition`]:
//!     crate::progress::CompilationProgressCallback::on_job_transition

use crate::compile::compile_with;
use crate::config::CompilationConfig;
use crate::error::{ServiceError, StorybookError};
use crate::services::images::resolve_image_generator;
use crate::services::llm::resolve_text_generator;
use crate::services::{ChapterSource, ImageGenerator, Publication, PublicationSink, TextGenerator};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// Reason recorded on a job expired by the staleness policy.
pub const STALE_REASON: &str = "stale: no progress before the staleness timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Generating,
    Complete,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Pending => "pending",
            JobStatus::Generating => "generating",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        })
    }
}

/// The status record of one compilation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub book_id: String,
    pub status: JobStatus,
    pub updated_at: DateTime<Utc>,
    /// Why the job failed; set only in `Failed`.
    pub error: Option<String>,
    /// Where the finished book went; set only in `Complete`.
    pub publication: Option<Publication>,
}

impl JobState {
    /// A fresh `Pending` job.
    pub fn new(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            status: JobStatus::Pending,
            updated_at: Utc::now(),
            error: None,
            publication: None,
        }
    }

    fn transition(self, to: JobStatus) -> Result<Self, StorybookError> {
        use JobStatus::*;
        let allowed = matches!(
            (self.status, to),
            (Pending | Failed, Generating) | (Generating, Complete) | (Pending | Generating, Failed)
        );
        if !allowed {
            return Err(StorybookError::InvalidTransition {
                book_id: self.book_id,
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Self {
            status: to,
            updated_at: Utc::now(),
            ..self
        })
    }

    /// `Pending` or `Failed` → `Generating`. Clears any previous outcome.
    pub fn start(self) -> Result<Self, StorybookError> {
        let mut job = self.transition(JobStatus::Generating)?;
        job.error = None;
        job.publication = None;
        Ok(job)
    }

    /// `Generating` → `Complete`.
    pub fn complete(self, publication: Publication) -> Result<Self, StorybookError> {
        let mut job = self.transition(JobStatus::Complete)?;
        job.publication = Some(publication);
        Ok(job)
    }

    /// `Pending` or `Generating` → `Failed`.
    pub fn fail(self, reason: impl Into<String>) -> Result<Self, StorybookError> {
        let mut job = self.transition(JobStatus::Failed)?;
        job.error = Some(reason.into());
        Ok(job)
    }

    /// `true` for a `Generating` job that has not moved for `stale_after`.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.status == JobStatus::Generating && now - self.updated_at > stale_after
    }

    /// Fail the job if it is stale; otherwise return it unchanged.
    pub fn expire_if_stale(self, now: DateTime<Utc>, stale_after: Duration) -> Self {
        if !self.is_stale(now, stale_after) {
            return self;
        }
        warn!(
            "Job for book {:?} stuck in generating since {}; marking failed",
            self.book_id, self.updated_at
        );
        Self {
            status: JobStatus::Failed,
            updated_at: now,
            error: Some(STALE_REASON.to_string()),
            publication: None,
            ..self
        }
    }
}

/// The staleness timeout configured in `config`.
pub fn stale_after(config: &CompilationConfig) -> Duration {
    let max_secs = (i64::MAX / 1000) as u64;
    Duration::seconds(config.stale_after_secs.min(max_secs) as i64)
}

/// Expire a stuck `Generating` record so it can be started again.
fn recover_stale(config: &CompilationConfig, job: JobState) -> JobState {
    let now = Utc::now();
    if !job.is_stale(now, stale_after(config)) {
        return job;
    }
    let expired = job.expire_if_stale(now, stale_after(config));
    if let Some(cb) = config.progress() {
        cb.on_job_transition(&expired);
    }
    expired
}

/// Run a job with the text and image services configured in `config`.
///
/// Never returns an error: every fatal problem ends in a `Failed` job. A
/// record stuck in `Generating` past the staleness timeout is expired and
/// restarted; a fresh `Generating` or a `Complete` record is returned as is.
pub async fn run_job(
    job: JobState,
    source: &dyn ChapterSource,
    sink: &dyn PublicationSink,
    config: &CompilationConfig,
) -> JobState {
    let services = resolve_text_generator(config)
        .and_then(|text| resolve_image_generator(config).map(|images| (text, images)));
    match services {
        Ok((text, images)) => {
            run_job_with(job, source, sink, text.as_ref(), images.as_ref(), config).await
        }
        Err(e) => {
            let job = recover_stale(config, job);
            let job = announce_or(config, job.clone().start(), job);
            if job.status != JobStatus::Generating {
                return job;
            }
            finish_failed(config, job, &e)
        }
    }
}

/// Run a job with explicit services: start, load, compile, publish.
pub async fn run_job_with(
    job: JobState,
    source: &dyn ChapterSource,
    sink: &dyn PublicationSink,
    text: &dyn TextGenerator,
    images: &dyn ImageGenerator,
    config: &CompilationConfig,
) -> JobState {
    let book_id = job.book_id.clone();
    let job = recover_stale(config, job);
    let job = announce_or(config, job.clone().start(), job);
    if job.status != JobStatus::Generating {
        return job;
    }
    info!("Job started for book {:?}", book_id);

    match compile_and_publish(&book_id, source, sink, text, images, config).await {
        Ok(publication) => {
            info!("Book {:?} published at {}", book_id, publication.location);
            let completed = job.clone().complete(publication);
            announce_or(config, completed, job)
        }
        Err(e) => finish_failed(config, job, &e),
    }
}

async fn compile_and_publish(
    book_id: &str,
    source: &dyn ChapterSource,
    sink: &dyn PublicationSink,
    text: &dyn TextGenerator,
    images: &dyn ImageGenerator,
    config: &CompilationConfig,
) -> Result<Publication, StorybookError> {
    let manifest = source.load_book(book_id).await.map_err(|e| match e {
        ServiceError::NotFound(_) => StorybookError::BookNotFound {
            book_id: book_id.to_string(),
        },
        other => StorybookError::Source {
            book_id: book_id.to_string(),
            source: other,
        },
    })?;

    let output = compile_with(&manifest, text, images, config).await?;

    sink.publish(&manifest, &output.book)
        .await
        .map_err(|e| StorybookError::Publication {
            book_id: book_id.to_string(),
            source: e,
        })
}

fn finish_failed(config: &CompilationConfig, job: JobState, err: &StorybookError) -> JobState {
    error!("Job for book {:?} failed: {}", job.book_id, err);
    let failed = job.clone().fail(err.to_string());
    announce_or(config, failed, job)
}

/// Report a successful transition; on an illegal one, log and keep `fallback`.
fn announce_or(
    config: &CompilationConfig,
    next: Result<JobState, StorybookError>,
    fallback: JobState,
) -> JobState {
    match next {
        Ok(job) => {
            if let Some(cb) = config.progress() {
                cb.on_job_transition(&job);
            }
            job
        }
        Err(e) => {
            warn!("{}", e);
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication() -> Publication {
        Publication {
            location: "file:///tmp/b.pdf".into(),
            expires_at: None,
        }
    }

    #[test]
    fn happy_path_transitions() {
        let job = JobState::new("b").start().unwrap();
        assert_eq!(job.status, JobStatus::Generating);
        let job = job.complete(publication()).unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.publication, Some(publication()));
    }

    #[test]
    fn failed_job_can_restart_from_scratch() {
        let job = JobState::new("b").start().unwrap().fail("boom").unwrap();
        assert_eq!(job.error.as_deref(), Some("boom"));
        let restarted = job.start().unwrap();
        assert_eq!(restarted.status, JobStatus::Generating);
        assert!(restarted.error.is_none());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let done = JobState::new("b")
            .start()
            .unwrap()
            .complete(publication())
            .unwrap();
        let err = done.clone().start().unwrap_err();
        assert!(matches!(
            err,
            StorybookError::InvalidTransition { ref from, ref to, .. }
                if from == "complete" && to == "generating"
        ));
        assert!(done.fail("late").is_err());
        assert!(JobState::new("b").complete(publication()).is_err());
    }

    #[test]
    fn staleness_only_applies_to_generating_jobs() {
        let job = JobState::new("b").start().unwrap();
        let later = job.updated_at + Duration::seconds(1801);
        let limit = Duration::seconds(1800);

        assert!(!job.is_stale(job.updated_at + Duration::seconds(60), limit));
        assert!(job.is_stale(later, limit));
        assert!(!JobState::new("b").is_stale(later, limit));

        let expired = job.expire_if_stale(later, limit);
        assert_eq!(expired.status, JobStatus::Failed);
        assert_eq!(expired.error.as_deref(), Some(STALE_REASON));
        assert_eq!(expired.updated_at, later);
        assert_eq!(expired.start().unwrap().status, JobStatus::Generating);
    }

    #[test]
    fn fresh_job_is_left_alone() {
        let job = JobState::new("b").start().unwrap();
        let same = job.clone().expire_if_stale(job.updated_at, Duration::seconds(1800));
        assert_eq!(same, job);
    }
}
