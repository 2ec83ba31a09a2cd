// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job orchestration.
//
// A bounded set of workers drains a two-tier priority queue. Scan jobs yield
// photo jobs, which are queued ahead of the remaining scans so a scan's
// photos are finished before more scans pile up in memory.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, instrument};

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::taxonomy::{failure_scope, is_fatal};
use scanwerk_core::types::JobId;
use scanwerk_faces::FaceDetectionService;

use crate::decompose::ScanDecomposer;
use crate::metadata::PhotoMetadataStage;

/// Queue tier. `High` jobs always start before `Normal` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
}

/// What a job works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Scan(PathBuf),
    Photo(PathBuf),
}

impl JobKind {
    /// Stage label used in log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Scan(_) => "decompose",
            Self::Photo(_) => "describe",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Scan(path) | Self::Photo(path) => path,
        }
    }
}

/// A unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub priority: Priority,
    pub kind: JobKind,
}

impl Job {
    pub fn scan(path: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            priority: Priority::Normal,
            kind: JobKind::Scan(path.into()),
        }
    }

    pub fn photo(path: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            priority: Priority::High,
            kind: JobKind::Photo(path.into()),
        }
    }
}

/// Executes jobs. Returned jobs are queued as follow-up work.
pub trait JobHandler: Send + Sync + 'static {
    fn handle(&self, job: &Job) -> impl Future<Output = Result<Vec<Job>>> + Send;
}

/// Totals of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub completed: usize,
    pub failed: usize,
    /// Scan jobs completed.
    pub scans: usize,
    /// Photo jobs completed.
    pub photos: usize,
}

#[derive(Default)]
struct JobQueue {
    high: VecDeque<Job>,
    normal: VecDeque<Job>,
}

impl JobQueue {
    fn push(&mut self, job: Job) {
        match job.priority {
            Priority::High => self.high.push_back(job),
            Priority::Normal => self.normal.push_back(job),
        }
    }

    fn pop(&mut self) -> Option<Job> {
        self.high.pop_front().or_else(|| self.normal.pop_front())
    }
}

/// Runs jobs with bounded concurrency until the queue drains.
pub struct JobOrchestrator<H> {
    handler: Arc<H>,
    concurrency: usize,
}

impl<H: JobHandler> JobOrchestrator<H> {
    pub fn new(handler: Arc<H>, concurrency: usize) -> Self {
        Self {
            handler,
            concurrency: concurrency.max(1),
        }
    }

    /// Run `jobs` and everything they spawn. Failed jobs are logged and
    /// counted; a fatal error or a panicking worker stops the run.
    #[instrument(skip_all, fields(jobs = jobs.len(), concurrency = self.concurrency))]
    pub async fn run(&self, jobs: Vec<Job>) -> Result<RunReport> {
        let mut queue = JobQueue::default();
        for job in jobs {
            queue.push(job);
        }

        let mut running = JoinSet::new();
        let mut report = RunReport::default();

        loop {
            while running.len() < self.concurrency {
                let Some(job) = queue.pop() else {
                    break;
                };
                let handler = self.handler.clone();
                running.spawn(async move {
                    let result = handler.handle(&job).await;
                    (job, result)
                });
            }

            let Some(joined) = running.join_next().await else {
                break;
            };

            let (job, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    running.abort_all();
                    return Err(ScanwerkError::TaskJoin(format!("worker: {e}")));
                }
            };

            match result {
                Ok(children) => {
                    report.completed += 1;
                    match job.kind {
                        JobKind::Scan(_) => report.scans += 1,
                        JobKind::Photo(_) => report.photos += 1,
                    }
                    for child in children {
                        queue.push(child);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        job_id = %job.id,
                        stage = job.kind.stage(),
                        path = %job.kind.path().display(),
                        scope = failure_scope(&e).label(),
                        error = %e,
                        "job failed"
                    );
                    if is_fatal(&e) {
                        running.abort_all();
                        return Err(e);
                    }
                }
            }
        }

        info!(
            completed = report.completed,
            failed = report.failed,
            scans = report.scans,
            photos = report.photos,
            "run finished"
        );
        Ok(report)
    }
}

// -- Pipeline wiring ----------------------------------------------------------

/// Which stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Decompose scans, then describe every photo they produce.
    All,
    /// Decompose scans only.
    Scans,
    /// Describe the given photo files.
    Photos,
}

impl RunMode {
    /// Initial jobs for `inputs`.
    pub fn initial_jobs(&self, inputs: impl IntoIterator<Item = PathBuf>) -> Vec<Job> {
        inputs
            .into_iter()
            .map(|path| match self {
                Self::All | Self::Scans => Job::scan(path),
                Self::Photos => Job::photo(path),
            })
            .collect()
    }
}

/// Routes jobs to the decomposer and the metadata stage.
pub struct PipelineHandler<S> {
    decomposer: ScanDecomposer,
    metadata: PhotoMetadataStage<S>,
    mode: RunMode,
}

impl<S> PipelineHandler<S> {
    pub fn new(decomposer: ScanDecomposer, metadata: PhotoMetadataStage<S>, mode: RunMode) -> Self {
        Self {
            decomposer,
            metadata,
            mode,
        }
    }
}

impl<S: FaceDetectionService + 'static> JobHandler for PipelineHandler<S> {
    async fn handle(&self, job: &Job) -> Result<Vec<Job>> {
        match &job.kind {
            JobKind::Scan(path) => {
                let outcome = self.decomposer.decompose(path).await?;
                if self.mode != RunMode::All {
                    return Ok(Vec::new());
                }
                Ok(outcome
                    .photos
                    .into_iter()
                    .map(|photo| Job::photo(photo.path))
                    .collect())
            }
            JobKind::Photo(path) => {
                self.metadata.process(path).await?;
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records the order jobs start in; every scan yields two photos.
    #[derive(Default)]
    struct Recorder {
        started: Mutex<Vec<String>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Recorder {
        fn started(&self) -> Vec<String> {
            self.started.lock().expect("lock").clone()
        }
    }

    impl JobHandler for Recorder {
        async fn handle(&self, job: &Job) -> Result<Vec<Job>> {
            let name = job.kind.path().display().to_string();
            self.started.lock().expect("lock").push(name.clone());

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            match (&job.kind, name.as_str()) {
                (_, "boom") => panic!("worker blew up"),
                (_, "bad") => Err(ScanwerkError::RefinementFailed { index: 0 }),
                (_, "db") => Err(ScanwerkError::Database("disk I/O error".into())),
                (JobKind::Scan(_), _) => Ok(vec![
                    Job::photo(format!("{name}/1")),
                    Job::photo(format!("{name}/2")),
                ]),
                (JobKind::Photo(_), _) => Ok(Vec::new()),
            }
        }
    }

    #[tokio::test]
    async fn photos_run_before_next_scan() {
        let recorder = Arc::new(Recorder::default());
        let orchestrator = JobOrchestrator::new(recorder.clone(), 1);

        let report = orchestrator
            .run(vec![Job::scan("a"), Job::scan("b")])
            .await
            .expect("run");

        assert_eq!(recorder.started(), vec!["a", "a/1", "a/2", "b", "b/1", "b/2"]);
        assert_eq!(
            report,
            RunReport {
                completed: 6,
                failed: 0,
                scans: 2,
                photos: 4
            }
        );
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let recorder = Arc::new(Recorder::default());
        let orchestrator = JobOrchestrator::new(recorder.clone(), 3);
        let jobs = (0..6).map(|i| Job::scan(format!("s{i}"))).collect();

        let report = orchestrator.run(jobs).await.expect("run");
        assert_eq!(report.completed, 18);
        assert!(recorder.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn failures_do_not_cancel_siblings() {
        let recorder = Arc::new(Recorder::default());
        let orchestrator = JobOrchestrator::new(recorder.clone(), 2);

        let report = orchestrator
            .run(vec![Job::scan("a"), Job::photo("bad"), Job::scan("c")])
            .await
            .expect("run");
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 6);
    }

    #[tokio::test]
    async fn fatal_error_stops_the_run() {
        let orchestrator = JobOrchestrator::new(Arc::new(Recorder::default()), 1);
        let err = orchestrator
            .run(vec![Job::scan("db"), Job::scan("later")])
            .await
            .expect_err("must stop");
        assert!(matches!(err, ScanwerkError::Database(_)));
    }

    #[tokio::test]
    async fn panicking_worker_aborts_the_run() {
        let orchestrator = JobOrchestrator::new(Arc::new(Recorder::default()), 2);
        let err = orchestrator
            .run(vec![Job::scan("boom"), Job::scan("a")])
            .await
            .expect_err("must abort");
        assert!(matches!(err, ScanwerkError::TaskJoin(_)));
    }

    #[test]
    fn photos_mode_starts_with_photo_jobs() {
        let jobs = RunMode::Photos.initial_jobs(vec![PathBuf::from("p.png")]);
        assert_eq!(jobs[0].priority, Priority::High);
        assert!(matches!(jobs[0].kind, JobKind::Photo(_)));

        let jobs = RunMode::All.initial_jobs(vec![PathBuf::from("s.tif")]);
        assert_eq!(jobs[0].priority, Priority::Normal);
    }
}
