//! Sequential batch submission to an extraction service.
//!
//! A batch moves `Idle -> Submitting -> Ready | Failed`. Files are submitted
//! one at a time; the first failure aborts the batch and discards whatever
//! was already extracted. Selecting new files bumps the batch generation: the
//! in-flight submission of the older batch is dropped and nothing it produces
//! is ever merged into the newer batch.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use ocr_etl::core::batch::{BatchOrchestrator, BatchRun, BatchSettings};
//! use ocr_etl::core::{ExtractionClient, Extraction, FileHandle};
//! use ocr_etl::Result;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ExtractionClient for Echo {
//!     async fn submit(&self, _file: &FileHandle) -> Result<Extraction> {
//!         Ok(Extraction::default())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let orchestrator = BatchOrchestrator::new(Echo, BatchSettings::default());
//! orchestrator
//!     .select_files(vec![FileHandle::new("a.pdf", "/tmp/a.pdf")])
//!     .unwrap();
//!
//! match orchestrator.run().await.unwrap() {
//!     BatchRun::Completed { results, .. } => assert_eq!(results.len(), 1),
//!     BatchRun::Superseded { .. } => unreachable!(),
//! }
//! # });
//! ```

use crate::core::flatten::flatten;
use crate::domain::model::{BatchFailure, BatchResult, FileHandle, FlatRow};
use crate::domain::ports::{ConfigProvider, ExtractionClient};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Hard upper bound on files per batch.
pub const MAX_BATCH_FILES: usize = 10;
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub max_files: usize,
    pub allowed_extensions: Vec<String>,
    pub submit_timeout: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_files: MAX_BATCH_FILES,
            allowed_extensions: vec!["pdf".to_string()],
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

impl BatchSettings {
    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        Self {
            max_files: config.max_files().min(MAX_BATCH_FILES),
            allowed_extensions: config.allowed_extensions().to_vec(),
            submit_timeout: config.submit_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    Idle { selection: Vec<FileHandle> },
    Submitting { current: usize, total: usize, file_name: String },
    Ready { results: Vec<BatchResult> },
    Failed { failure: BatchFailure },
}

impl BatchState {
    pub fn label(&self) -> &'static str {
        match self {
            BatchState::Idle { .. } => "idle",
            BatchState::Submitting { .. } => "submitting",
            BatchState::Ready { .. } => "ready",
            BatchState::Failed { .. } => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, BatchState::Ready { .. })
    }

    /// Results are only exposed once the whole batch succeeded.
    pub fn results(&self) -> Option<&[BatchResult]> {
        match self {
            BatchState::Ready { results } => Some(results),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&BatchFailure> {
        match self {
            BatchState::Failed { failure } => Some(failure),
            _ => None,
        }
    }
}

/// How a call to [`BatchOrchestrator::run`] ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRun {
    Completed {
        generation: u64,
        results: Vec<BatchResult>,
    },
    /// A newer selection replaced this batch; its outcome was discarded.
    Superseded { generation: u64 },
}

#[derive(Debug)]
struct Session {
    selection: Vec<FileHandle>,
    state: BatchState,
}

pub struct BatchOrchestrator<C: ExtractionClient> {
    client: Arc<C>,
    settings: BatchSettings,
    session: Arc<Mutex<Session>>,
    generation: Arc<watch::Sender<u64>>,
}

impl<C: ExtractionClient> Clone for BatchOrchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            settings: self.settings.clone(),
            session: Arc::clone(&self.session),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<C: ExtractionClient> BatchOrchestrator<C> {
    pub fn new(client: C, settings: BatchSettings) -> Self {
        Self::with_shared_client(Arc::new(client), settings)
    }

    pub fn with_shared_client(client: Arc<C>, settings: BatchSettings) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            client,
            settings,
            session: Arc::new(Mutex::new(Session {
                selection: Vec::new(),
                state: BatchState::Idle {
                    selection: Vec::new(),
                },
            })),
            generation: Arc::new(generation),
        }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    pub fn state(&self) -> BatchState {
        self.session().state.clone()
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Message of the most recent batch failure, cleared by a new selection.
    pub fn last_error(&self) -> Option<String> {
        self.session().state.failure().map(|failure| {
            format!(
                "{} ({}/{}): {}",
                failure.file_name(),
                failure.position,
                failure.total,
                failure.reason()
            )
        })
    }

    /// Replaces the current selection and starts a new batch generation.
    ///
    /// Invalid selections are rejected without touching the current state.
    pub fn select_files(&self, files: Vec<FileHandle>) -> Result<u64> {
        self.validate_selection(&files)?;

        let mut session = self.session();
        if let BatchState::Submitting { current, total, .. } = &session.state {
            tracing::warn!(
                "🛑 New selection while file {}/{} was in flight; discarding that batch",
                current,
                total
            );
        }

        let mut generation = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        session.selection = files.clone();
        session.state = BatchState::Idle { selection: files };

        tracing::debug!(
            "Selected {} file(s) for batch {}",
            session.selection.len(),
            generation
        );
        Ok(generation)
    }

    /// Convenience for `select_files` followed by `run`.
    pub async fn run_batch(&self, files: Vec<FileHandle>) -> Result<BatchRun> {
        self.select_files(files)?;
        self.run().await
    }

    /// Submits the current selection, one file at a time.
    pub async fn run(&self) -> Result<BatchRun> {
        let (generation, files) = self.begin()?;
        let total = files.len();
        let mut watcher = self.generation.subscribe();
        let mut results = Vec::with_capacity(total);

        tracing::info!("🚀 Starting batch {} with {} file(s)", generation, total);

        for (index, file) in files.iter().enumerate() {
            if !self.advance(generation, index + 1, total, &file.name) {
                return Ok(self.superseded(generation));
            }
            tracing::info!("📤 Submitting {}/{}: {}", index + 1, total, file.name);

            let outcome = tokio::select! {
                outcome = self.submit_one(file) => outcome,
                _ = wait_for_newer(&mut watcher, generation) => {
                    return Ok(self.superseded(generation));
                }
            };

            match outcome {
                Ok(row) => {
                    tracing::debug!("Extracted {} field(s) from {}", row.len(), file.name);
                    results.push(BatchResult::extracted(file.name.clone(), row));
                }
                Err(reason) => {
                    let failure = BatchFailure {
                        position: index + 1,
                        total,
                        result: BatchResult::failed(file.name.clone(), reason),
                    };
                    return self.fail(generation, failure);
                }
            }
        }

        self.complete(generation, results)
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn validate_selection(&self, files: &[FileHandle]) -> Result<()> {
        if files.len() > self.settings.max_files {
            return Err(EtlError::ValidationError {
                message: format!(
                    "You can upload up to {} files per batch ({} selected)",
                    self.settings.max_files,
                    files.len()
                ),
            });
        }
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        validation::validate_upload_extensions(&names, &self.settings.allowed_extensions)
    }

    fn begin(&self) -> Result<(u64, Vec<FileHandle>)> {
        let mut session = self.session();
        if !matches!(session.state, BatchState::Idle { .. }) {
            return Err(EtlError::ValidationError {
                message: format!(
                    "Cannot start a batch while {}; select files first",
                    session.state.label()
                ),
            });
        }
        let files = session.selection.clone();
        let Some(first) = files.first() else {
            return Err(EtlError::ValidationError {
                message: "No files selected".to_string(),
            });
        };

        session.state = BatchState::Submitting {
            current: 1,
            total: files.len(),
            file_name: first.name.clone(),
        };
        Ok((*self.generation.borrow(), files))
    }

    fn advance(&self, generation: u64, current: usize, total: usize, file_name: &str) -> bool {
        let mut session = self.session();
        if *self.generation.borrow() != generation {
            return false;
        }
        session.state = BatchState::Submitting {
            current,
            total,
            file_name: file_name.to_string(),
        };
        true
    }

    async fn submit_one(&self, file: &FileHandle) -> std::result::Result<FlatRow, String> {
        let timeout = self.settings.submit_timeout;
        match tokio::time::timeout(timeout, self.client.submit(file)).await {
            Ok(Ok(extraction)) => Ok(flatten(&extraction.into_record(&file.name))),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("no response within {:?}", timeout)),
        }
    }

    fn fail(&self, generation: u64, failure: BatchFailure) -> Result<BatchRun> {
        let mut session = self.session();
        if *self.generation.borrow() != generation {
            drop(session);
            return Ok(self.superseded(generation));
        }

        tracing::error!(
            "❌ Batch {} aborted at file {}/{} ({}): {}",
            generation,
            failure.position,
            failure.total,
            failure.file_name(),
            failure.reason()
        );
        let err = EtlError::SubmissionError {
            file: failure.file_name().to_string(),
            message: failure.reason().to_string(),
        };
        session.state = BatchState::Failed { failure };
        Err(err)
    }

    fn complete(&self, generation: u64, results: Vec<BatchResult>) -> Result<BatchRun> {
        let mut session = self.session();
        if *self.generation.borrow() != generation {
            drop(session);
            return Ok(self.superseded(generation));
        }

        tracing::info!("✅ Batch {} ready with {} result(s)", generation, results.len());
        session.state = BatchState::Ready {
            results: results.clone(),
        };
        Ok(BatchRun::Completed {
            generation,
            results,
        })
    }

    fn superseded(&self, generation: u64) -> BatchRun {
        tracing::warn!(
            "Discarding outcome of batch {} (current batch is {})",
            generation,
            self.generation()
        );
        BatchRun::Superseded { generation }
    }
}

/// Resolves once the generation moves past `generation`.
async fn wait_for_newer(watcher: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        if *watcher.borrow_and_update() != generation {
            return;
        }
        if watcher.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
