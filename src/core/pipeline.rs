use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::graph::DependencyEdge;
use super::scanner::{FileInfo, FileScanner};
use crate::config::PipelineConfig;
use crate::error::{AnalysisError, Result};
use crate::parsers::java::JavaParser;
use crate::parsers::LanguageParser;

pub type SharedParser = Arc<dyn LanguageParser + Send + Sync>;

/// Enumerates, parses and classifies a source tree into a stream of edges.
///
/// Each call to [`ExtractionPipeline::extract`] is an independent walk.
#[derive(Clone)]
pub struct ExtractionPipeline {
    scanner: FileScanner,
    parser: SharedParser,
    config: PipelineConfig,
}

impl ExtractionPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let parser: SharedParser = Arc::new(JavaParser::new()?);
        Ok(Self::with_parser(parser, config))
    }

    pub fn with_parser(parser: SharedParser, config: PipelineConfig) -> Self {
        Self {
            scanner: FileScanner::new(&config.extensions),
            parser,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Starts a walk of `root`. Must be called from within a tokio runtime.
    ///
    /// At most `batch_size` edges are buffered ahead of the consumer. Edges of one file
    /// are delivered contiguously; files arrive in no particular order.
    pub fn extract(&self, root: impl AsRef<Path>) -> EdgeStream {
        let (tx, rx) = mpsc::channel(self.config.batch_size.max(1));
        let producer = tokio::spawn(produce(
            root.as_ref().to_path_buf(),
            self.scanner.clone(),
            Arc::clone(&self.parser),
            self.config.workers.max(1),
            tx,
        ));
        EdgeStream {
            rx,
            producer,
            held: None,
        }
    }
}

/// Consumer side of one extraction. Dropping it cancels the walk.
pub struct EdgeStream {
    rx: mpsc::Receiver<Result<DependencyEdge>>,
    producer: JoinHandle<()>,
    held: Option<AnalysisError>,
}

impl EdgeStream {
    /// `None` once the walk is over; an `Err` is terminal.
    pub async fn next(&mut self) -> Option<Result<DependencyEdge>> {
        if let Some(err) = self.held.take() {
            return Some(Err(err));
        }
        self.rx.recv().await
    }

    /// Waits until `size` edges are available or the stream ends.
    ///
    /// An empty batch means the walk completed. A failure that arrives after some edges
    /// of the batch is reported by the following call.
    pub async fn next_batch(&mut self, size: usize) -> Result<Vec<DependencyEdge>> {
        if let Some(err) = self.held.take() {
            return Err(err);
        }
        let size = size.max(1);
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.rx.recv().await {
                Some(Ok(edge)) => batch.push(edge),
                Some(Err(err)) if batch.is_empty() => return Err(err),
                Some(Err(err)) => {
                    self.held = Some(err);
                    break;
                }
                None => break,
            }
        }
        Ok(batch)
    }

    /// Drains the whole stream, stopping at the first terminal failure.
    pub async fn collect(mut self) -> Result<Vec<DependencyEdge>> {
        let mut edges = Vec::new();
        while let Some(item) = self.next().await {
            edges.push(item?);
        }
        Ok(edges)
    }

    pub fn cancel(&mut self) {
        self.rx.close();
        self.producer.abort();
    }
}

impl Drop for EdgeStream {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ExtractionStats {
    extracted: usize,
    skipped: usize,
}

enum FileOutcome {
    Extracted,
    Skipped,
    Cancelled,
    Failed(AnalysisError),
}

async fn produce(
    root: PathBuf,
    scanner: FileScanner,
    parser: SharedParser,
    workers: usize,
    tx: mpsc::Sender<Result<DependencyEdge>>,
) {
    let scan_root = root.clone();
    let files = match tokio::task::spawn_blocking(move || scanner.scan_directory(&scan_root)).await
    {
        Ok(Ok(files)) => files,
        Ok(Err(err)) => {
            let _ = tx.send(Err(err)).await;
            return;
        }
        Err(err) => {
            let failure = AnalysisError::Pipeline(format!("file enumeration failed: {}", err));
            let _ = tx.send(Err(failure)).await;
            return;
        }
    };
    info!(root = %root.display(), files = files.len(), "extraction started");

    // Workers hand over whole files; the loop below forwards them edge by edge so one
    // file's edges are never interleaved with another's.
    let (file_tx, mut file_rx) = mpsc::channel::<Vec<DependencyEdge>>(workers);
    let mut dispatcher = JoinSet::new();
    dispatcher.spawn(dispatch(files, parser, workers, file_tx));

    while let Some(edges) = file_rx.recv().await {
        for edge in edges {
            if tx.send(Ok(edge)).await.is_err() {
                debug!(root = %root.display(), "edge consumer dropped, extraction cancelled");
                return;
            }
        }
    }

    while let Some(outcome) = dispatcher.join_next().await {
        let failure = match outcome {
            Ok(Ok(stats)) => {
                info!(
                    root = %root.display(),
                    extracted = stats.extracted,
                    skipped = stats.skipped,
                    "extraction finished"
                );
                continue;
            }
            Ok(Err(err)) => err,
            Err(err) => AnalysisError::Pipeline(format!("extraction dispatcher failed: {}", err)),
        };
        let _ = tx.send(Err(failure)).await;
    }
}

async fn dispatch(
    files: Vec<FileInfo>,
    parser: SharedParser,
    workers: usize,
    file_tx: mpsc::Sender<Vec<DependencyEdge>>,
) -> Result<ExtractionStats> {
    let permits = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    for file in files {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        if file_tx.is_closed() {
            break;
        }
        let parser = Arc::clone(&parser);
        let file_tx = file_tx.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            extract_file(parser.as_ref(), &file, &file_tx)
        });
    }
    drop(file_tx);

    let mut stats = ExtractionStats::default();
    while let Some(outcome) = tasks.join_next().await {
        match outcome {
            Ok(FileOutcome::Extracted) => stats.extracted += 1,
            Ok(FileOutcome::Skipped) => stats.skipped += 1,
            Ok(FileOutcome::Cancelled) => {}
            Ok(FileOutcome::Failed(err)) => return Err(err),
            Err(err) => {
                return Err(AnalysisError::Pipeline(format!(
                    "extraction worker failed: {}",
                    err
                )))
            }
        }
    }
    Ok(stats)
}

fn extract_file(
    parser: &(dyn LanguageParser + Send + Sync),
    file: &FileInfo,
    file_tx: &mpsc::Sender<Vec<DependencyEdge>>,
) -> FileOutcome {
    if file_tx.is_closed() {
        return FileOutcome::Cancelled;
    }
    match parser.parse_file(&file.path) {
        Ok(result) if result.edges.is_empty() => FileOutcome::Extracted,
        Ok(result) => match file_tx.blocking_send(result.edges) {
            Ok(()) => FileOutcome::Extracted,
            Err(_) => FileOutcome::Cancelled,
        },
        Err(err) if err.is_file_local() => {
            warn!(file = %file.path.display(), error = %err, "skipping file");
            FileOutcome::Skipped
        }
        Err(err) => FileOutcome::Failed(err),
    }
}
