use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::graph::{ClassGraph, DependencyEdge, EdgeKey, EdgeSet};
use super::pipeline::{EdgeStream, ExtractionPipeline};

/// Human-readable progress of the current analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisStatus {
    Ready,
    Starting,
    Analyzing { classes: usize, dependencies: usize },
    Completed { classes: usize, dependencies: usize },
    Failed(String),
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::Completed { .. } | AnalysisStatus::Failed(_)
        )
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStatus::Ready => f.write_str("Ready"),
            AnalysisStatus::Starting => f.write_str("Analyzing..."),
            AnalysisStatus::Analyzing {
                classes,
                dependencies,
            } => write!(
                f,
                "Analyzing: {} classes, {} dependencies",
                classes, dependencies
            ),
            AnalysisStatus::Completed {
                classes,
                dependencies,
            } => write!(
                f,
                "Completed: {} classes, {} dependencies",
                classes, dependencies
            ),
            AnalysisStatus::Failed(reason) => write!(f, "Analysis failed: {}", reason),
        }
    }
}

/// Immutable view of the accumulated edge set of one run.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub run: u64,
    pub edges: EdgeSet,
    pub classes: usize,
}

impl GraphSnapshot {
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn class_graph(&self) -> ClassGraph {
        ClassGraph::from_edges(self.edges.iter())
    }
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub run: u64,
    pub status: AnalysisStatus,
}

/// Deduplicated edges and counters, owned by exactly one task.
#[derive(Debug, Default)]
pub struct AggregateState {
    edges: EdgeSet,
    seen: HashSet<EdgeKey>,
    classes: HashSet<String>,
}

impl AggregateState {
    /// Returns how many edges of the batch were new.
    pub fn apply(&mut self, batch: Vec<DependencyEdge>) -> usize {
        let mut added = Vec::new();
        for edge in batch {
            if self.seen.insert(edge.key()) {
                self.classes.insert(edge.source.clone());
                self.classes.insert(edge.target.clone());
                added.push(edge);
            }
        }
        let count = added.len();
        self.edges.push_chunk(added);
        count
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }
}

/// Runs at most one analysis at a time and republishes its progress.
///
/// Starting a new analysis aborts the previous one. Published snapshots carry the run id,
/// and a run only ever writes over snapshots of its own run.
pub struct Aggregator {
    pipeline: ExtractionPipeline,
    batch_size: usize,
    graph_tx: watch::Sender<GraphSnapshot>,
    status_tx: watch::Sender<StatusSnapshot>,
    current_run: u64,
    active: Option<JoinHandle<()>>,
}

impl Aggregator {
    pub fn new(pipeline: ExtractionPipeline) -> Self {
        let batch_size = pipeline.config().batch_size.max(1);
        let (graph_tx, _) = watch::channel(GraphSnapshot::default());
        let (status_tx, _) = watch::channel(StatusSnapshot {
            run: 0,
            status: AnalysisStatus::Ready,
        });
        Self {
            pipeline,
            batch_size,
            graph_tx,
            status_tx,
            current_run: 0,
            active: None,
        }
    }

    pub fn subscribe_graph(&self) -> watch::Receiver<GraphSnapshot> {
        self.graph_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    pub fn graph(&self) -> GraphSnapshot {
        self.graph_tx.borrow().clone()
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status_tx.borrow().status.clone()
    }

    pub fn current_run(&self) -> u64 {
        self.current_run
    }

    /// Resets all state, cancels any running analysis and starts a new one.
    ///
    /// Must be called from within a tokio runtime. Returns the new run id.
    pub fn analyze(&mut self, root: impl AsRef<Path>) -> u64 {
        self.cancel();

        self.current_run += 1;
        let run = self.current_run;
        self.graph_tx.send_replace(GraphSnapshot {
            run,
            ..GraphSnapshot::default()
        });
        self.status_tx.send_replace(StatusSnapshot {
            run,
            status: AnalysisStatus::Starting,
        });

        let root = root.as_ref();
        info!(run, root = %root.display(), "analysis started");
        let stream = self.pipeline.extract(root);
        let publisher = Publisher {
            run,
            graph_tx: self.graph_tx.clone(),
            status_tx: self.status_tx.clone(),
        };
        self.active = Some(tokio::spawn(aggregate(
            stream,
            self.batch_size,
            publisher,
        )));
        run
    }

    /// Stops the running analysis, if any. Its signals keep their last values.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Waits for the running analysis to finish.
    pub async fn wait(&mut self) {
        if let Some(handle) = self.active.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!(run = self.current_run, "aggregation task panicked");
                }
            }
        }
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Publisher {
    run: u64,
    graph_tx: watch::Sender<GraphSnapshot>,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl Publisher {
    fn graph(&self, state: &AggregateState) {
        let run = self.run;
        self.graph_tx.send_if_modified(|snapshot| {
            if snapshot.run != run {
                return false;
            }
            *snapshot = GraphSnapshot {
                run,
                edges: state.edges().clone(),
                classes: state.class_count(),
            };
            true
        });
    }

    fn status(&self, status: AnalysisStatus) {
        let run = self.run;
        self.status_tx.send_if_modified(|snapshot| {
            if snapshot.run != run {
                return false;
            }
            snapshot.status = status;
            true
        });
    }
}

async fn aggregate(mut stream: EdgeStream, batch_size: usize, publisher: Publisher) {
    let mut state = AggregateState::default();

    loop {
        match stream.next_batch(batch_size).await {
            Ok(batch) if batch.is_empty() => {
                info!(
                    run = publisher.run,
                    classes = state.class_count(),
                    dependencies = state.edge_count(),
                    "analysis completed"
                );
                publisher.status(AnalysisStatus::Completed {
                    classes: state.class_count(),
                    dependencies: state.edge_count(),
                });
                break;
            }
            Ok(batch) => {
                let received = batch.len();
                let added = state.apply(batch);
                debug!(run = publisher.run, received, added, "batch applied");
                publisher.graph(&state);
                publisher.status(AnalysisStatus::Analyzing {
                    classes: state.class_count(),
                    dependencies: state.edge_count(),
                });
            }
            Err(err) => {
                error!(run = publisher.run, error = %err, "analysis failed");
                publisher.status(AnalysisStatus::Failed(err.to_string()));
                break;
            }
        }
    }
}
