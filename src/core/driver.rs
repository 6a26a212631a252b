use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use super::aggregator::GraphSnapshot;
use super::layout::{LayoutEngine, LayoutFrame, LayoutPhase};

/// Steps a [`LayoutEngine`] on a fixed interval and publishes a frame after every change.
///
/// The engine follows the latest [`GraphSnapshot`]; a new snapshot restarts the
/// simulation. [`LayoutDriver::stop`] ends the loop and returns the engine.
pub struct LayoutDriver {
    handle: Option<JoinHandle<LayoutEngine>>,
    shutdown: Option<oneshot::Sender<()>>,
    viewport_tx: watch::Sender<(f64, f64)>,
}

impl LayoutDriver {
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        engine: LayoutEngine,
        graph_rx: watch::Receiver<GraphSnapshot>,
        frames_tx: watch::Sender<LayoutFrame>,
        tick: Duration,
    ) -> Self {
        let viewport = engine.viewport();
        let (viewport_tx, viewport_rx) = watch::channel((viewport.width, viewport.height));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(
            engine,
            graph_rx,
            viewport_rx,
            frames_tx,
            shutdown_rx,
            tick.max(Duration::from_millis(1)),
        ));
        Self {
            handle: Some(handle),
            shutdown: Some(shutdown_tx),
            viewport_tx,
        }
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.viewport_tx.send_replace((width, height));
    }

    /// Stops the tick loop. No frame is published after this returns.
    pub async fn stop(mut self) -> Option<LayoutEngine> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let handle = self.handle.take()?;
        match handle.await {
            Ok(engine) => Some(engine),
            Err(err) => {
                error!(error = %err, "layout loop did not shut down cleanly");
                None
            }
        }
    }
}

impl Drop for LayoutDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run(
    mut engine: LayoutEngine,
    mut graph_rx: watch::Receiver<GraphSnapshot>,
    mut viewport_rx: watch::Receiver<(f64, f64)>,
    frames_tx: watch::Sender<LayoutFrame>,
    mut shutdown: oneshot::Receiver<()>,
    tick: Duration,
) -> LayoutEngine {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let snapshot = graph_rx.borrow_and_update().clone();
    engine.update_edges(&snapshot.edges);
    frames_tx.send_replace(engine.frame());

    let mut graph_open = true;
    let mut viewport_open = true;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = graph_rx.changed(), if graph_open => {
                if changed.is_err() {
                    graph_open = false;
                    continue;
                }
                let snapshot = graph_rx.borrow_and_update().clone();
                engine.update_edges(&snapshot.edges);
                debug!(
                    run = snapshot.run,
                    nodes = engine.node_count(),
                    edges = snapshot.edge_count(),
                    "layout restarted"
                );
                frames_tx.send_replace(engine.frame());
            }
            changed = viewport_rx.changed(), if viewport_open => {
                if changed.is_err() {
                    viewport_open = false;
                    continue;
                }
                let (width, height) = *viewport_rx.borrow_and_update();
                engine.set_viewport(width, height);
            }
            _ = interval.tick() => {
                if engine.tick() {
                    if engine.phase() == LayoutPhase::Settled {
                        debug!(iteration = engine.iteration(), "layout settled");
                    }
                    frames_tx.send_replace(engine.frame());
                }
            }
        }
    }

    engine
}
