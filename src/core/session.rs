use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use super::aggregator::{Aggregator, AnalysisStatus, GraphSnapshot, StatusSnapshot};
use super::driver::LayoutDriver;
use super::graph::ClassDetails;
use super::layout::{LayoutEngine, LayoutFrame, LayoutPhase};
use super::pipeline::ExtractionPipeline;
use crate::config::{Config, LayoutConfig};
use crate::error::Result;

/// One explorable analysis: extraction, aggregation and live layout wired together.
///
/// Presentation code subscribes to the graph, status and frame signals and calls
/// [`AnalysisSession::select`] for the details of a node.
pub struct AnalysisSession {
    aggregator: Aggregator,
    engine: Option<LayoutEngine>,
    driver: Option<LayoutDriver>,
    frames_tx: watch::Sender<LayoutFrame>,
    layout: LayoutConfig,
    tick: Duration,
}

impl AnalysisSession {
    pub fn new(config: &Config) -> Result<Self> {
        let pipeline = ExtractionPipeline::new(config.pipeline.clone())?;
        Ok(Self::with_pipeline(pipeline, config))
    }

    pub fn with_pipeline(pipeline: ExtractionPipeline, config: &Config) -> Self {
        let (frames_tx, _) = watch::channel(LayoutFrame::default());
        Self {
            aggregator: Aggregator::new(pipeline),
            engine: Some(LayoutEngine::new(config.layout.clone())),
            driver: None,
            frames_tx,
            layout: config.layout.clone(),
            tick: Duration::from_millis(config.layout.tick_interval_ms),
        }
    }

    /// Cancels the current analysis and its layout loop, then starts over on `root`.
    pub async fn analyze(&mut self, root: impl AsRef<Path>) -> u64 {
        let mut engine = match self.driver.take() {
            Some(driver) => driver.stop().await,
            None => self.engine.take(),
        }
        .unwrap_or_else(|| self.fresh_engine());
        engine.reset();
        self.frames_tx.send_replace(engine.frame());

        let run = self.aggregator.analyze(root);
        self.driver = Some(LayoutDriver::spawn(
            engine,
            self.aggregator.subscribe_graph(),
            self.frames_tx.clone(),
            self.tick,
        ));
        info!(run, "layout attached");
        run
    }

    pub fn graph(&self) -> GraphSnapshot {
        self.aggregator.graph()
    }

    pub fn status(&self) -> AnalysisStatus {
        self.aggregator.status()
    }

    pub fn frame(&self) -> LayoutFrame {
        self.frames_tx.borrow().clone()
    }

    pub fn subscribe_graph(&self) -> watch::Receiver<GraphSnapshot> {
        self.aggregator.subscribe_graph()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.aggregator.subscribe_status()
    }

    pub fn subscribe_frames(&self) -> watch::Receiver<LayoutFrame> {
        self.frames_tx.subscribe()
    }

    /// Outgoing and incoming dependencies of `class` in the current graph.
    pub fn select(&self, class: &str) -> Option<ClassDetails> {
        self.graph().class_graph().details(class)
    }

    pub fn resize(&self, width: f64, height: f64) {
        if let Some(driver) = &self.driver {
            driver.resize(width, height);
        }
    }

    /// Waits for extraction and aggregation to finish; the layout keeps running.
    pub async fn wait_for_analysis(&mut self) -> AnalysisStatus {
        self.aggregator.wait().await;
        self.aggregator.status()
    }

    /// Waits until the layout has caught up with the current graph and stopped moving.
    ///
    /// Call after [`AnalysisSession::wait_for_analysis`] to wait for the final layout.
    pub async fn wait_for_layout(&self) -> LayoutFrame {
        let target = self.graph().edge_count();
        let mut frames = self.subscribe_frames();
        loop {
            {
                let frame = frames.borrow_and_update();
                if frame.edges == target && frame.phase != LayoutPhase::Running {
                    return frame.clone();
                }
            }
            if frames.changed().await.is_err() {
                return self.frame();
            }
        }
    }

    /// Cancels the analysis and stops the layout loop.
    pub async fn shutdown(&mut self) {
        self.aggregator.cancel();
        if let Some(driver) = self.driver.take() {
            self.engine = driver.stop().await;
        }
    }

    fn fresh_engine(&self) -> LayoutEngine {
        LayoutEngine::new(self.layout.clone())
    }
}
