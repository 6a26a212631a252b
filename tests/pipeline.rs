use classlens::config::PipelineConfig;
use classlens::core::{DependencyEdge, EdgeKind, ExtractionPipeline};
use classlens::parsers::{LanguageParser, ParseResult};
use classlens::{AnalysisError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Emits `count` edges per file, sourced from the file stem; files named `bad*` fail.
struct StubParser {
    count: usize,
}

impl LanguageParser for StubParser {
    fn parse_file(&self, file_path: &Path) -> Result<ParseResult> {
        let stem = file_path.file_stem().unwrap().to_string_lossy().to_string();
        if stem.starts_with("bad") {
            return Err(AnalysisError::parse(file_path, "unexpected token"));
        }
        let edges = (0..self.count)
            .map(|i| DependencyEdge::new(stem.clone(), format!("T{}", i), EdgeKind::Field))
            .collect();
        Ok(ParseResult {
            edges,
            ..ParseResult::default()
        })
    }

    fn language_name(&self) -> &str {
        "stub"
    }
}

/// One edge per file; counts every parse call.
struct CountingParser {
    calls: Arc<AtomicUsize>,
}

impl LanguageParser for CountingParser {
    fn parse_file(&self, file_path: &Path) -> Result<ParseResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = file_path.file_stem().unwrap().to_string_lossy().to_string();
        Ok(ParseResult {
            edges: vec![DependencyEdge::new(stem, "Target", EdgeKind::Field)],
            ..ParseResult::default()
        })
    }

    fn language_name(&self) -> &str {
        "counting"
    }
}

fn config(batch_size: usize, workers: usize) -> PipelineConfig {
    PipelineConfig {
        batch_size,
        workers,
        extensions: vec!["java".to_string()],
    }
}

fn stub_pipeline(count: usize, batch_size: usize, workers: usize) -> ExtractionPipeline {
    ExtractionPipeline::with_parser(Arc::new(StubParser { count }), config(batch_size, workers))
}

fn write_files(root: &Path, names: &[&str]) {
    for name in names {
        fs::write(root.join(format!("{}.java", name)), "class X {}").unwrap();
    }
}

#[tokio::test]
async fn edges_of_one_file_are_contiguous() {
    let dir = tempfile::TempDir::new().unwrap();
    let names: Vec<String> = (0..12).map(|i| format!("F{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    write_files(dir.path(), &refs);

    let edges = stub_pipeline(25, 3, 4)
        .extract(dir.path())
        .collect()
        .await
        .unwrap();
    assert_eq!(edges.len(), 12 * 25);

    let mut finished = HashSet::new();
    let mut current: Option<&str> = None;
    for edge in &edges {
        if current != Some(edge.source.as_str()) {
            if let Some(previous) = current {
                finished.insert(previous.to_string());
            }
            assert!(
                !finished.contains(&edge.source),
                "edges of {} were interleaved",
                edge.source
            );
            current = Some(edge.source.as_str());
        }
    }
}

#[tokio::test]
async fn failing_files_are_skipped() {
    let dir = tempfile::TempDir::new().unwrap();
    write_files(dir.path(), &["good1", "bad", "good2"]);

    let edges = stub_pipeline(2, 4, 2)
        .extract(dir.path())
        .collect()
        .await
        .unwrap();

    let sources: HashSet<_> = edges.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(sources, HashSet::from(["good1", "good2"]));
    assert_eq!(edges.len(), 4);
}

#[tokio::test]
async fn invalid_root_fails_the_stream() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing");

    let mut stream = stub_pipeline(1, 4, 2).extract(&missing);
    let err = stream.next_batch(4).await.unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidPath(_)));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn batches_are_bounded_and_empty_at_the_end() {
    let dir = tempfile::TempDir::new().unwrap();
    write_files(dir.path(), &["A", "B", "C"]);

    let mut stream = stub_pipeline(7, 5, 2).extract(dir.path());
    let mut total = 0;
    loop {
        let batch = stream.next_batch(5).await.unwrap();
        if batch.is_empty() {
            break;
        }
        assert!(batch.len() <= 5);
        total += batch.len();
    }
    assert_eq!(total, 21);
}

#[tokio::test]
async fn extraction_is_restartable() {
    let dir = tempfile::TempDir::new().unwrap();
    write_files(dir.path(), &["A", "B"]);
    let pipeline = stub_pipeline(3, 2, 2);

    let first: HashSet<_> = pipeline
        .extract(dir.path())
        .collect()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key())
        .collect();
    let second: HashSet<_> = pipeline
        .extract(dir.path())
        .collect()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key())
        .collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 6);
}

#[tokio::test]
async fn slow_consumer_loses_nothing() {
    let dir = tempfile::TempDir::new().unwrap();
    let names: Vec<String> = (0..6).map(|i| format!("S{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    write_files(dir.path(), &refs);

    let mut stream = stub_pipeline(10, 2, 3).extract(dir.path());
    let mut received = 0;
    while let Some(edge) = stream.next().await {
        edge.unwrap();
        received += 1;
        if received % 10 == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
    assert_eq!(received, 60);
}

#[tokio::test]
async fn java_pipeline_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("p")).unwrap();
    fs::write(
        dir.path().join("p/A.java"),
        "package p; class A extends B { C c; }",
    )
    .unwrap();
    fs::write(dir.path().join("p/Broken.java"), "class Broken {").unwrap();

    let pipeline = ExtractionPipeline::new(config(4, 2)).unwrap();
    let edges = pipeline.extract(dir.path()).collect().await.unwrap();

    let triples: HashSet<_> = edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str(), e.kind))
        .collect();
    assert_eq!(
        triples,
        HashSet::from([
            ("p.A", "B", EdgeKind::Extends),
            ("p.A", "C", EdgeKind::Field),
        ])
    );
}

fn counting_pipeline(batch_size: usize, workers: usize) -> (ExtractionPipeline, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let parser = CountingParser {
        calls: Arc::clone(&calls),
    };
    let pipeline = ExtractionPipeline::with_parser(Arc::new(parser), config(batch_size, workers));
    (pipeline, calls)
}

fn write_numbered(root: &Path, count: usize) {
    for i in 0..count {
        fs::write(root.join(format!("N{}.java", i)), "class X {}").unwrap();
    }
}

#[tokio::test]
async fn idle_consumer_stalls_parsing() {
    let dir = tempfile::TempDir::new().unwrap();
    write_numbered(dir.path(), 200);
    let (batch_size, workers) = (4, 2);
    let (pipeline, calls) = counting_pipeline(batch_size, workers);

    let mut stream = pipeline.extract(dir.path());
    tokio::time::sleep(Duration::from_millis(300)).await;

    // edge buffer, the file being forwarded, the file queue and the blocked workers
    let limit = batch_size + 1 + workers + workers;
    let parsed = calls.load(Ordering::SeqCst);
    assert!(parsed > 0);
    assert!(parsed <= limit, "{} files parsed with nobody reading", parsed);

    let first = stream.next_batch(batch_size).await.unwrap();
    assert_eq!(first.len(), batch_size);
}

#[tokio::test]
async fn cancelled_stream_stops_parsing() {
    let dir = tempfile::TempDir::new().unwrap();
    write_numbered(dir.path(), 200);
    let (pipeline, calls) = counting_pipeline(4, 2);

    let mut stream = pipeline.extract(dir.path());
    let first = stream.next_batch(4).await.unwrap();
    assert_eq!(first.len(), 4);
    stream.cancel();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_cancel = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(calls.load(Ordering::SeqCst), after_cancel);
    assert!(after_cancel < 200);

    let mut leftover = 0;
    while let Some(edge) = stream.next().await {
        edge.unwrap();
        leftover += 1;
    }
    assert!(leftover <= 4);
}
