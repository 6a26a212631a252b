use classlens::config::{Config, LayoutConfig};
use classlens::core::{AnalysisSession, AnalysisStatus, EdgeKind, LayoutPhase};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.pipeline.workers = 2;
    config.layout = LayoutConfig {
        tick_interval_ms: 1,
        max_iterations: 50,
        seed: Some(3),
        ..LayoutConfig::default()
    };
    config
}

fn write(root: &Path, name: &str, code: &str) {
    fs::write(root.join(name), code).unwrap();
}

#[tokio::test]
async fn layout_follows_the_analysed_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "A.java", "package p; class A extends B { C c; }");
    write(dir.path(), "D.java", "package p; class D { A a; }");

    let mut session = AnalysisSession::new(&fast_config()).unwrap();
    session.analyze(dir.path()).await;
    let status = session.wait_for_analysis().await;
    assert_eq!(status.to_string(), "Completed: 5 classes, 3 dependencies");

    let frame = tokio::time::timeout(Duration::from_secs(10), session.wait_for_layout())
        .await
        .unwrap();
    assert_eq!(frame.phase, LayoutPhase::Settled);
    assert_eq!(frame.edges, 3);
    let mut classes: Vec<_> = frame.positions.keys().cloned().collect();
    classes.sort();
    // `A` is referenced by its simple name from p.D
    assert_eq!(classes, vec!["A", "B", "C", "p.A", "p.D"]);
    assert_eq!(frame.colors.len(), 5);

    session.shutdown().await;
}

#[tokio::test]
async fn selection_groups_outgoing_and_incoming_edges() {
    let dir = tempfile::TempDir::new().unwrap();
    write(
        dir.path(),
        "A.java",
        "class A extends Base { Helper h; Helper make(Helper x) { return new Helper(); } }",
    );
    write(dir.path(), "User.java", "class User { A a; void f(A a) {} }");

    let mut session = AnalysisSession::new(&fast_config()).unwrap();
    session.analyze(dir.path()).await;
    session.wait_for_analysis().await;

    let details = session.select("A").unwrap();
    assert_eq!(details.outgoing[&EdgeKind::Extends].len(), 1);
    assert!(details.outgoing[&EdgeKind::Field].contains("Helper"));
    assert!(details.outgoing[&EdgeKind::ReturnType].contains("Helper"));
    assert!(details.outgoing[&EdgeKind::Parameter].contains("Helper"));
    assert!(details.outgoing[&EdgeKind::Creation].contains("Helper"));
    assert_eq!(details.outgoing_count(), 5);

    let from_user = &details.incoming["User"];
    assert!(from_user.contains(&EdgeKind::Field));
    assert!(from_user.contains(&EdgeKind::Parameter));

    assert!(session.select("Nobody").is_none());
    session.shutdown().await;
}

#[tokio::test]
async fn reanalysis_discards_old_classes_and_positions() {
    let first = tempfile::TempDir::new().unwrap();
    write(first.path(), "Old.java", "class Old { Gone g; }");
    let second = tempfile::TempDir::new().unwrap();
    write(second.path(), "New.java", "class New { Kept k; }");

    let mut session = AnalysisSession::new(&fast_config()).unwrap();
    session.analyze(first.path()).await;
    session.wait_for_analysis().await;
    tokio::time::timeout(Duration::from_secs(10), session.wait_for_layout())
        .await
        .unwrap();

    session.analyze(second.path()).await;
    session.wait_for_analysis().await;
    let frame = tokio::time::timeout(Duration::from_secs(10), session.wait_for_layout())
        .await
        .unwrap();

    assert!(frame.positions.contains_key("New"));
    assert!(!frame.positions.contains_key("Old"));
    assert!(!frame.positions.contains_key("Gone"));
    assert!(session.select("Old").is_none());
    session.shutdown().await;
}

#[tokio::test]
async fn failed_analysis_leaves_an_idle_layout() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing");

    let mut session = AnalysisSession::new(&fast_config()).unwrap();
    session.analyze(&missing).await;
    let status = session.wait_for_analysis().await;
    assert!(matches!(status, AnalysisStatus::Failed(_)));

    let frame = tokio::time::timeout(Duration::from_secs(5), session.wait_for_layout())
        .await
        .unwrap();
    assert_eq!(frame.phase, LayoutPhase::Idle);
    assert!(frame.positions.is_empty());
    session.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_frames() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "A.java", "class A { B b; C c; D d; }");

    let mut config = fast_config();
    config.layout.max_iterations = 1_000_000;
    config.layout.settle_threshold = 0.0;
    let mut session = AnalysisSession::new(&config).unwrap();
    session.analyze(dir.path()).await;
    session.wait_for_analysis().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    session.shutdown().await;
    let iteration = session.frame().iteration;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.frame().iteration, iteration);
}
