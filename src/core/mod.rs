pub mod aggregator;
pub mod driver;
pub mod graph;
pub mod layout;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod session;

pub use aggregator::{
    AggregateState, Aggregator, AnalysisStatus, GraphSnapshot, StatusSnapshot,
};
pub use driver::LayoutDriver;
pub use graph::{
    ClassDetails, ClassGraph, ClassRecord, DependencyEdge, DependencyGraph, EdgeKind, EdgeSet,
    GraphBuilder,
};
pub use layout::{LayoutEngine, LayoutFrame, LayoutPhase, PackageColor, Vec2};
pub use pipeline::{EdgeStream, ExtractionPipeline};
pub use report::{ClassReport, PackageReport, ProjectReport};
pub use scanner::FileScanner;
pub use session::AnalysisSession;
