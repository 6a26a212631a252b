use criterion::{black_box, criterion_group, criterion_main, Criterion};
use classlens::config::{LayoutConfig, PipelineConfig};
use classlens::core::{DependencyEdge, EdgeKind, ExtractionPipeline, LayoutEngine};
use classlens::parsers::java::JavaParser;
use std::path::Path;

fn sample_class(i: usize) -> String {
    format!(
        r#"
package bench.p{};

import java.util.List;
import java.util.Map;
import java.util.concurrent.*;

public class Service{} extends BaseService implements Runnable, Comparable<Service{}> {{
    private final Map<String, List<Order>> orders;
    private Repository<Customer> repository;

    public Service{}(Repository<Customer> repository) {{
        this.repository = repository;
        this.orders = new HashMap<>();
    }}

    public List<Order> ordersFor(Customer customer, Filter... filters) {{
        Cache cache = new Cache(customer.id());
        for (Order order : repository.load(customer)) {{
            cache.put(order);
        }}
        return cache.values();
    }}

    public void run() {{
        try (Connection connection = Pool.acquire()) {{
            connection.flush();
        }} catch (IOException | TimeoutException ex) {{
            throw new IllegalStateException(ex);
        }}
    }}
}}
"#,
        i % 10,
        i,
        i,
        i
    )
}

fn benchmark_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");

    let parser = JavaParser::new().unwrap();
    let source = sample_class(0);
    group.bench_function("classify_single_file", |b| {
        b.iter(|| {
            let result = parser.parse_source(Path::new("Service0.java"), black_box(&source));
            black_box(result)
        });
    });

    let test_dir = tempfile::TempDir::new().unwrap();
    for i in 0..100 {
        let package_dir = test_dir.path().join(format!("p{}", i % 10));
        std::fs::create_dir_all(&package_dir).unwrap();
        std::fs::write(
            package_dir.join(format!("Service{}.java", i)),
            sample_class(i),
        )
        .unwrap();
    }

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let pipeline = ExtractionPipeline::new(PipelineConfig::default()).unwrap();
    group.bench_function("pipeline_100_files", |b| {
        b.iter(|| {
            let edges = runtime
                .block_on(async { pipeline.extract(black_box(test_dir.path())).collect().await });
            black_box(edges)
        });
    });

    group.finish();
}

fn benchmark_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");

    let edges: Vec<DependencyEdge> = (0..200)
        .map(|i| {
            DependencyEdge::new(
                format!("p{}.C{}", i % 7, i),
                format!("p{}.C{}", (i * 3) % 7, (i * 13) % 200),
                EdgeKind::Field,
            )
        })
        .collect();

    group.bench_function("step_200_nodes", |b| {
        let mut engine = LayoutEngine::new(LayoutConfig {
            seed: Some(11),
            ..LayoutConfig::default()
        });
        engine.update_edges(&edges);
        b.iter(|| black_box(engine.step()));
    });

    group.bench_function("incremental_update", |b| {
        let mut engine = LayoutEngine::new(LayoutConfig {
            seed: Some(11),
            ..LayoutConfig::default()
        });
        b.iter(|| {
            for chunk in edges.chunks(20) {
                engine.update_edges(black_box(chunk));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_extraction, benchmark_layout);
criterion_main!(benches);
