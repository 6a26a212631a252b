use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use classlens::config::Config;
use classlens::core::{AnalysisSession, ProjectReport};
use classlens::formatters::JsonCompactFormatter;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "classlens",
    version = "0.1.0",
    author = "classlens developers",
    about = "Streaming Java class-dependency explorer"
)]
struct Cli {
    /// Root directory of the Java sources to analyze
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// TOML configuration file (falls back to $CLASSLENS_CONFIG, then defaults)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the graph and its layout as compact JSON
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the dependencies of one class (fully-qualified name)
    #[arg(long, value_name = "NAME")]
    class: Option<String>,

    /// Print the per-package dependency report
    #[arg(long)]
    report: bool,

    /// Seconds to wait for the layout to settle
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    layout_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        input,
        config,
        output,
        class,
        report,
        layout_timeout,
    } = cli;

    let config = Config::resolve(config)?;
    let start_time = Instant::now();

    println!("classlens - Java class dependencies");
    println!("Input: {}", input.display());

    let mut session = AnalysisSession::new(&config)?;
    let mut status_rx = session.subscribe_status();
    session.analyze(&input).await;

    let printer = tokio::spawn(async move {
        let mut last = String::new();
        loop {
            let (line, terminal) = {
                let snapshot = status_rx.borrow_and_update();
                (snapshot.status.to_string(), snapshot.status.is_terminal())
            };
            if line != last {
                println!("{}", line);
                last = line;
            }
            if terminal || status_rx.changed().await.is_err() {
                break;
            }
        }
    });

    let status = session.wait_for_analysis().await;
    if let Err(err) = printer.await {
        warn!(error = %err, "status printer stopped abnormally");
    }
    if !status.is_terminal() {
        println!("{}", status);
    }
    println!(
        "Analysis finished in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    let frame = match tokio::time::timeout(
        Duration::from_secs(layout_timeout),
        session.wait_for_layout(),
    )
    .await
    {
        Ok(frame) => {
            println!("Layout settled after {} iterations", frame.iteration);
            frame
        }
        Err(_) => {
            println!("Layout still running after {}s", layout_timeout);
            session.frame()
        }
    };
    session.shutdown().await;

    let graph = session.graph();

    if let Some(class) = class {
        match session.select(&class) {
            Some(details) => {
                println!("\n{} uses ({}):", class, details.outgoing_count());
                for line in details.outgoing_lines() {
                    println!("{}", line);
                }
                println!("\n{} is used by:", class);
                for line in details.incoming_lines() {
                    println!("{}", line);
                }
            }
            None => println!("\nClass {} not found in the graph", class),
        }
    }

    if report {
        let project = ProjectReport::from_edges(graph.edges.iter());
        println!(
            "\n{} classes in {} packages",
            project.class_count(),
            project.packages.len()
        );
        print!("{}", project);
    }

    if let Some(output) = output {
        let edges = graph.edges.to_vec();
        JsonCompactFormatter::new().format_to_file(&edges, Some(&frame), &output)?;
        println!("JSON output: {}", output.display());
    }

    println!(
        "Total execution time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
