//! Diamond task graph demo.
//!
//! Builds the four-kernel diamond from the `example` crate, submits it on a
//! thread pool and logs the results.
//!
//! # Usage
//!
//! ```bash
//! WEFT_LOG=debug WEFT_NUM_THREADS=4 diamond [len]
//! ```

use example::{DiamondData, build_diamond};
use weft_core::RuntimeConfig;

const DEFAULT_LEN: usize = 1024;

fn main() {
    let config = RuntimeConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    config.tracing().init();

    let len = match std::env::args().nth(1) {
        Some(arg) => arg.parse().unwrap_or_else(|_| {
            eprintln!("Usage: diamond [len]");
            std::process::exit(1);
        }),
        None => DEFAULT_LEN,
    };

    let space = config.threads_space().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let data = DiamondData::new(len);
    let graph = build_diamond(space, &data).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "diamond built"
    );

    let report = graph.submit_once();
    tracing::info!(
        nodes_executed = report.nodes_executed,
        elapsed = ?report.duration,
        destructive = report.destructive,
        sum = ?data.sum.get(),
        sum_of_squares = ?data.sum_of_squares.get(),
        "diamond submitted"
    );
}
