//! Scenario runner - resets the mock upstream, runs each scenario, reports audio timing

use colored::Colorize;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::types::{SharedBackendState, StreamTiming, TestResult};

pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A single scenario
pub struct TestCase {
    pub name: &'static str,
    pub description: &'static str,
    pub run: Box<dyn Fn(TestContext) -> TestFuture + Send + Sync>,
}

/// What a scenario gets: the proxy, the mock upstream and a place to leave stream timings
#[derive(Clone)]
pub struct TestContext {
    pub proxy_addr: String,
    pub backend_state: SharedBackendState,
    pub http_client: reqwest::Client,
    streams: Arc<Mutex<Vec<StreamTiming>>>,
}

impl TestContext {
    pub fn new(proxy_addr: String, backend_state: SharedBackendState, http_client: reqwest::Client) -> Self {
        Self {
            proxy_addr,
            backend_state,
            http_client,
            streams: Arc::default(),
        }
    }

    /// Note one audio stream read by the current scenario
    pub fn record(&self, timing: StreamTiming) {
        self.streams.lock().unwrap().push(timing);
    }

    /// Forget everything the previous scenario left behind
    fn reset(&self) {
        let mut state = self.backend_state.lock().unwrap();
        state.response_queue.clear();
        state.received_requests.clear();
        self.streams.lock().unwrap().clear();
    }

    fn take_streams(&self) -> Vec<StreamTiming> {
        std::mem::take(&mut *self.streams.lock().unwrap())
    }
}

/// One-line description of the streams a scenario read
fn stream_note(streams: &[StreamTiming]) -> String {
    if streams.is_empty() {
        return String::new();
    }
    let chunks: usize = streams.iter().map(|s| s.chunks).sum();
    let bytes: usize = streams.iter().map(|s| s.bytes).sum();
    let first = streams.iter().filter_map(|s| s.first_chunk_ms).min();
    let truncated = streams.iter().filter(|s| !s.complete).count();

    let mut note = format!(
        " · {} stream(s), {} chunk(s), {} B",
        streams.len(),
        chunks,
        bytes
    );
    if let Some(first) = first {
        note.push_str(&format!(", first audio {first}ms"));
    }
    if truncated > 0 {
        note.push_str(&format!(", {truncated} truncated"));
    }
    note
}

/// Nearest-rank percentile of an ascending slice
fn percentile(sorted: &[u64], pct: usize) -> u64 {
    let rank = (sorted.len() * pct).div_ceil(100).max(1);
    sorted[rank - 1]
}

/// Run the matching scenarios one after another and print a report
pub async fn run_tests(cases: &[TestCase], ctx: &TestContext, filter: Option<&str>) -> Vec<TestResult> {
    let selected: Vec<&TestCase> = cases
        .iter()
        .filter(|c| filter.map_or(true, |f| c.name.contains(f)))
        .collect();

    println!("\n{}", "═══════════════════════════════════════════════════".bright_blue());
    println!("{}", "  cynvoice-proxy relay scenarios".bright_white().bold());
    println!("{}", "═══════════════════════════════════════════════════".bright_blue());
    println!("  Proxy:   {}", ctx.proxy_addr.bright_cyan());
    println!("  Running: {} scenario(s)\n", selected.len().to_string().bright_cyan());

    let mut results = Vec::with_capacity(selected.len());
    for case in selected {
        ctx.reset();
        print!("  {} {} ... ", "▶".bright_blue(), case.name.bright_white());

        let start = Instant::now();
        let outcome = (case.run)(ctx.clone()).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let streams = ctx.take_streams();

        match outcome {
            Ok(()) => println!(
                "{} ({duration_ms}ms){}",
                "PASS".bright_green().bold(),
                stream_note(&streams).dimmed()
            ),
            Err(ref e) => {
                println!("{} ({duration_ms}ms)", "FAIL".bright_red().bold());
                println!("    {} {}", "Error:".bright_red(), e);
                for cause in e.chain().skip(1) {
                    println!("    {} {}", "Caused by:".yellow(), cause);
                }
            }
        }

        results.push(TestResult {
            name: case.name.to_string(),
            passed: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
            duration_ms,
            streams,
        });
    }

    print_summary(&results);
    results
}

fn print_summary(results: &[TestResult]) {
    let failed: Vec<&TestResult> = results.iter().filter(|r| !r.passed).collect();
    let passed = results.len() - failed.len();

    println!("\n{}", "───────────────────────────────────────────────────".bright_blue());

    let mut first_audio: Vec<u64> = results
        .iter()
        .flat_map(|r| &r.streams)
        .filter_map(|s| s.first_chunk_ms)
        .collect();
    first_audio.sort_unstable();
    if !first_audio.is_empty() {
        println!(
            "  Time to first audio over {} stream(s): p50 {}ms, p95 {}ms, max {}ms",
            first_audio.len(),
            percentile(&first_audio, 50),
            percentile(&first_audio, 95),
            first_audio[first_audio.len() - 1]
        );
    }

    for result in &failed {
        println!(
            "  {} {} ({}ms): {}",
            "✗".bright_red(),
            result.name,
            result.duration_ms,
            result.error.as_deref().unwrap_or("")
        );
    }

    let summary = format!("  Results: {} passed, {} failed", passed, failed.len());
    if failed.is_empty() {
        println!("{}", summary.bright_green().bold());
    } else {
        println!("{}", summary.bright_red().bold());
    }
    println!("{}\n", "═══════════════════════════════════════════════════".bright_blue());
}

/// Print every scenario name with its description
pub fn list_tests(cases: &[TestCase]) {
    println!("\n{}", "Available scenarios:".bright_white().bold());
    for case in cases {
        println!("  {} - {}", case.name.bright_cyan(), case.description);
    }
    println!();
}
