//! cynvoice-proxy e2e harness
//!
//! Runs the relay scenarios against a real proxy process talking to a mock
//! TTS upstream, and can play a single synthesis with per-chunk timing.
//!
//!   cargo run                                   # spawn the proxy, run every scenario
//!   cargo run -- --filter errors/               # only matching scenarios
//!   cargo run -- --attach 127.0.0.1:18066       # use a proxy that is already running
//!   cargo run -- list                           # list scenarios
//!   cargo run -- listen --text "Dinner is ready" --proxy-addr 127.0.0.1:8066

mod backend;
mod client;
mod runner;
mod tests;
mod types;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use runner::{list_tests, run_tests, TestContext};
use tests::all_tests;

/// Proxy binary candidates, tried in order
const PROXY_BINS: &[&str] = &["../target/release/cynvoice-proxy", "../target/debug/cynvoice-proxy"];

/// Points the proxy at the mock upstream; ports below must agree with it
const PROXY_CONFIG: &str = "test_configs/proxy.yaml";
const UPSTREAM_PORT: u16 = 18080;
const PROXY_ADDR: &str = "127.0.0.1:18066";

#[derive(Parser)]
#[command(name = "e2e", about = "End-to-end relay scenarios for cynvoice-proxy")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Only run scenarios whose name contains this string
    #[arg(long, short)]
    filter: Option<String>,

    /// Proxy binary to spawn [default: ../target/{release,debug}/cynvoice-proxy]
    #[arg(long)]
    proxy_bin: Option<String>,

    /// Use a proxy already listening here instead of spawning one. It must be
    /// configured with test_configs/proxy.yaml.
    #[arg(long, value_name = "ADDR")]
    attach: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List all scenarios
    List,

    /// Stream one synthesis through a running proxy and show when each chunk arrived
    Listen {
        /// Proxy to ask (talks to whatever upstream it is configured with)
        #[arg(long, default_value = "127.0.0.1:8066")]
        proxy_addr: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        voice: Option<String>,
        /// Save the received audio
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::List) => list_tests(&all_tests()),
        Some(Command::Listen {
            proxy_addr,
            text,
            voice,
            output,
        }) => listen(&proxy_addr, &text, voice.as_deref(), output).await?,
        None => run_scenarios(cli.proxy_bin, cli.attach, cli.filter.as_deref()).await?,
    }

    Ok(())
}

/// Start the mock upstream, spawn or attach to the proxy, run the scenarios
async fn run_scenarios(proxy_bin: Option<String>, attach: Option<String>, filter: Option<&str>) -> anyhow::Result<()> {
    let backend_state = backend::start(UPSTREAM_PORT).await?;
    println!("Mock upstream on 127.0.0.1:{}", UPSTREAM_PORT);

    // Held until the run ends; the proxy dies with it
    let mut proxy_process = None;
    let proxy_addr = match attach {
        Some(addr) => addr,
        None => {
            let bin = match proxy_bin {
                Some(bin) => bin,
                None => find_proxy_bin()?,
            };
            println!("Spawning {} run --config {}", bin.bright_cyan(), PROXY_CONFIG);
            let child = tokio::process::Command::new(&bin)
                .args(["run", "--config", PROXY_CONFIG])
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| anyhow::anyhow!("Failed to spawn '{}': {}", bin, e))?;
            proxy_process = Some(child);
            PROXY_ADDR.to_string()
        }
    };

    wait_for_proxy(&proxy_addr).await?;

    let ctx = TestContext::new(proxy_addr, backend_state, client::build_client());
    let results = run_tests(&all_tests(), &ctx, filter).await;

    if let Some(mut child) = proxy_process {
        child.kill().await.ok();
    }
    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

/// One real synthesis through the proxy, printed frame by frame
async fn listen(proxy_addr: &str, text: &str, voice: Option<&str>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut query = vec![("text", text)];
    if let Some(voice) = voice {
        query.push(("voice", voice));
    }
    let url = format!("http://{proxy_addr}/api/cynvoice/tts_stream");
    let resp = client::read_stream(client::build_client().get(&url).query(&query)).await?;

    println!("HTTP {} {}", resp.status, resp.content_type);
    let mut previous = 0;
    for (i, (chunk, at)) in resp.chunks.iter().zip(&resp.arrivals_ms).enumerate() {
        println!("  chunk {:>4}  {:>6} B  at {:>6}ms  (+{}ms)", i + 1, chunk.len(), at, at - previous);
        previous = *at;
    }

    let timing = resp.timing();
    let first = timing
        .first_chunk_ms
        .map_or_else(|| "never".to_string(), |ms| format!("{ms}ms"));
    let summary = format!(
        "first audio {}, {} chunk(s), {} B in {}ms",
        first, timing.chunks, timing.bytes, timing.total_ms
    );
    if timing.complete && resp.status == 200 {
        println!("{} {}", "✓".bright_green(), summary);
    } else {
        println!("{} {} (stream did not end cleanly)", "✗".bright_red(), summary);
    }

    if let Some(path) = output {
        tokio::fs::write(&path, resp.body()).await?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

fn find_proxy_bin() -> anyhow::Result<String> {
    PROXY_BINS
        .iter()
        .find(|candidate| std::path::Path::new(candidate).exists())
        .map(|candidate| candidate.to_string())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No proxy binary found. Tried: {}\nBuild with: cd .. && cargo build --release",
                PROXY_BINS.join(", ")
            )
        })
}

/// Poll /health until the proxy answers
async fn wait_for_proxy(addr: &str) -> anyhow::Result<()> {
    let client = client::build_client();
    let health_url = format!("http://{}/health", addr);

    for attempt in 0..30 {
        tokio::time::sleep(tokio::time::Duration::from_millis(200 + attempt * 100)).await;
        if client.get(&health_url).send().await.is_ok() {
            println!("Proxy ready at {}\n", addr.bright_cyan());
            return Ok(());
        }
    }

    Err(anyhow::anyhow!("Proxy at {} did not come up", addr))
}
