//! cynvoice-proxy: streaming relay for a text-to-speech service
//!
//! Sits between callers that want speech (media players, automations) and a
//! synthesis service exposing `POST /v1/tts`, and provides:
//! - Chunked audio streaming that starts before synthesis finishes
//! - Buffered WAV synthesis
//! - Playback URLs for media players

use async_trait::async_trait;
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use futures::Stream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

use cynvoice_proxy::{
    config::AppConfig,
    logging::{init_tracing, LogFormat},
    proxy::server::build_http_client,
    relay::{AudioSink, Relay, RelayError, RelayOutcome, StreamHead},
    run_server,
    synthesis::{collect_text, stream_url, RequestBuilder, SynthesisOverrides, CONF_API_URL},
};

#[derive(Parser)]
#[command(name = "cynvoice-proxy")]
#[command(version = "0.1.0")]
#[command(about = "Streaming relay for a text-to-speech service")]
#[command(long_about = "
cynvoice-proxy relays synthesis requests to a TTS service and streams the
audio back chunk by chunk as it is produced.

Example usage:
  cynvoice-proxy run --config config.yaml
  cynvoice-proxy synthesize --text \"Dinner is ready\" --output dinner.wav
  echo \"Dinner is ready\" | cynvoice-proxy synthesize --text - --output dinner.wav
  cynvoice-proxy stream-url --text \"Dinner is ready\"
")]
struct Cli {
    /// Path to config file [default: config.yaml, config.yml or ./config/config.yaml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the synthesis endpoint (e.g., "http://gpu-box:8080/v1/tts")
        #[arg(long)]
        upstream_url: Option<String>,
    },

    /// Validate configuration file
    CheckConfig,

    /// Synthesize text into a WAV file
    Synthesize {
        /// Text to speak, or "-" to read it from stdin
        #[arg(short, long)]
        text: String,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        voice: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        repetition_penalty: Option<f64>,
        /// Write chunks as they arrive instead of buffering
        #[arg(long)]
        stream: bool,
    },

    /// Print the playback URL a media player would fetch
    StreamUrl {
        /// Text to speak
        #[arg(short, long)]
        text: String,
        #[arg(long)]
        voice: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = cli.log_level.map(|level| level.to_string());
    init_tracing(level.as_deref(), cli.log_format);

    match cli.command {
        Commands::Run { port, upstream_url } => {
            run_proxy(cli.config.as_deref(), port, upstream_url).await?;
        }
        Commands::CheckConfig => {
            check_config(cli.config.as_deref())?;
        }
        Commands::Synthesize {
            text,
            output,
            voice,
            temperature,
            repetition_penalty,
            stream,
        } => {
            let overrides = synthesize_overrides(voice, temperature, repetition_penalty, stream);
            let text = if text == "-" {
                collect_text(stdin_pieces()).await?
            } else {
                text
            };
            synthesize(cli.config.as_deref(), text, &overrides, &output).await?;
        }
        Commands::StreamUrl { text, voice } => {
            print_stream_url(cli.config.as_deref(), text, voice)?;
        }
    }

    Ok(())
}

/// Run the proxy server
async fn run_proxy(
    config_path: Option<&Path>,
    port_override: Option<u16>,
    upstream_url_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config_or_exit(config_path);

    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(url) = upstream_url_override {
        config.synthesis.set_option(CONF_API_URL, url);
    }

    let defaults = RequestBuilder::from_config(&config.synthesis).defaults();
    tracing::info!(
        endpoint = %defaults.endpoint_url(),
        voice = %defaults.voice(),
        streaming = defaults.streaming(),
        "Synthesis defaults resolved"
    );

    run_server(config).await?;

    Ok(())
}

/// Validate configuration file
fn check_config(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => {
            let defaults = RequestBuilder::from_config(&config.synthesis).defaults();
            println!("✓ Configuration file is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("  Public URL: {}", config.server.public_base_url());
            println!("\nUpstream:");
            println!("  Timeout: {}s", config.upstream.timeout_seconds);
            println!("  Idle connections per host: {}", config.upstream.pool_max_idle_per_host);
            if let Some(ref tls) = config.upstream.tls {
                if tls.accept_invalid_certs {
                    println!("  TLS: Accepting invalid certificates");
                }
                if let Some(ref ca) = tls.ca_cert_path {
                    println!("  TLS CA: {}", ca);
                }
                if let Some(ref cert) = tls.client_cert_path {
                    println!("  TLS Client Cert: {}", cert);
                }
            }
            println!("\nSynthesis (resolved):");
            println!("  Endpoint: {}", defaults.endpoint_url());
            println!("  Voice: {}", defaults.voice());
            println!("  Temperature: {}", defaults.temperature());
            println!("  Repetition penalty: {}", defaults.repetition_penalty());
            println!("  Streaming: {}", defaults.streaming());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Overrides from the `synthesize` flags. Without `--stream` the stored
/// settings decide.
fn synthesize_overrides(
    voice: Option<String>,
    temperature: Option<f64>,
    repetition_penalty: Option<f64>,
    stream: bool,
) -> SynthesisOverrides {
    SynthesisOverrides {
        voice,
        temperature,
        repetition_penalty,
        streaming: stream.then_some(true),
        endpoint_url: None,
    }
}

/// Stdin as a stream of raw pieces, ending at EOF
fn stdin_pieces() -> impl Stream<Item = std::io::Result<Vec<u8>>> {
    futures::stream::unfold(Some(tokio::io::stdin()), |stdin| async move {
        let mut stdin = stdin?;
        let mut buf = vec![0u8; 4096];
        match stdin.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), Some(stdin)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

/// Writes relayed chunks to a file created when the relay commits
struct FileSink {
    path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl FileSink {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
        }
    }

    fn file(&mut self) -> Result<&mut tokio::fs::File, RelayError> {
        self.file
            .as_mut()
            .ok_or_else(|| RelayError::DownstreamWrite("output file not open".to_string()))
    }
}

#[async_trait]
impl AudioSink for FileSink {
    async fn prepare(&mut self, _head: StreamHead) -> Result<(), RelayError> {
        let file = tokio::fs::File::create(&self.path)
            .await
            .map_err(|e| RelayError::DownstreamWrite(format!("{}: {}", self.path.display(), e)))?;
        self.file = Some(file);
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), RelayError> {
        self.file()?
            .write_all(&chunk)
            .await
            .map_err(|e| RelayError::DownstreamWrite(e.to_string()))
    }

    async fn finish(&mut self) -> Result<(), RelayError> {
        self.file()?
            .flush()
            .await
            .map_err(|e| RelayError::DownstreamWrite(e.to_string()))
    }
}

/// Synthesize once and write the audio to `output`
async fn synthesize(
    config_path: Option<&Path>,
    text: String,
    overrides: &SynthesisOverrides,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_exit(config_path);
    let request = RequestBuilder::from_config(&config.synthesis).build(text, overrides);
    let relay = Relay::new(
        build_http_client(&config.upstream)?,
        Duration::from_secs(config.upstream.timeout_seconds),
    );

    println!("Synthesizing via {}", request.endpoint_url());

    let mut sink = FileSink::new(output);
    match relay.relay(&request, &mut sink).await {
        Ok(RelayOutcome::Buffered(buffer)) => {
            tokio::fs::write(output, &buffer.data).await?;
            println!("✓ Wrote {} bytes to {}", buffer.data.len(), output.display());
        }
        Ok(RelayOutcome::Streamed { chunks, bytes }) => {
            println!("✓ Streamed {} bytes in {} chunks to {}", bytes, chunks, output.display());
        }
        Ok(RelayOutcome::Interrupted { error, bytes, .. }) => {
            eprintln!("✗ Stream interrupted after {} bytes: {}", bytes, error);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("✗ Synthesis failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Print the playback URL for `text`
fn print_stream_url(
    config_path: Option<&Path>,
    text: String,
    voice: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_exit(config_path);
    let overrides = SynthesisOverrides {
        voice,
        ..SynthesisOverrides::streaming(true)
    };
    let request = RequestBuilder::from_config(&config.synthesis).build(text, &overrides);
    println!("{}", stream_url(&config.server.public_base_url(), &request)?);
    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: Option<&Path>) -> AppConfig {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => {
            tracing::debug!(path = ?config_path, "Configuration loaded");
            config
        }
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a config.yaml file.");
            eprintln!("You can copy config.yaml.default and modify it:");
            eprintln!("  cp config.yaml.default config.yaml");
            std::process::exit(1);
        }
    }
}
