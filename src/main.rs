use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docbody::streaming::{
    copy, BufferedReader, BufferedWriter, ByteSink, ChunkedReader, ChunkedWriter, IoSink,
    IoSource, LimitedReader,
};
use docbody::{ChunkFraming, StreamConfig};

#[derive(Parser)]
#[command(name = "docbody")]
#[command(about = "Frame and unframe HTTP/1.1 message bodies on stdin/stdout")]
#[command(version)]
struct Cli {
    /// Stream configuration file (TOML)
    #[arg(short, long, global = true, env = "DOCBODY_CONFIG")]
    config: Option<PathBuf>,

    /// Chunk-assembly buffer size for encoding
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Largest chunk size accepted when decoding
    #[arg(long, global = true)]
    max_chunk_size: Option<u64>,

    /// Use RFC 7230 terminal framing (trailer section, chunk extensions)
    #[arg(long, global = true)]
    rfc7230: bool,

    /// Print a JSON summary to stderr when done
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk-encode stdin to stdout
    Encode,
    /// Decode a chunked body from stdin to stdout
    Decode,
    /// Copy at most N bytes of stdin to stdout
    Limit {
        #[arg(short, long)]
        bytes: u64,
    },
}

#[derive(Debug, Serialize)]
struct Summary {
    command: &'static str,
    bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    trailers: Vec<(String, String)>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docbody={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<StreamConfig> {
    let mut config = match &cli.config {
        Some(path) => StreamConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => StreamConfig::default(),
    };

    if let Some(size) = cli.chunk_size {
        config.chunk_size = size;
    }
    if let Some(limit) = cli.max_chunk_size {
        config.max_chunk_size = Some(limit);
    }
    if cli.rfc7230 {
        config.framing = ChunkFraming::Rfc7230;
    }
    config.validate()?;
    Ok(config)
}

fn stdout_writer(config: &StreamConfig) -> BufferedWriter<IoSink<io::StdoutLock<'static>>> {
    BufferedWriter::with_capacity(config.write_buffer_size, IoSink::new(io::stdout().lock()))
}

fn stdin_reader(config: &StreamConfig) -> BufferedReader<IoSource<io::StdinLock<'static>>> {
    BufferedReader::new(IoSource::with_capacity(
        config.read_buffer_size,
        io::stdin().lock(),
    ))
}

fn encode(config: &StreamConfig) -> Result<Summary> {
    let mut input = stdin_reader(config);
    let mut writer =
        ChunkedWriter::with_options(stdout_writer(config), config.chunk_size, config.framing);

    copy(&mut input, &mut writer)?;
    writer.close()?;

    Ok(Summary {
        command: "encode",
        bytes: writer.bytes_written(),
        chunks: Some(writer.chunks_written()),
        trailers: Vec::new(),
    })
}

fn decode(config: &StreamConfig) -> Result<Summary> {
    let mut reader = ChunkedReader::with_options(
        stdin_reader(config),
        config.framing,
        config.max_chunk_size,
    );
    let mut output = stdout_writer(config);

    copy(&mut reader, &mut output)?;
    output.flush()?;

    if let Some(err) = reader.chunk_error() {
        bail!("Invalid chunked body after {} bytes: {}", reader.bytes_read(), err);
    }

    Ok(Summary {
        command: "decode",
        bytes: reader.bytes_read(),
        chunks: Some(reader.chunks_read()),
        trailers: reader.trailers().to_vec(),
    })
}

fn limit(config: &StreamConfig, bytes: u64) -> Result<Summary> {
    let mut reader = LimitedReader::new(stdin_reader(config), bytes);
    let mut output = stdout_writer(config);

    let copied = copy(&mut reader, &mut output)?;
    output.flush()?;

    if copied < bytes {
        tracing::warn!("Input ended {} bytes before the limit", bytes - copied);
    }

    Ok(Summary {
        command: "limit",
        bytes: copied,
        chunks: None,
        trailers: Vec::new(),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = resolve_config(&cli)?;
    tracing::debug!("Using {:?}", config);

    let summary = match cli.command {
        Commands::Encode => encode(&config)?,
        Commands::Decode => decode(&config)?,
        Commands::Limit { bytes } => limit(&config, bytes)?,
    };

    tracing::info!("{}: {} body bytes", summary.command, summary.bytes);
    if cli.json {
        eprintln!("{}", serde_json::to_string(&summary)?);
    }

    Ok(())
}
