use anyhow::Context;
use clap::{ArgAction, Parser};
use mediaprobe::{AnalyzeOptions, MediaFormat, analyze_with};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about = "Print container metadata of media files as JSON")]
struct Args {
    /// Media files to analyze
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Skip detection and read every file as this format (e.g. mp4, flac, webm)
    #[arg(long)]
    format: Option<MediaFormat>,

    /// Limit container nesting depth
    #[arg(long, default_value_t = mediaprobe::readers::DEFAULT_MAX_DEPTH)]
    max_depth: u32,

    /// Pretty-print each record
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,

    /// Log reader activity to stderr (RUST_LOG takes precedence)
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "mediaprobe=debug" } else { "mediaprobe=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut opts = AnalyzeOptions::default().with_max_depth(args.max_depth);
    if let Some(format) = args.format {
        opts = opts.with_format_hint(format);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut all_ok = true;
    for path in &args.paths {
        let record = analyze_with(path, &opts);
        for err in &record.errors {
            eprintln!("{}: {err}", path.display());
        }
        all_ok &= record.success;

        let json = if args.pretty {
            serde_json::to_string_pretty(&record)
        } else {
            serde_json::to_string(&record)
        }
        .with_context(|| format!("serializing record for {}", path.display()))?;
        writeln!(out, "{json}").context("writing to stdout")?;
    }

    Ok(if all_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
