//! CLI entry point for `mailformat`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{CommandFactory, Parser as ClapParser, Subcommand, ValueEnum};

use mailformat::cancel::CancellationToken;
use mailformat::config::Config;
use mailformat::formatter::{Formatter, Mode};
use mailformat::model::document::Document;
use mailformat::model::part_list::PartList;
use mailformat::parser::Parser;

#[derive(ClapParser)]
#[command(name = "mailformat", version, about = "Decompose and render MIME messages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a message as HTML (or its raw source)
    Render {
        path: PathBuf,
        #[arg(short, long, value_enum, default_value_t = ModeArg::Normal)]
        mode: ModeArg,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Render only the nested message with this `.rfc822` part id
        #[arg(long, value_name = "PART_ID")]
        part: Option<String>,
    },
    /// List the parts a message decomposes into
    Parts {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Normal,
    Source,
    Print,
    Raw,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => Mode::Normal,
            ModeArg::Source => Mode::Source,
            ModeArg::Print => Mode::Print,
            ModeArg::Raw => Mode::Raw,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mailformat::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Render {
            path,
            mode,
            output,
            part,
        } => cmd_render(&config, &path, mode.into(), output.as_deref(), part.as_deref()),
        Commands::Parts { path, json } => cmd_parts(&config, &path, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailformat::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailformat.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn build_parser(config: &Config) -> Parser {
    let parser = Parser::new().with_options(config.parser.to_options());
    if config.parser.inline_filter {
        parser
    } else {
        parser.with_inline_filter(None)
    }
}

fn parse_file(config: &Config, path: &Path) -> anyhow::Result<PartList> {
    if !path.exists() {
        anyhow::bail!("Message file not found: {}", path.display());
    }

    let start = Instant::now();
    let document = Arc::new(Document::from_path(path)?);
    let list = build_parser(config).parse_with_container(
        document,
        path.parent().map(|p| p.to_string_lossy().into_owned()),
        path.file_name().map(|n| n.to_string_lossy().into_owned()),
        &CancellationToken::new(),
    );
    tracing::info!(
        path = %path.display(),
        parts = list.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Decomposed message"
    );
    Ok(list)
}

fn cmd_render(
    config: &Config,
    path: &Path,
    mode: Mode,
    output: Option<&Path>,
    part: Option<&str>,
) -> anyhow::Result<()> {
    let list = parse_file(config, path)?;
    let (list, mode) = match part {
        Some(id) => match list.extract_nested(id) {
            Some(nested) => (nested, Mode::Raw),
            None => anyhow::bail!("No nested message with part id {id}"),
        },
        None => (list, mode),
    };

    let formatter = Formatter::new().with_options(config.formatter.to_options());
    let cancel = CancellationToken::new();

    match output {
        Some(out_path) => {
            let file = std::fs::File::create(out_path)?;
            let mut sink = std::io::BufWriter::new(file);
            formatter.format(&list, mode, &mut sink, &cancel)?;
            sink.flush()?;
            eprintln!("Wrote {}", out_path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut sink = stdout.lock();
            formatter.format(&list, mode, &mut sink, &cancel)?;
        }
    }
    Ok(())
}

fn cmd_parts(config: &Config, path: &Path, json: bool) -> anyhow::Result<()> {
    let list = parse_file(config, path)?;

    if json {
        let value = serde_json::json!({
            "file": path.to_string_lossy(),
            "part_count": list.len(),
            "validity": list.validity_found(),
            "parts": list.parts(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  {:<48} {:<40} FLAGS", "ID", "TYPE");
    for part in list.iter() {
        let mut flags = Vec::new();
        if part.is_hidden {
            flags.push("hidden");
        }
        if part.is_attachment {
            flags.push("attachment");
        }
        if part.is_error {
            flags.push("error");
        }
        if !part.is_printable {
            flags.push("no-print");
        }
        if part.attachment.as_ref().is_some_and(|a| a.shown) {
            flags.push("shown");
        }
        println!("  {:<48} {:<40} {}", part.id, part.content_type, flags.join(","));
    }
    println!();
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailformat", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}
