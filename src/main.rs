use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tower_lsp::{LspService, Server};
use tracing::info;

use kanji_esperanto_server::config::EngineConfig;
use kanji_esperanto_server::dictionary::tools::{
    dedupe_items, parse_ke_text, parse_vscode_snippets, read_document, split_into_buckets,
    write_document, write_shards,
};
use kanji_esperanto_server::engine::Engine;
use kanji_esperanto_server::logging::init_logger;
use kanji_esperanto_server::lsp::KanjiBackend;

#[derive(Parser)]
#[command(
    name = "kanji-esperanto-server",
    version,
    about = "Kanji Esperanto root completion server"
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for stderr (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable ANSI colors in stderr output
    #[arg(long, global = true)]
    no_color: bool,

    /// Do not write a session log file
    #[arg(long, global = true)]
    no_file_logging: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the language server over stdio (default)
    Serve(ServeArgs),
    /// Resolve completions for one line and print them as JSON
    Complete(CompleteArgs),
    /// Convert a `.ke.txt` word list into a dictionary document
    ConvertText(ConvertArgs),
    /// Convert a VS Code snippets file into a dictionary document
    ConvertSnippets(ConvertArgs),
    /// Split a dictionary document into per-letter shards
    Split(SplitArgs),
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Shard directory (overrides the config file)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Static fallback document used when a shard yields nothing
    #[arg(long)]
    fallback: Option<PathBuf>,

    /// Do not persist the edited documents
    #[arg(long)]
    no_snapshots: bool,
}

#[derive(Args)]
struct CompleteArgs {
    /// Shard directory (overrides the config file)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Static fallback document used when a shard yields nothing
    #[arg(long)]
    fallback: Option<PathBuf>,

    /// Line text
    line: String,

    /// Caret column in characters (defaults to the end of the line)
    #[arg(long)]
    column: Option<usize>,
}

#[derive(Args)]
struct ConvertArgs {
    input: PathBuf,

    #[arg(default_value = "all.json")]
    output: PathBuf,
}

#[derive(Args)]
struct SplitArgs {
    #[arg(default_value = "all.json")]
    source: PathBuf,

    #[arg(default_value = "data")]
    out_dir: PathBuf,
}

fn load_config(
    path: Option<&Path>,
    data: Option<PathBuf>,
    fallback: Option<PathBuf>,
) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(data) = data {
        config.data_dir = data;
    }
    if fallback.is_some() {
        config.fallback_file = fallback;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve(ServeArgs::default()));

    // Tooling commands only log to stderr
    let file_logging = !cli.no_file_logging && matches!(command, Command::Serve(_));
    let _guard = init_logger(cli.no_color, cli.log_level.as_deref(), file_logging)
        .context("Failed to initialize logging")?;

    match command {
        Command::Serve(args) => {
            let config = load_config(cli.config.as_deref(), args.data, args.fallback)?;
            serve(config, !args.no_snapshots).await
        }
        Command::Complete(args) => {
            let config = load_config(cli.config.as_deref(), args.data, args.fallback)?;
            complete(config, &args.line, args.column).await
        }
        Command::ConvertText(args) => {
            let text = std::fs::read_to_string(&args.input)
                .with_context(|| format!("Failed to read {}", args.input.display()))?;
            let items = dedupe_items(parse_ke_text(&text));
            info!("Parsed {} items from {}", items.len(), args.input.display());
            write_document(&args.output, items)
        }
        Command::ConvertSnippets(args) => {
            let text = std::fs::read_to_string(&args.input)
                .with_context(|| format!("Failed to read {}", args.input.display()))?;
            let items = dedupe_items(parse_vscode_snippets(&text)?);
            info!("Converted {} items from {}", items.len(), args.input.display());
            write_document(&args.output, items)
        }
        Command::Split(args) => {
            let document = read_document(&args.source)?;
            write_shards(&args.out_dir, split_into_buckets(document.items))?;
            Ok(())
        }
    }
}

async fn serve(config: EngineConfig, enable_snapshots: bool) -> Result<()> {
    info!("Starting kanji-esperanto-server {}", env!("CARGO_PKG_VERSION"));
    let engine = Engine::from_config(config)?;

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(move |client| {
        KanjiBackend::new(Arc::new(client), engine, enable_snapshots)
    })
    .custom_method("kanjiEsperanto/metrics", KanjiBackend::metrics)
    .finish();

    Server::new(stdin, stdout, socket).serve(service).await;
    info!("Language server stopped");
    Ok(())
}

async fn complete(config: EngineConfig, line: &str, column: Option<usize>) -> Result<()> {
    let engine = Engine::from_config(config)?;
    engine.start();

    let column = column.unwrap_or_else(|| line.chars().count());
    let list = engine.provider().complete_line(line, column).await;
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}
