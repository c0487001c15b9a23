use anyhow::{bail, Context};
use clap::Parser;
use rag_chat::infrastructure::logging;
use rag_chat::setup::{self, EnvFileOutcome, OPTIONAL_TOOL};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Prepare a checkout for running the document chat service.
#[derive(Debug, Parser)]
#[command(name = "setup", version, about)]
struct Args {
    /// Project root to set up.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Skip `cargo build --release` and only verify what is already built.
    #[arg(long)]
    skip_install: bool,

    /// Answer yes to install prompts.
    #[arg(long, short = 'y')]
    yes: bool,

    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level, false, std::io::stderr);

    let root = std::path::absolute(&args.root)
        .with_context(|| format!("invalid root {}", args.root.display()))?;
    info!(root = %root.display(), "RAG Chat Assistant setup");

    let version = setup::check_toolchain().inspect_err(|e| error!(error = %e, "toolchain check failed"))?;
    info!(%version, "rustc version is compatible");

    let mut use_cache = setup::tool_available(OPTIONAL_TOOL);
    if use_cache {
        info!(tool = OPTIONAL_TOOL, "optional tool found");
    } else {
        warn!(tool = OPTIONAL_TOOL, "optional tool not installed");
        let question = format!("Install {OPTIONAL_TOOL} with `cargo install {OPTIONAL_TOOL} --locked`? [y/N] ");
        if confirm(args.yes, &question) {
            match setup::install_optional_tool() {
                Ok(()) => {
                    info!(tool = OPTIONAL_TOOL, "optional tool installed");
                    use_cache = true;
                }
                Err(e) => warn!(error = %e, "could not install optional tool, continuing without it"),
            }
        } else {
            info!(tool = OPTIONAL_TOOL, "continuing without optional tool");
        }
    }

    for dir in setup::ensure_directories(&root)? {
        info!(path = %dir.display(), "created directory");
    }

    match setup::create_env_file(&root)? {
        EnvFileOutcome::AlreadyPresent => info!(".env file already exists, skipping"),
        EnvFileOutcome::CopiedFromExample => {
            info!("created .env from .env.example");
            warn!("edit .env and add your OpenAI API key");
        }
        EnvFileOutcome::WrittenDefault => {
            info!("created .env from the built-in template");
            warn!("edit .env and add your OpenAI API key");
        }
    }

    if args.skip_install {
        info!("skipping build");
    } else {
        info!("building release binaries");
        setup::install(&root, use_cache).inspect_err(|e| error!(error = %e, "setup failed during installation"))?;
    }

    let missing = setup::verify_installation(&root);
    for name in &missing {
        error!(binary = %name, path = %setup::binary_path(&root, name).display(), "missing");
    }
    if !missing.is_empty() {
        bail!("{} required binaries missing", missing.len());
    }

    info!("setup completed successfully");
    info!("next: edit .env, then run target/release/api and open http://localhost:8501");
    info!("or: docker build -t rag-chat . && docker run -p 8501:8501 -v $(pwd)/data:/app/data rag-chat");
    Ok(())
}

/// Asks on stderr; a non-interactive stdin counts as no unless `assume_yes` is set.
fn confirm(assume_yes: bool, question: &str) -> bool {
    if assume_yes {
        return true;
    }
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return false;
    }

    let mut stderr = std::io::stderr();
    if write!(stderr, "{question}").and_then(|_| stderr.flush()).is_err() {
        return false;
    }
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer).is_ok() && setup::parse_confirmation(&answer)
}
