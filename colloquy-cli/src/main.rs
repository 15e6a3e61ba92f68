//! colloquy: console dialog system.
//!
//! Wires the bundled lecturer domain (or any `--domain-file`) into a
//! session, reads user turns from stdin and prints system turns to
//! stdout. Shutdown is always attempted, whatever ends the dialog.

mod logging;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colloquy::colloquy_services::topics::{GEN_USER_UTTERANCE, SYS_NOTICE, SYS_UTTERANCE, USER_UTTERANCE};
use colloquy::prelude::*;
use logging::LogLevel;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// The domain used when no `--domain-file` is given.
const BUNDLED_DOMAIN: &str = include_str!("../resources/lecturers.json");

/// Output format of `--debug` graph introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GraphFormat {
    /// Structural description as JSON.
    Json,
    /// Graphviz DOT.
    Dot,
}

/// colloquy - modular dialog system on the console
#[derive(Parser, Debug)]
#[command(name = "colloquy")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug mode: per-event session logging and graph output
    #[arg(long)]
    debug: bool,

    /// Console log level
    #[arg(long, value_enum, default_value = "results")]
    log: LogLevel,

    /// File log level; anything but `none` also writes conversation logs
    #[arg(long, value_enum, default_value = "none")]
    log_file: LogLevel,

    /// Directory for the full log and the conversation logs
    #[arg(long, value_name = "PATH", default_value = "./conversation_logs")]
    log_dir: PathBuf,

    /// Enable hardware acceleration for services that support it
    #[arg(long)]
    cuda: bool,

    /// Mask user utterances in conversation logs
    #[arg(long)]
    privacy: bool,

    /// Domain description to load instead of the bundled lecturers domain
    #[arg(long, value_name = "PATH")]
    domain_file: Option<PathBuf>,

    /// Predict backchannels and feed them to generation
    #[arg(long)]
    backchannel: bool,

    /// Stop after this many turns
    #[arg(long, value_name = "N")]
    max_turns: Option<u64>,

    /// Format of the graph printed with --debug
    #[arg(long, value_enum, default_value = "dot")]
    graph_format: GraphFormat,
}

async fn load_domain(args: &Args) -> Result<DomainFile> {
    match &args.domain_file {
        Some(path) => DomainFile::load(path)
            .await
            .with_context(|| format!("loading domain file {}", path.display())),
        None => DomainFile::from_json(BUNDLED_DOMAIN).context("parsing the bundled domain"),
    }
}

/// Register the domain, its pipeline, console output and the tracker.
async fn build_session(args: &Args) -> Result<Session> {
    let file = load_domain(args).await?;
    let domain = file.domain();

    let mut config = SessionConfig::default();
    if let Some(max_turns) = args.max_turns {
        config = config.with_max_turns(max_turns);
    }

    let mut builder = Session::builder(config);
    builder.add_domain(domain.clone())?;
    for stage in domain_pipeline(&domain, args.backchannel) {
        builder.register_boxed(stage)?;
    }
    builder.register(ConsoleOutput::new("console_output", SYS_UTTERANCE))?;
    builder.register(ConsoleOutput::new("console_notice", SYS_NOTICE))?;
    builder.register(
        DomainTracker::new("domain_tracker").with_domain(&domain, file.keywords.iter().cloned()),
    )?;
    if args.backchannel {
        builder.register(BackchannelPredictor::new("backchannel_predictor"))?;
    }

    if args.debug {
        builder.add_hook(Arc::new(TracingHook::new().with_values(true)));
    }
    if args.log_file != LogLevel::None {
        let mut log = ConversationLog::new(&args.log_dir);
        if args.privacy {
            log = log.with_masked_topics([GEN_USER_UTTERANCE, USER_UTTERANCE]);
        }
        builder.add_hook(Arc::new(log));
    }

    builder.start().await.context("starting the dialog system")
}

fn write_graph(session: &Session, format: GraphFormat, out: &mut dyn Write) -> Result<()> {
    let graph = session.render_graph();
    match format {
        GraphFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&graph)?)?,
        GraphFormat::Dot => write!(out, "{}", graph.to_dot())?,
    }
    out.flush()?;
    Ok(())
}

/// Print the graph; the services are already initialised, so release them
/// if that fails.
async fn show_graph(session: &mut Session, format: GraphFormat, out: &mut dyn Write) -> Result<()> {
    if let Err(e) = write_graph(session, format, out) {
        session.shutdown().await;
        return Err(e.context("printing the pipeline graph"));
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    if args.cuda {
        tracing::warn!("--cuda has no effect: none of the bundled services use a GPU");
    }

    let mut session = build_session(&args).await?;
    if !session.is_consistent() {
        eprint!("{}", session.report());
    }
    if args.debug {
        show_graph(&mut session, args.graph_format, &mut std::io::stdout()).await?;
    }

    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop("interrupted");
        }
    });

    let mut input = ConsoleInput::stdin().with_prompt(">>> ");
    let outcome = session.run(&mut input).await;

    for failure in &outcome.shutdown.failures {
        tracing::error!(service = %failure.service, error = %failure.error, "colloquy.shutdown.failed");
    }
    match outcome.result {
        Ok(reason) => {
            tracing::info!(turns = outcome.turns, reason = ?reason, "dialog finished");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("dialog failed after {} turn(s)", outcome.turns))),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = logging::init(args.log, args.log_file, args.debug, &args.log_dir) {
        eprintln!("Error: cannot set up logging: {e:?}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: cannot start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(args));
    // The stdin reader thread cannot be cancelled; don't wait for it.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("##### EXCEPTION #####\n{e:?}");
            ExitCode::FAILURE
        }
    }
}
