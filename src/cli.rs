use crate::api::EngineClient;
use crate::model::{ClientConfig, Mode};
use crate::orchestrator::{self, Navigator, SaveToDir};
use crate::session::{ActionKind, SessionState};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "artifact-desk",
    version,
    about = "Convert raw text into structured engine artifacts, with an optional TUI"
)]
pub struct Cli {
    /// Base URL of the engine API
    #[arg(long, env = "ENGINE_API_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// API key sent as X-API-Key (omitted when empty)
    #[arg(long, env = "ENGINE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Conversion mode: plan, product, code or decision
    #[arg(long, default_value_t = Mode::Plan)]
    pub mode: Mode,

    /// Read raw input from a file ("-" for stdin) and convert it
    #[arg(long, conflicts_with = "artifact_id")]
    pub input: Option<PathBuf>,

    /// Load an existing artifact by id
    #[arg(long)]
    pub artifact_id: Option<String>,

    /// After loading the artifact, export it and save the ZIP (headless only)
    #[arg(long)]
    pub download: bool,

    /// Directory for downloaded exports [default: user download dir, else cwd]
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Print the artifact as JSON and exit (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Tracing filter, e.g. "debug" or "artifact_desk=trace"
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        self.json || self.text
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone(), self.api_key.clone())
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.download && !args.is_headless() {
        return Err(anyhow::anyhow!(
            "--download can only be used with --json or --text. Use the TUI's Ctrl-D otherwise."
        ));
    }

    if !args.is_headless() {
        #[cfg(feature = "tui")]
        {
            crate::logging::init(&args.log_level, crate::logging::LogTarget::File)?;
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return Err(anyhow::anyhow!(
                "built without TUI support; use --json or --text"
            ));
        }
    }

    crate::logging::init(&args.log_level, crate::logging::LogTarget::Stderr)?;
    run_headless(args).await
}

/// Build the engine client and the default navigator from CLI arguments.
pub(crate) fn build_client(args: &Cli) -> Result<(EngineClient, SaveToDir)> {
    let client = EngineClient::new(&args.client_config()).context("configure engine client")?;
    let dir = match args.download_dir.clone() {
        Some(d) => d,
        None => SaveToDir::default_dir()?,
    };
    let navigator = SaveToDir::new(client.clone(), dir);
    Ok((client, navigator))
}

/// Read raw input from a file, or stdin when the path is "-".
fn read_raw_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read raw input from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("read raw input {}", path.display()))
}

/// Run one action to completion, folding every outcome into `state`.
/// Returns the error message left by the action, if any.
pub(crate) async fn perform<N: Navigator>(
    client: &EngineClient,
    navigator: &N,
    state: &mut SessionState,
    kind: ActionKind,
) -> Result<Option<String>> {
    let action = state.begin(kind)?;
    let mut outcomes = Vec::new();
    orchestrator::execute(client, navigator, &action.request, |o| outcomes.push(o)).await;
    for o in outcomes {
        state.apply(&action.ticket, o);
    }
    state.finish(&action.ticket);
    Ok((!state.error.is_empty()).then(|| state.error.clone()))
}

async fn run_headless(args: Cli) -> Result<()> {
    let (client, navigator) = build_client(&args)?;
    let mut state = SessionState::new(args.mode);

    let (out_tx, out_handle) = spawn_output_writer();

    // A failed health check is reported but does not stop the run, as in the TUI.
    if let Some(err) = perform(&client, &navigator, &mut state, ActionKind::Startup).await? {
        let _ = out_tx.send(OutputLine::Stderr(format!("Warning: {err}")));
    }

    let kind = if let Some(path) = args.input.as_deref() {
        state.raw_input = read_raw_input(path)?;
        ActionKind::Convert
    } else if let Some(id) = args.artifact_id.as_deref() {
        state.artifact_id = id.to_string();
        ActionKind::Load
    } else {
        return Err(anyhow::anyhow!(
            "nothing to do: pass --input <PATH|-> to convert or --artifact-id <ID> to load"
        ));
    };

    if let Some(err) = perform(&client, &navigator, &mut state, kind).await? {
        return Err(anyhow::anyhow!(err));
    }
    if kind == ActionKind::Convert {
        let _ = out_tx.send(OutputLine::Stderr(format!(
            "Artifact ID: {}",
            state.artifact_id
        )));
    }

    if args.download {
        if let Some(err) = perform(&client, &navigator, &mut state, ActionKind::Download).await? {
            return Err(anyhow::anyhow!(err));
        }
    }

    if args.json {
        let artifact = state.artifact.as_ref().context("no artifact loaded")?;
        let out = serde_json::to_string_pretty(artifact)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
        if let Some(p) = state.last_download.as_ref().and_then(|d| d.path.as_ref()) {
            let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", p.display())));
        }
    } else {
        let summary = crate::text_summary::build_text_summary(&state)?;
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
