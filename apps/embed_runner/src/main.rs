use std::{fs, path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use embed_core::{
    EmbedContext, EmbedViews, ExecutionPipeline, HttpCompileService, Orchestrator,
    OrchestratorError, OrchestratorOptions, ProcessExecutionEnvironment,
};
use shared::domain::TabKind;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod terminal;

use config::load_settings;
use terminal::{TerminalConsole, TerminalControl, TerminalTabView};

#[derive(Parser, Debug)]
#[command(about = "Compile a snippet with its test method and run it headless")]
struct Args {
    /// File holding the user's source snippet.
    #[arg(long)]
    source: PathBuf,
    /// File holding the test method appended after the source.
    #[arg(long)]
    test: Option<PathBuf>,
    #[arg(long, default_value = "embed.toml")]
    config: PathBuf,
    /// Overrides `compile_url` from settings.
    #[arg(long)]
    compile_url: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(url) = args.compile_url {
        settings.compile_url = url;
    }
    settings.validate()?;

    let source = fs::read_to_string(&args.source)
        .with_context(|| format!("failed to read source '{}'", args.source.display()))?;
    let test_method = match &args.test {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read test method '{}'", path.display()))?,
        None => String::new(),
    };

    let context = Arc::new(EmbedContext::new(
        source,
        test_method,
        settings.reconcile_delay(),
    ));
    let pipeline = Arc::new(ExecutionPipeline::with_compile_timeout(
        Arc::new(HttpCompileService::new(settings.compile_url.clone())),
        Arc::new(ProcessExecutionEnvironment::from_command_line(
            &settings.runner_command,
        )?),
        settings.compile_timeout(),
    ));
    let views = EmbedViews {
        editor_tab: Arc::new(TerminalTabView::new(TabKind::Editor)),
        test_tab: Arc::new(TerminalTabView::new(TabKind::Test)),
        console_tab: Arc::new(TerminalTabView::new(TabKind::Console)),
        console: Arc::new(TerminalConsole),
        test_control: Arc::new(TerminalControl::new("test-submit")),
    };
    let mut orchestrator = Orchestrator::new(
        context,
        pipeline,
        views,
        OrchestratorOptions {
            focus_console_on_run: settings.focus_console_on_run,
        },
    )?;
    orchestrator.select_tab(TabKind::Editor.as_str())?;

    info!(compile_url = %settings.compile_url, "submitting snippet");
    let handle = match orchestrator.submit_tests().await {
        Ok(handle) => handle,
        Err(OrchestratorError::Pipeline(err)) => {
            error!("run aborted: {err}");
            return Ok(ExitCode::from(2));
        }
        Err(err) => return Err(err.into()),
    };

    let relayed = handle.finished().await;
    orchestrator.drain_console().await;
    debug!(relayed, "console drained");

    if orchestrator.tests_disabled() {
        info!("tests passed");
        Ok(ExitCode::SUCCESS)
    } else {
        info!("tests did not pass");
        Ok(ExitCode::FAILURE)
    }
}
