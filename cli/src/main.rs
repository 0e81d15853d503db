//! CLI entrypoint for tactica
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod commands;
mod output;

use anyhow::{Context, Result, bail};
use clap::Parser;
use commands::{Cli, Command};
use output::ConsoleFormatter;
use std::path::Path;
use std::sync::Arc;
use tactica_application::{
    CollectingDiagnostics, CompositeDiagnosticSink, DiagnosticSink, DispatchReport,
    LoadPackagesUseCase, RuntimeSettings, ScriptRuntimePort, SpawnMobInput, SpawnMobUseCase,
};
use tactica_domain::{Field, share};
use tactica_infrastructure::{
    ConfigLoader, FileConfig, JsonlDiagnosticLogger, TracingDiagnosticSink,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::ShowConfig = cli.command {
        for line in ConfigLoader::describe_sources() {
            println!("{}", line);
        }
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };

    // Keep the guard alive so buffered log lines are flushed on exit
    let _guard = init_logging(cli.verbose, config.logging.file.as_deref());
    info!("Starting tactica");

    for issue in config.validate() {
        warn!("Config: {}", issue);
    }

    let mut settings = config.runtime_settings();
    if let Some(mods) = &cli.mods {
        settings = settings.with_mods_root(mods);
    }

    // === Dependency Injection ===
    let collected = Arc::new(CollectingDiagnostics::new());
    let diagnostics = diagnostic_sink(&config, collected.clone());
    let runtime = create_runtime(settings.clone(), diagnostics)?;
    if !runtime.is_available() {
        bail!("This build has no scripting support. Rebuild with --features scripting.");
    }

    let outcome = run(&cli.command, &runtime, &settings);
    print!("{}", ConsoleFormatter::diagnostics(&collected.snapshot()));
    runtime.shutdown()?;
    outcome
}

fn run(
    command: &Command,
    runtime: &Arc<dyn ScriptRuntimePort>,
    settings: &RuntimeSettings,
) -> Result<()> {
    match command {
        Command::Check => {
            let output = LoadPackagesUseCase::new(runtime.clone(), settings.clone()).execute();
            print!("{}", ConsoleFormatter::packages(&output));
            if !output.failures.is_empty() {
                bail!("{} package(s) failed to load", output.failures.len());
            }
        }
        Command::Spawn {
            mob,
            frames,
            width,
            height,
        } => {
            let packages = LoadPackagesUseCase::new(runtime.clone(), settings.clone()).execute();
            if !packages.failures.is_empty() {
                warn!(
                    failed = packages.failures.len(),
                    "Some packages failed to load; spawning anyway"
                );
            }

            let field = share(Field::new(*width, *height));
            let spawned = SpawnMobUseCase::new(runtime.clone())
                .execute(SpawnMobInput::new(mob, field.clone()))
                .context("Failed to spawn mob")?;

            let mut report = DispatchReport::default();
            for _ in 0..*frames {
                report.merge(runtime.update(&field, 1)?);
            }
            print!("{}", ConsoleFormatter::spawn(&spawned, &report, *frames));
        }
        Command::Api => {
            print!("{}", ConsoleFormatter::api(&runtime.api_surface()));
        }
        Command::ShowConfig => {}
    }
    Ok(())
}

/// stderr logging filtered by verbosity, plus an optional plain-text log file.
fn init_logging(verbose: u8, file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };
    let registry = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr),
    );

    let Some((dir, name)) = file.and_then(|path| Some((path.parent()?, path.file_name()?))) else {
        registry.init();
        return None;
    };
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}

/// Every diagnostic goes to tracing, the console summary and, if configured, a JSONL file.
fn diagnostic_sink(
    config: &FileConfig,
    collected: Arc<CollectingDiagnostics>,
) -> Arc<dyn DiagnosticSink> {
    let mut sinks: Vec<Arc<dyn DiagnosticSink>> =
        vec![Arc::new(TracingDiagnosticSink), collected];
    if let Some(path) = &config.logging.diagnostics_jsonl {
        match JsonlDiagnosticLogger::new(path) {
            Some(logger) => {
                info!(path = %logger.path().display(), "Writing script diagnostics");
                sinks.push(Arc::new(logger));
            }
            None => warn!(path = %path.display(), "Diagnostic log disabled"),
        }
    }
    Arc::new(CompositeDiagnosticSink::new(sinks))
}

#[cfg(feature = "scripting")]
fn create_runtime(
    settings: RuntimeSettings,
    diagnostics: Arc<dyn DiagnosticSink>,
) -> Result<Arc<dyn ScriptRuntimePort>> {
    let runtime = tactica_infrastructure::LuaScriptRuntime::new(settings, diagnostics)
        .context("Failed to set up the script bindings")?;
    Ok(Arc::new(runtime))
}

#[cfg(not(feature = "scripting"))]
fn create_runtime(
    _settings: RuntimeSettings,
    _diagnostics: Arc<dyn DiagnosticSink>,
) -> Result<Arc<dyn ScriptRuntimePort>> {
    Ok(Arc::new(tactica_application::NoScriptRuntime))
}
