//! anima binary - composition root.
//!
//! Ties the workspace crates into a single executable:
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialize tracing with an env-filter
//! 3. Register the enabled components with the registry (explicit startup
//!    phase; components never self-discover)
//! 4. Build the turn pipeline and per-conversation router
//! 5. Feed it model replies from a script file or interactively from stdin
//!
//! The reasoning backend here is the scripted one: correction replies come
//! from the script file's trailing blocks. Hosting a live model behind the
//! `ReasoningBackend` trait is a deployment concern, not this binary's.

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use anima_components::{ConsoleInterface, NoteProvider, ReminderProvider, ShellProvider};
use anima_core::config::{AnimaConfig, ComponentsConfig};
use anima_core::AnimaError;
use anima_pipeline::{
    Component, ComponentRegistry, ConversationRouter, InMemoryEventStore, MessageOrigin,
    ReasoningBackend, ScheduledEventStore, ScriptedBackend, TurnPipeline, TurnReport,
};

use cli::CliArgs;

#[tokio::main]
async fn main() -> anima_core::Result<()> {
    let args = CliArgs::parse();

    let config_path = args.resolve_config_path();
    let mut config = AnimaConfig::load_or_default(&config_path);
    config.pipeline.default_interface =
        args.resolve_default_interface(config.pipeline.default_interface.as_deref());

    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(config = %config_path.display(), "anima starting");

    // Startup phase: every enabled component registers explicitly.
    let registry = Arc::new(ComponentRegistry::new());
    let event_store = Arc::new(InMemoryEventStore::new());
    register_components(&registry, &event_store, &config.components);
    info!(
        components = registry.len(),
        actions = registry.supported_action_types().len(),
        "Components registered"
    );

    let backend = Arc::new(ScriptedBackend::new());
    let pipeline = Arc::new(TurnPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&event_store) as Arc<dyn ScheduledEventStore>,
        Arc::clone(&backend) as Arc<dyn ReasoningBackend>,
        &config.pipeline,
    ));

    // Audit stream to the debug log.
    let mut audit = pipeline.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = audit.recv().await {
            debug!(event = ?event, "pipeline event");
        }
    });

    let router = ConversationRouter::new(Arc::clone(&pipeline));

    match args.script {
        Some(path) => run_script(&router, &backend, &path).await,
        None => run_interactive(&router).await,
    }
}

/// Register the bundled components enabled in configuration.
fn register_components(
    registry: &Arc<ComponentRegistry>,
    event_store: &Arc<InMemoryEventStore>,
    components: &ComponentsConfig,
) {
    if components.console {
        registry.register(Arc::new(ConsoleInterface::new()) as Arc<dyn Component>);
    }
    if components.reminders {
        registry.register(
            Arc::new(ReminderProvider::new(Arc::clone(event_store))) as Arc<dyn Component>,
        );
    }
    if components.shell {
        registry.register(Arc::new(ShellProvider::new()) as Arc<dyn Component>);
    }
    if components.notes {
        registry.register(Arc::new(NoteProvider::new()) as Arc<dyn Component>);
    }
}

/// Offline mode: the first `---`-separated block of the file is the model
/// reply for one turn; the remaining blocks feed correction rounds.
async fn run_script(
    router: &ConversationRouter,
    backend: &ScriptedBackend,
    path: &std::path::Path,
) -> anima_core::Result<()> {
    let content = std::fs::read_to_string(path)?;
    let mut blocks = content.split("\n---\n").map(str::trim).filter(|b| !b.is_empty());

    let turn = blocks
        .next()
        .ok_or_else(|| AnimaError::Config(format!("script {} is empty", path.display())))?
        .to_string();
    for correction_reply in blocks {
        backend.push_reply(correction_reply);
    }

    let origin = MessageOrigin::from("console:script");
    let report = router
        .submit(origin, turn)
        .await
        .map_err(|_| AnimaError::ShuttingDown)?;
    print_report(&report);
    router.shutdown();
    Ok(())
}

/// Interactive mode: each stdin line is one model reply for the local
/// conversation. EOF ends the session.
async fn run_interactive(router: &ConversationRouter) -> anima_core::Result<()> {
    println!("anima interactive mode — paste one model reply per line, Ctrl-D to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let origin = MessageOrigin::from("console:local");
        match router.submit(origin, line).await {
            Ok(report) => print_report(&report),
            Err(_) => break,
        }
    }

    router.shutdown();
    info!("anima shutting down");
    Ok(())
}

fn print_report(report: &TurnReport) {
    for record in &report.dispatched {
        println!(
            "✓ {} -> {}: {}",
            record.action, record.component, record.output.summary
        );
    }
    for failure in &report.failures {
        println!("✗ {}: {}", failure.action, failure.reason);
    }
    if report.dropped_fragments > 0 {
        println!("({} malformed fragment(s) dropped)", report.dropped_fragments);
    }
    if report.dispatched.is_empty() && report.failures.is_empty() {
        println!("(no actions in reply)");
    }
}
