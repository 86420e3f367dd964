use browser_remedy::testing::{ScriptedDriver, ScriptedSemanticLocator};
use browser_remedy::{
    standard_registry, ClassifierConfig, ErrorClassifier, ExecutionContext, FailureRecord,
    LocatorKind, RecoveryConfig, RecoveryOrchestrator, SelectorConfig, SelectorHealthTracker,
    SelectorRecord,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

/// Run a scripted element-drift scenario through the recovery engine and
/// print the result plus the exported read models.
#[derive(Parser, Debug)]
#[command(name = "browser-remedy", about = "Recovery engine demo")]
struct Args {
    /// Attempt ceiling per recovery episode
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,

    /// Episode timeout in milliseconds
    #[arg(long, default_value_t = 60_000)]
    timeout_ms: u64,

    /// Emit the read models as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    info!("Starting recovery engine demo: drifted save button on the menus page");

    // A back-office page where the save button's id changed under us
    let driver = Arc::new(
        ScriptedDriver::new()
            .with_url("https://pos.example.com/restaurants/menus")
            .with_resolvable("button[data-testid=\"save\"]"),
    );

    let classifier = Arc::new(ErrorClassifier::standard(ClassifierConfig {
        site_domains: vec!["pos.example.com".to_string()],
        ..Default::default()
    }));

    let tracker = Arc::new(SelectorHealthTracker::new(SelectorConfig::default()));
    tracker.register_selector(SelectorRecord {
        id: "menus-save".to_string(),
        locator: "#save-button".to_string(),
        kind: LocatorKind::Css,
        description: "save button on the menu editor".to_string(),
        critical: true,
        alternatives: vec!["button[data-testid=\"save\"]".to_string()],
    })?;

    let orchestrator = RecoveryOrchestrator::new(
        driver.clone(),
        classifier.clone(),
        tracker.clone(),
        standard_registry(),
        RecoveryConfig {
            max_recovery_attempts: args.max_attempts,
            recovery_timeout_ms: args.timeout_ms,
            ..Default::default()
        },
    )?
    .with_semantic_locator(Arc::new(ScriptedSemanticLocator::new().with_semantic_hit(true)));

    let session = driver.session();
    let failure = FailureRecord::new("AutomationError", "Element not found: #save-button");
    let context = ExecutionContext::new("demo-session", "demo-client", "update_menu")
        .with_url("https://pos.example.com/restaurants/menus")
        .with_locator("#save-button");

    let result = orchestrator.recover(&session, &failure, &context).await;

    if result.success {
        info!(
            strategy = result.strategy_used.as_deref().unwrap_or("-"),
            attempts = result.attempts,
            "operation recovered"
        );
    } else {
        error!(
            reason = %result.reason.map(|r| r.to_string()).unwrap_or_default(),
            "recovery failed"
        );
    }

    let health = tracker.check_all_selectors(driver.as_ref(), &session).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        println!("{}", serde_json::to_string_pretty(&orchestrator.statistics())?);
        println!("{}", serde_json::to_string_pretty(&classifier.statistics())?);
        println!("{}", serde_json::to_string_pretty(&health)?);
    } else {
        info!(
            classification = %result.classification.label(),
            strategies = ?result.strategies_attempted,
            "episode summary"
        );
        let stats = orchestrator.statistics();
        info!(
            total = stats.total_episodes,
            successful = stats.successful,
            failed = stats.failed,
            "orchestrator statistics"
        );
        info!(score = health.score, passed = health.passed, total = health.total,
            "selector health");
        for problematic in tracker.problematic_selectors() {
            info!(
                selector = %problematic.record.id,
                status = ?problematic.status,
                streak = problematic.failure_streak,
                "selector needs attention"
            );
        }
    }

    Ok(())
}
