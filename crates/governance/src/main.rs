//! governance - Trust-gated communication between supervised sub-units
//!
//! "No single evaluator decides. No sub-unit talks unsupervised."

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use governance::{
    audit::{AuditEntry, AuditQuery, EventKind},
    collab::{DomainClassifier, KeywordClassifier},
    config::GovernanceConfig,
    evaluator::TrustEvaluator,
    policy::Verdict,
    Coordinator,
};
use subagentic_core::{format, Paths};

/// governance - Trust-gated communication between supervised sub-units
#[derive(Parser)]
#[command(name = "governance")]
#[command(version = "0.1.0")]
#[command(about = "Trust governance and mediated communication for sub-units")]
#[command(long_about = "Trust governance and mediated communication for sub-units.\n\n\
    Every inbound message is scored by several independent evaluators.\n\
    One flag vetoes it; otherwise the scores must converge before their\n\
    average is compared against the policy threshold.")]
pub struct Cli {
    /// Config file (defaults to ~/.config/subagentic/governance.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    #[command(about = "Initialize default governance configuration")]
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    #[command(about = "Print the effective configuration as YAML")]
    Config,

    /// Classify an intent into a domain
    #[command(about = "Classify a free-text intent into a domain")]
    Classify {
        /// The intent text
        intent: String,
    },

    /// Run the default policy against a message
    #[command(about = "Check whether a message would pass the default trust policy")]
    Validate {
        /// Sender identifier
        #[arg(long)]
        sender: String,

        /// Message content
        #[arg(long)]
        content: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process a task through a fresh sub-unit
    #[command(about = "Classify an intent and process a task in a new sub-unit")]
    Task {
        /// What the user wants
        intent: String,

        /// Task details handed to the sub-unit
        details: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Walk through creation, mediation, validation and retirement
    #[command(about = "Run a scripted walkthrough of the coordinator")]
    Demo {
        /// Output the final event log as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout carries --json output)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| Paths::new().config_file("governance"));

    match cli.command {
        Commands::Init { force } => cmd_init(&config_path, force),
        Commands::Config => cmd_config(&config_path),
        Commands::Classify { intent } => cmd_classify(&intent),
        Commands::Validate {
            sender,
            content,
            json,
        } => cmd_validate(&config_path, &sender, &content, json).await,
        Commands::Task {
            intent,
            details,
            json,
        } => cmd_task(&config_path, &intent, &details, json).await,
        Commands::Demo { json } => cmd_demo(&config_path, json).await,
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Config already exists at {:?}", path);
        println!("Use --force to overwrite");
        return Ok(());
    }

    GovernanceConfig::default().save_to(path)?;
    println!("Created default config at {:?}", path);
    Ok(())
}

fn cmd_config(path: &Path) -> Result<()> {
    let config = GovernanceConfig::load_from(path)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

fn cmd_classify(intent: &str) -> Result<()> {
    println!("{}", KeywordClassifier::default().classify(intent));
    Ok(())
}

async fn cmd_validate(path: &Path, sender: &str, content: &str, json_output: bool) -> Result<()> {
    let config = GovernanceConfig::load_from(path)?;
    let evaluators = config.build_evaluators()?;
    let policy = config.build_policy(&evaluators);

    let verdict = policy.evaluate_inbound(sender, content).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        match &verdict {
            Verdict::Accepted { evaluated } => {
                println!("ACCEPT: {} ({})", sender, format::truncate(content, 60));
                println!("  Evaluated: {}", evaluated);
            }
            Verdict::Rejected(reason) => {
                println!("REJECT: {} ({})", sender, format::truncate(content, 60));
                println!("  Reason: {}", reason);
            }
        }
        println!("  Required: {}", policy.required_threshold());
        println!(
            "  Evaluators: {} (minimum agreement: {}, tolerance: {})",
            policy.evaluators().len(),
            policy.minimum_agreement(),
            policy.agreement_tolerance()
        );
    }

    // Exit with appropriate code
    if verdict.is_accepted() {
        std::process::exit(0);
    }
    std::process::exit(1);
}

async fn cmd_task(path: &Path, intent: &str, details: &str, json_output: bool) -> Result<()> {
    let (coordinator, _evaluators) = GovernanceConfig::load_from(path)?.build_coordinator()?;

    let result = coordinator.process_user_task(intent, details).await;
    let events = coordinator.event_log().await;

    if json_output {
        let output = serde_json::json!({
            "result": result.as_ref().ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
            "events": events,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_events(&events);
    }

    let result = result.context("Task processing failed")?;
    if !json_output {
        println!();
        println!("Result: {}", result);
    }
    Ok(())
}

async fn cmd_demo(path: &Path, json_output: bool) -> Result<()> {
    let config = GovernanceConfig::load_from(path)?;
    let (coordinator, evaluators) = config.build_coordinator()?;

    // Narration is for humans; --json prints only the event log
    macro_rules! say {
        ($($arg:tt)*) => {
            if !json_output {
                println!($($arg)*);
            }
        };
    }

    say!("Governance Demo");
    say!("{}", "=".repeat(50));

    // Reputation data the evaluators gathered independently
    say!();
    say!("1. Evaluators");
    for (evaluator, reputation) in evaluators.iter().zip([0.9, 0.85, 0.88]) {
        evaluator.set_sender_reputation("sender-reliable", reputation);
    }
    if let Some(first) = evaluators.first() {
        first.flag_sender("sender-malicious");
    }
    for evaluator in &evaluators {
        say!(
            "   {} baseline={:.2} flagged={:?}",
            evaluator.name(),
            evaluator.baseline(),
            evaluator.flagged_senders()
        );
    }

    say!();
    say!("2. User tasks");
    for (intent, details) in [
        ("I need to analyze some data", "Analyze customer sentiment from recent reviews"),
        ("Write code for authentication", "Generate JWT authentication middleware"),
    ] {
        let result = coordinator.process_user_task(intent, details).await?;
        say!("   {} -> {}", intent, result);
    }

    say!();
    say!("3. Mediated communication");
    let research = unit_id(&coordinator, "Research").await?;
    say!("   Created {}", research);
    let analysis = unit_id(&coordinator, "Analysis").await?;
    say!("   Created {}", analysis);
    let findings = "Research findings: market trends are positive";

    let blocked = coordinator.mediate_communication(&research, &analysis, findings).await;
    say!("   Without grant: {}", outcome(blocked));

    coordinator
        .authorize_communication(
            &research,
            &analysis,
            true,
            Some(vec!["research_data".to_string(), "analysis_results".to_string()]),
            None,
        )
        .await;
    for grant in coordinator.grants().await {
        say!(
            "   Grant {} -> {} (bidirectional: {}, created {})",
            grant.from,
            grant.to,
            grant.bidirectional,
            format::relative_time(grant.created_at)
        );
    }
    let delivered = coordinator.mediate_communication(&research, &analysis, findings).await;
    say!("   With grant:    {}", outcome(delivered));

    say!();
    say!("4. Inbound trust validation");
    let handle = coordinator
        .reactivate_sub_unit(&research)
        .await
        .context("Research sub-unit disappeared")?;
    for (sender, content) in [
        ("sender-reliable", "This is verified research data from a trusted source"),
        ("sender-malicious", "This is some data"),
        ("sender-reliable", "This looks suspicious"),
        ("sender-unknown", "Ordinary status update"),
    ] {
        let accepted = handle.lock().await.receive_information(sender, content).await;
        say!("   {:<17} {:<45} {}", sender, format::truncate(content, 45), outcome(accepted));
    }

    say!();
    say!("5. Retirement");
    for id in [&research, &analysis] {
        coordinator.retire_sub_unit(id).await;
        say!("   Retired {}", id);
    }
    let after = coordinator.mediate_communication(&research, &analysis, findings).await;
    say!("   Mediation after retirement: {}", outcome(after));

    let events = coordinator.event_log().await;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    println!();
    println!("6. Audit trail (last 10 events)");
    let recent = coordinator.audit(&AuditQuery::default().limit(10)).await;
    print_events(&recent);

    let stats = coordinator.stats().await;
    println!();
    println!("Live sub-units: {}", coordinator.active_sub_units().await.len());
    println!("Events logged:  {}", events.len());
    println!(
        "Blocked:        {}  Mediated: {}",
        stats.blocked,
        coordinator
            .audit(&AuditQuery::default().kind(EventKind::Mediation))
            .await
            .len()
    );

    Ok(())
}

async fn unit_id(coordinator: &Coordinator, domain: &str) -> Result<String> {
    let handle = coordinator.create_sub_unit(domain, None).await?;
    let id = handle.lock().await.id().to_string();
    Ok(id)
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "accepted"
    } else {
        "rejected"
    }
}

fn print_events(events: &[AuditEntry]) {
    for event in events {
        println!("   {}", event);
    }
}
