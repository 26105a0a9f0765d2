//! Operator command line

use crate::api::routes;
use crate::telemetry::{init_tracing, LogFormat};
use anyhow::{bail, Context, Result};
use bridge_core::{
    DocumentRetryWorker, IntakeConfig, IntakeOrchestrator, IntakeRequest, ProductCatalog,
};
use bridge_model::{Actor, ActorRole, FormData, Lead, LeadSource, LeadStatus, ReferenceNumber};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;

/// Command tree
#[must_use]
pub fn command() -> Command {
    let actor_args = [
        Arg::new("actor")
            .long("actor")
            .default_value("cli")
            .help("Actor id recorded in the activity log"),
        Arg::new("role")
            .long("role")
            .default_value("admin")
            .value_parser(value_parser!(ActorRole))
            .help("Actor role: agent, admin or system"),
    ];

    Command::new("bridge-intake")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Insurance lead intake and document generation")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file; environment variables override it"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(value_parser!(LogFormat))
                .help("Log output: text or json"),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP API and the document retry worker")
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .env("BRIDGE_BIND")
                        .default_value("0.0.0.0:8080")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address"),
                )
                .arg(
                    Arg::new("no-retry")
                        .long("no-retry")
                        .action(ArgAction::SetTrue)
                        .help("Do not start the background document retry worker"),
                ),
        )
        .subcommand(
            Command::new("submit")
                .about("Submit a form from a JSON file (or - for stdin)")
                .arg(Arg::new("category").long("category").required(true))
                .arg(
                    Arg::new("form")
                        .long("form")
                        .required(true)
                        .help("Path to a JSON object with the form fields"),
                )
                .arg(
                    Arg::new("source")
                        .long("source")
                        .default_value("mobile_app")
                        .value_parser(value_parser!(LeadSource)),
                )
                .arg(Arg::new("referral-code").long("referral-code"))
                .arg(
                    Arg::new("draft")
                        .long("draft")
                        .action(ArgAction::SetTrue)
                        .help("Save as draft without validation"),
                )
                .args(actor_args.clone()),
        )
        .subcommand(
            Command::new("show")
                .about("Print a lead and its activity history")
                .arg(Arg::new("lead").required(true).help("Lead id or reference number")),
        )
        .subcommand(
            Command::new("transition")
                .about("Change a lead's status")
                .arg(Arg::new("lead").required(true).help("Lead id or reference number"))
                .arg(
                    Arg::new("status")
                        .required(true)
                        .value_parser(value_parser!(LeadStatus)),
                )
                .arg(Arg::new("note").long("note"))
                .args(actor_args),
        )
        .subcommand(
            Command::new("retry-documents")
                .about("Run one pass over leads still missing a document"),
        )
        .subcommand(Command::new("catalog").about("List product categories and their fields"))
        .subcommand(
            Command::new("verify")
                .about("Check a lead's activity hash chain")
                .arg(Arg::new("lead").required(true).help("Lead id or reference number")),
        )
}

/// Execute the parsed command line
///
/// # Errors
/// Configuration, startup and command failures
pub async fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let format = matches
        .get_one::<LogFormat>("log-format")
        .copied()
        .unwrap_or_default();
    init_tracing(format);

    let config_path = matches.get_one::<PathBuf>("config");
    let config = IntakeConfig::load(config_path.map(PathBuf::as_path))
        .context("loading configuration")?;
    let orchestrator =
        Arc::new(IntakeOrchestrator::from_config(&config).context("assembling the pipeline")?);

    match matches.subcommand() {
        Some(("serve", args)) => serve(orchestrator, &config, args).await,
        Some(("submit", args)) => submit(&orchestrator, args).await,
        Some(("show", args)) => show(&orchestrator, args).await,
        Some(("transition", args)) => transition(&orchestrator, args).await,
        Some(("retry-documents", _)) => {
            let summary = orchestrator.retry_due_documents().await?;
            print_json(&summary)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("catalog", _)) => {
            catalog(orchestrator.catalog());
            Ok(ExitCode::SUCCESS)
        }
        Some(("verify", args)) => verify(&orchestrator, args).await,
        _ => bail!("no command given"),
    }
}

async fn serve(
    orchestrator: Arc<IntakeOrchestrator>,
    config: &IntakeConfig,
    args: &ArgMatches,
) -> Result<ExitCode> {
    let addr = *args
        .get_one::<SocketAddr>("bind")
        .context("--bind is required")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = if config.document_retry.enabled && !args.get_flag("no-retry") {
        Some(DocumentRetryWorker::new(orchestrator.clone()).spawn(shutdown_rx.clone()))
    } else {
        None
    };

    let mut server_rx = shutdown_rx.clone();
    let (bound, server) = warp::serve(routes(orchestrator))
        .try_bind_with_graceful_shutdown(addr, async move {
            let _ = server_rx.wait_for(|stop| *stop).await;
        })
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %bound, "listening");

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    server.await;
    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            tracing::warn!(error = %e, "retry worker ended abnormally");
        }
    }
    tracing::info!("stopped");
    Ok(ExitCode::SUCCESS)
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn actor(args: &ArgMatches) -> Actor {
    let id = args
        .get_one::<String>("actor")
        .map_or("cli", String::as_str);
    let role = args.get_one::<ActorRole>("role").copied().unwrap_or_default();
    Actor::new(id, role)
}

async fn find_lead(orchestrator: &IntakeOrchestrator, raw: &str) -> Result<Lead> {
    if let Ok(id) = raw.parse() {
        return Ok(orchestrator.get(id).await?);
    }
    let reference: ReferenceNumber = raw
        .parse()
        .with_context(|| format!("{raw} is neither a lead id nor a reference number"))?;
    Ok(orchestrator.get_by_reference(&reference).await?)
}

fn read_form(path: &str) -> Result<FormData> {
    let text = if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?
    };
    serde_json::from_str(&text).with_context(|| format!("{path} is not a JSON object"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn submit(orchestrator: &IntakeOrchestrator, args: &ArgMatches) -> Result<ExitCode> {
    let category = args
        .get_one::<String>("category")
        .context("--category is required")?;
    let form = read_form(args.get_one::<String>("form").context("--form is required")?)?;

    let mut request = IntakeRequest::new(category.as_str(), form, actor(args))
        .with_source(args.get_one::<LeadSource>("source").copied().unwrap_or_default());
    if let Some(code) = args.get_one::<String>("referral-code") {
        request = request.with_referral_code(code.as_str());
    }
    if args.get_flag("draft") {
        request = request.as_draft();
    }

    match orchestrator.submit(request).await {
        Ok(receipt) => {
            print_json(&receipt)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(bridge_core::IntakeError::Validation(errors)) => {
            for v in &errors.0 {
                eprintln!("{}: {} ({})", v.field, v.message, v.code.as_str());
            }
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}

async fn show(orchestrator: &IntakeOrchestrator, args: &ArgMatches) -> Result<ExitCode> {
    let raw = args.get_one::<String>("lead").context("lead is required")?;
    let lead = find_lead(orchestrator, raw).await?;
    let activities = orchestrator.activities(lead.id).await?;
    print_json(&serde_json::json!({ "lead": lead, "activities": activities }))?;
    Ok(ExitCode::SUCCESS)
}

async fn transition(orchestrator: &IntakeOrchestrator, args: &ArgMatches) -> Result<ExitCode> {
    let raw = args.get_one::<String>("lead").context("lead is required")?;
    let to = *args
        .get_one::<LeadStatus>("status")
        .context("status is required")?;
    let lead = find_lead(orchestrator, raw).await?;
    let updated = orchestrator
        .transition(lead.id, to, actor(args), args.get_one::<String>("note").cloned())
        .await?;
    print_json(&updated)?;
    Ok(ExitCode::SUCCESS)
}

fn catalog(catalog: &dyn ProductCatalog) {
    for spec in catalog.categories() {
        println!(
            "{:<24} {:<3} {:<24} template={}",
            spec.id(),
            spec.category.prefix,
            spec.category.name,
            spec.template_id
        );
        for field in spec.schema.fields() {
            let marker = if field.required { "*" } else { " " };
            println!("    {marker} {:<28} {}", field.name, field.label);
        }
    }
}

async fn verify(orchestrator: &IntakeOrchestrator, args: &ArgMatches) -> Result<ExitCode> {
    let raw = args.get_one::<String>("lead").context("lead is required")?;
    let lead = find_lead(orchestrator, raw).await?;
    let report = orchestrator.verify_chain(lead.id).await?;
    print_json(&report)?;
    Ok(if report.is_intact() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn transition_parses_status_and_actor() {
        let matches = command()
            .try_get_matches_from([
                "bridge-intake",
                "--log-format",
                "json",
                "transition",
                "HI-2025-7",
                "in_progress",
                "--actor",
                "ops-2",
                "--note",
                "called back",
            ])
            .unwrap();
        assert_eq!(matches.get_one::<LogFormat>("log-format"), Some(&LogFormat::Json));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "transition");
        assert_eq!(args.get_one::<LeadStatus>("status"), Some(&LeadStatus::InProgress));
        assert_eq!(actor(args), Actor::new("ops-2", ActorRole::Admin));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(command()
            .try_get_matches_from(["bridge-intake", "transition", "HI-2025-7", "paid"])
            .is_err());
    }
}
