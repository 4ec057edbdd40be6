//! `fop` - command-line driver for the plan engine
//!
//! Everything lives in memory for a single invocation. Opportunities come
//! from a JSON file, and plans and audit entries are gone on exit. For
//! that reason `simulate` walks one plan through its whole lifecycle and
//! prints the resulting audit trail.
//!
//! Output is pretty-printed JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fop_core::prelude::*;
use fop_core::{StaticIdentity, SYSTEM_IDENTITY};
use fop_ledger::AuditLogEntry;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn filter_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("env")
            .long("env")
            .default_value("ALL")
            .help("Environment filter: ALL, DEV or TEST"),
    )
    .arg(
        Arg::new("risk")
            .long("risk")
            .default_value("ALL")
            .help("Risk filter: ALL, LOW, MEDIUM or HIGH"),
    )
}

fn cli() -> Command {
    Command::new("fop")
        .version(fop_core::VERSION)
        .about("FinOps plan generation and lifecycle engine")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("opportunities")
                .long("opportunities")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON array of opportunity records"),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .global(true)
                .default_value(SYSTEM_IDENTITY)
                .help("Identity recorded on plans and audit entries"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .subcommand(filter_args(
            Command::new("opportunities").about("List eligible opportunity records"),
        ))
        .subcommand(
            filter_args(Command::new("plan").about("Generate a plan and print it")).arg(
                Arg::new("plan-id")
                    .long("plan-id")
                    .help("Use this plan id instead of a generated one"),
            ),
        )
        .subcommand(
            filter_args(Command::new("simulate").about("Generate, approve and execute a plan"))
                .arg(
                    Arg::new("approver")
                        .long("approver")
                        .help("Identity approving and executing (defaults to --user)"),
                )
                .arg(
                    Arg::new("rollback")
                        .long("rollback")
                        .action(ArgAction::SetTrue)
                        .help("Roll the plan back after execution"),
                )
                .arg(
                    Arg::new("reason")
                        .long("reason")
                        .requires("rollback")
                        .help("Rollback reason"),
                ),
        )
        .subcommand(Command::new("agents").about("Show the agent registry"))
        .subcommand(
            Command::new("run-agent")
                .about("Run one agent once")
                .arg(
                    Arg::new("agent")
                        .required(true)
                        .help("opportunity_discoverer, plan_optimizer, execution_monitor or finops_assistant"),
                ),
        )
        .subcommand(Command::new("summary").about("Print dashboard figures"))
        .subcommand(Command::new("config").about("Validate and print the effective configuration"))
}

fn init_logging(format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(args: &ArgMatches) -> Result<PlannerConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => PlannerConfig::from_file(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(PlannerConfig::default()),
    }
}

fn build_planner(args: &ArgMatches) -> Result<FinOpsPlanner> {
    let config = load_config(args)?;
    let source = match args.get_one::<PathBuf>("opportunities") {
        Some(path) => InMemoryOpportunitySource::from_json_file(path)
            .with_context(|| format!("loading opportunities {}", path.display()))?,
        None => {
            tracing::warn!("no --opportunities file given; starting empty");
            InMemoryOpportunitySource::default()
        }
    };
    let user = args.get_one::<String>("user").map_or(SYSTEM_IDENTITY, String::as_str);
    let planner = FinOpsPlanner::builder(config)
        .with_source(Arc::new(source))
        .with_identity(Arc::new(StaticIdentity::new(user)))
        .build()?;
    Ok(planner)
}

fn filters(args: &ArgMatches) -> Result<(EnvFilter, RiskFilter)> {
    let env = match args.get_one::<String>("env") {
        Some(raw) => raw.parse::<EnvFilter>().with_context(|| format!("bad --env {raw}"))?,
        None => EnvFilter::All,
    };
    let risk = match args.get_one::<String>("risk") {
        Some(raw) => raw.parse::<RiskFilter>().with_context(|| format!("bad --risk {raw}"))?,
        None => RiskFilter::All,
    };
    Ok((env, risk))
}

fn plan_request(planner: &FinOpsPlanner, args: &ArgMatches) -> Result<PlanRequest> {
    let (env, risk) = filters(args)?;
    Ok(PlanRequest::new(planner.current_user()?).with_env(env).with_risk(risk))
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn simulate(planner: &FinOpsPlanner, args: &ArgMatches) -> Result<()> {
    let request = plan_request(planner, args)?;
    let approver = match args.get_one::<String>("approver") {
        Some(approver) => approver.clone(),
        None => request.requester.clone(),
    };

    let plan = planner.generate_plan(request).await?;
    planner.approve(&plan.plan_id, &approver).await?;
    let mut plan = planner.execute(&plan.plan_id, &approver).await?;
    if args.get_flag("rollback") {
        let reason = args.get_one::<String>("reason").cloned();
        plan = planner.rollback(&plan.plan_id, &approver, reason).await?;
    }
    planner.verify_audit_log()?;

    let audit: Vec<AuditLogEntry> = planner
        .list_audit_log(
            AuditQuery::new()
                .for_plan(plan.plan_id.as_str())
                .with_order(SortOrder::Asc),
        )
        .map(|entry| (*entry).clone())
        .collect();
    emit(&json!({ "plan": plan, "audit": audit }))
}

async fn run(name: &str, args: &ArgMatches) -> Result<()> {
    if name == "config" {
        let config = load_config(args)?;
        config.validate()?;
        return emit(&config);
    }

    let planner = build_planner(args)?;
    match name {
        "opportunities" => {
            let (env, risk) = filters(args)?;
            emit(&planner.list_opportunities(env, risk).await?)
        }
        "plan" => {
            let mut request = plan_request(&planner, args)?;
            if let Some(raw) = args.get_one::<String>("plan-id") {
                request = request.with_plan_id(PlanId::new(raw.as_str())?);
            }
            emit(&planner.generate_plan(request).await?)
        }
        "simulate" => simulate(&planner, args).await,
        "agents" => emit(&planner.agents()),
        "run-agent" => {
            let raw = args.get_one::<String>("agent").context("missing agent")?;
            let kind: AgentKind = raw.parse()?;
            emit(&planner.run_agent(kind).await?)
        }
        "summary" => emit(&planner.summary().await?),
        other => anyhow::bail!("unknown command {other}"),
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    let Some((name, args)) = matches.subcommand() else {
        return;
    };
    init_logging(args.get_one::<String>("log-format").map_or("text", String::as_str));

    if let Err(err) = run(name, args).await {
        tracing::error!(command = name, error = %err, "command failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
