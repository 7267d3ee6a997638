//! `shopqc err` command - error report (nonconformance) management

use clap::Subcommand;
use console::style;
use dialoguer::Confirm;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{
    format_short_id, open_project, parse_id, print_show, report_notified, resolve_job,
    truncate_str,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::escalation::{self, SupplierOrigin};
use crate::core::files;
use crate::core::identity::EntityPrefix;
use crate::core::{store, Config, StoreSink};
use crate::entities::error_report::{ErrorReport, ErrorStatus, ErrorType, Severity};

#[derive(Subcommand, Debug)]
pub enum ErrCommands {
    /// Raise an internal nonconformance against a job
    Internal(InternalArgs),

    /// Raise a supplier nonconformance from an inspection record
    Supplier(SupplierArgs),

    /// List error reports
    List(ListArgs),

    /// Show an error report's details
    Show(ShowArgs),

    /// Update disposition, root cause, corrective action, or assignee
    Update(UpdateArgs),

    /// Start investigating an open report
    Investigate(TransitionArgs),

    /// Mark a report as resolved
    Resolve(TransitionArgs),

    /// Close a resolved report
    Close(CloseArgs),

    /// Reopen a report, clearing its resolved/closed dates
    Reopen(TransitionArgs),

    /// Attach a file (photo, document) to an error report
    Attach(AttachArgs),
}

#[derive(clap::Args, Debug)]
pub struct InternalArgs {
    /// Job number or id
    pub job: String,

    /// Description of the nonconformance
    #[arg(long, short = 'd')]
    pub description: String,

    /// Severity: minor, major, or critical
    #[arg(long, short = 'S', default_value = "minor")]
    pub severity: String,

    /// Number of units affected
    #[arg(long)]
    pub qty: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct SupplierArgs {
    /// Originating material control id (MATC-...)
    #[arg(long, conflicts_with = "external")]
    pub material: Option<String>,

    /// Originating external process id (EXTP-...)
    #[arg(long)]
    pub external: Option<String>,

    /// Description of the nonconformance
    #[arg(long, short = 'd')]
    pub description: String,

    /// Severity: minor, major, or critical
    #[arg(long, short = 'S', default_value = "minor")]
    pub severity: String,

    /// Number of units affected
    #[arg(long)]
    pub qty: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Filter by error type
    #[arg(long, short = 't')]
    pub r#type: Option<String>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Error report id (ERR-...)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Error report id (ERR-...)
    pub id: String,

    /// Disposition decision (use-as-is, rework, scrap, return)
    #[arg(long)]
    pub disposition: Option<String>,

    /// Root cause analysis
    #[arg(long)]
    pub root_cause: Option<String>,

    /// Corrective action taken
    #[arg(long)]
    pub corrective_action: Option<String>,

    /// Assign to a username
    #[arg(long)]
    pub assign: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct TransitionArgs {
    /// Error report id (ERR-...)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct AttachArgs {
    /// Error report id (ERR-...)
    pub id: String,

    /// File to attach
    pub file: std::path::PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct CloseArgs {
    /// Error report id (ERR-...)
    pub id: String,

    /// Skip the confirmation when disposition/root cause are empty
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Run an err subcommand
pub fn run(cmd: ErrCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ErrCommands::Internal(args) => run_internal(args, global),
        ErrCommands::Supplier(args) => run_supplier(args, global),
        ErrCommands::List(args) => run_list(args, global),
        ErrCommands::Show(args) => run_show(args, global),
        ErrCommands::Update(args) => run_update(args, global),
        ErrCommands::Investigate(args) => run_transition(args, ErrorStatus::Investigating, global),
        ErrCommands::Resolve(args) => run_transition(args, ErrorStatus::Resolved, global),
        ErrCommands::Close(args) => run_close(args, global),
        ErrCommands::Reopen(args) => run_transition(args, ErrorStatus::Open, global),
        ErrCommands::Attach(args) => run_attach(args, global),
    }
}

fn severity_styled(severity: Severity) -> console::StyledObject<String> {
    let s = severity.to_string();
    match severity {
        Severity::Critical => style(s).red().bold(),
        Severity::Major => style(s).yellow(),
        Severity::Minor => style(s).white(),
    }
}

fn run_internal(args: InternalArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let severity = args
        .severity
        .parse::<Severity>()
        .map_err(|e| miette::miette!("{}", e))?;
    let job = resolve_job(store.conn(), &args.job)?;

    let mut sink =
        StoreSink::open(&project.db_path()).map_err(|e| miette::miette!("{}", e))?;
    let roster = project.load_roster();

    let (er, outcome) = escalation::report_internal(
        &mut store,
        &mut sink,
        &roster,
        &job.id,
        severity,
        &args.description,
        args.qty,
        &config.author(),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Created error report {}",
        style("✓").green(),
        style(format_short_id(&er.id)).cyan()
    );
    if !global.quiet {
        println!(
            "   {} | {} | {}",
            style("internal").yellow(),
            severity_styled(er.severity),
            truncate_str(&er.description, 48)
        );
    }
    report_notified(&outcome, global.quiet);
    Ok(())
}

fn run_supplier(args: SupplierArgs, global: &GlobalOpts) -> Result<()> {
    let origin = match (&args.material, &args.external) {
        (Some(mc), None) => SupplierOrigin::Material(parse_id(mc, EntityPrefix::Matc)?),
        (None, Some(ep)) => SupplierOrigin::External(parse_id(ep, EntityPrefix::Extp)?),
        _ => {
            return Err(miette::miette!(
                "Name the origin record with exactly one of --material or --external"
            ))
        }
    };

    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let severity = args
        .severity
        .parse::<Severity>()
        .map_err(|e| miette::miette!("{}", e))?;

    let mut sink =
        StoreSink::open(&project.db_path()).map_err(|e| miette::miette!("{}", e))?;
    let roster = project.load_roster();

    let (er, outcome) = escalation::report_supplier(
        &mut store,
        &mut sink,
        &roster,
        &origin,
        severity,
        &args.description,
        args.qty,
        &config.author(),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Created error report {}",
        style("✓").green(),
        style(format_short_id(&er.id)).cyan()
    );
    if !global.quiet {
        println!(
            "   {} | {} | supplier: {}",
            style(er.error_type.to_string()).yellow(),
            severity_styled(er.severity),
            er.supplier.as_deref().unwrap_or("-")
        );
        println!("   {}", style("Origin record marked rejected").dim());
    }
    report_notified(&outcome, global.quiet);
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let status = match args.status.as_deref() {
        Some(s) => Some(s.parse::<ErrorStatus>().map_err(|e| miette::miette!("{}", e))?),
        None => None,
    };
    let error_type = match args.r#type.as_deref() {
        Some(t) => Some(t.parse::<ErrorType>().map_err(|e| miette::miette!("{}", e))?),
        None => None,
    };

    let reports = store::list_error_reports(store.conn(), status, error_type)
        .map_err(|e| miette::miette!("{}", e))?;

    if args.count {
        println!("{}", reports.len());
        return Ok(());
    }
    if reports.is_empty() {
        println!("No error reports found.");
        return Ok(());
    }

    match global.format {
        OutputFormat::Json => print_show(&reports, OutputFormat::Json)?,
        OutputFormat::Yaml => print_show(&reports, OutputFormat::Yaml)?,
        OutputFormat::Id => {
            for er in &reports {
                println!("{}", er.id);
            }
        }
        _ => {
            println!(
                "{:<17} {:<18} {:<10} {:<14} {:<30}",
                style("ID").bold(),
                style("TYPE").bold(),
                style("SEVERITY").bold(),
                style("STATUS").bold(),
                style("DESCRIPTION").bold()
            );
            println!("{}", "-".repeat(92));
            for er in &reports {
                println!(
                    "{:<17} {:<18} {:<10} {:<14} {:<30}",
                    format_short_id(&er.id),
                    er.error_type.to_string(),
                    severity_styled(er.severity),
                    er.status.to_string(),
                    truncate_str(&er.description, 28)
                );
            }
            println!();
            println!("{} error report(s) found.", style(reports.len()).cyan());
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let er = find_report(&store, &args.id)?;
    print_show(&er, global.format)
}

fn run_update(args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let id = parse_id(&args.id, EntityPrefix::Err)?;
    let er = escalation::update_error_fields(
        &mut store,
        &id,
        args.disposition.as_deref(),
        args.root_cause.as_deref(),
        args.corrective_action.as_deref(),
        args.assign.as_deref(),
        &config.author(),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Updated error report {}",
        style("✓").green(),
        style(format_short_id(&er.id)).cyan()
    );
    Ok(())
}

fn run_transition(args: TransitionArgs, to: ErrorStatus, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let id = parse_id(&args.id, EntityPrefix::Err)?;
    let er = escalation::set_error_status(&mut store, &id, to, &config.author())
        .map_err(|e| miette::miette!("{}", e))?;
    print_transition(&er, global);
    Ok(())
}

fn run_close(args: CloseArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let er = find_report(&store, &args.id)?;
    if !args.yes && (er.disposition.is_none() || er.root_cause.is_none()) {
        println!(
            "{} Disposition or root cause is still empty on {}",
            style("!").yellow(),
            format_short_id(&er.id)
        );
        let proceed = Confirm::new()
            .with_prompt("Close anyway?")
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !proceed {
            println!("Not closed.");
            return Ok(());
        }
    }

    let er = escalation::set_error_status(&mut store, &er.id, ErrorStatus::Closed, &config.author())
        .map_err(|e| miette::miette!("{}", e))?;
    print_transition(&er, global);
    Ok(())
}

fn print_transition(er: &ErrorReport, global: &GlobalOpts) {
    let status_styled = match er.status {
        ErrorStatus::Closed => style(er.status.to_string()).green(),
        ErrorStatus::Resolved => style(er.status.to_string()).cyan(),
        ErrorStatus::Open => style(er.status.to_string()).red(),
        ErrorStatus::Investigating => style(er.status.to_string()).yellow(),
    };
    println!(
        "{} Error report {} is now {}",
        style("✓").green(),
        style(format_short_id(&er.id)).cyan(),
        status_styled
    );
    if !global.quiet && er.status == ErrorStatus::Open && er.resolved_date.is_none() {
        println!("   {}", style("Resolved/closed dates cleared").dim());
    }
}

fn run_attach(args: AttachArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let er = find_report(&store, &args.id)?;
    let attachment = files::store_attachment(
        store.conn(),
        &project.attachments_dir(),
        "error_report",
        &er.id.to_string(),
        &args.file,
        Some(&config.author()),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Attached {} to {} ({})",
        style("✓").green(),
        style(&attachment.file_name).cyan(),
        format_short_id(&er.id),
        style(&attachment.sha256[..12]).dim()
    );
    Ok(())
}

fn find_report(store: &crate::core::QualityStore, reference: &str) -> Result<ErrorReport> {
    let id = parse_id(reference, EntityPrefix::Err)?;
    store::find_error_report(store.conn(), &id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("No error report found matching '{}'", reference))
}
