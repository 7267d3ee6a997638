//! `shopqc extp` command - external process tracking

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{
    format_short_id, open_project, parse_id, print_show, report_notified, resolve_job,
    truncate_str,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::escalation::{self, NewExternalProcess};
use crate::core::files;
use crate::core::identity::EntityPrefix;
use crate::core::{store, Config, StoreSink};
use crate::entities::external::ExternalStatus;

#[derive(Subcommand, Debug)]
pub enum ExtpCommands {
    /// Record parts sent to an external supplier
    New(NewArgs),

    /// Record parts received back from the supplier
    Receive(ReceiveArgs),

    /// Record the inspection verdict on returned parts
    Inspect(InspectArgs),

    /// List a job's external processes
    List(ListArgs),

    /// Show an external process's details
    Show(ShowArgs),

    /// Attach a file (certificate, photo) to an external process
    Attach(AttachArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Job number or id
    pub job: String,

    /// Process type (e.g. "anodizing")
    #[arg(long, short = 't')]
    pub process: String,

    /// Process description / specification
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Supplier name
    #[arg(long, short = 's')]
    pub supplier: Option<String>,

    /// Quantity sent out
    #[arg(long)]
    pub qty: Option<u32>,

    /// Date sent (YYYY-MM-DD)
    #[arg(long)]
    pub sent: Option<NaiveDate>,

    /// Notes
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ReceiveArgs {
    /// External process id (EXTP-...)
    pub id: String,

    /// Date received (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Quantity received back (default: quantity sent)
    #[arg(long)]
    pub qty: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// External process id (EXTP-...)
    pub id: String,

    /// Verdict: approved or rejected
    pub verdict: String,

    /// Inspection notes
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Job number or id
    pub job: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// External process id (EXTP-...)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct AttachArgs {
    /// External process id (EXTP-...)
    pub id: String,

    /// File to attach
    pub file: std::path::PathBuf,
}

/// Run an extp subcommand
pub fn run(cmd: ExtpCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ExtpCommands::New(args) => run_new(args, global),
        ExtpCommands::Receive(args) => run_receive(args, global),
        ExtpCommands::Inspect(args) => run_inspect(args, global),
        ExtpCommands::List(args) => run_list(args, global),
        ExtpCommands::Show(args) => run_show(args, global),
        ExtpCommands::Attach(args) => run_attach(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let job = resolve_job(store.conn(), &args.job)?;
    let ep = escalation::create_external_process(
        &mut store,
        &job.id,
        NewExternalProcess {
            process_type: args.process,
            description: args.description,
            supplier: args.supplier,
            quantity_sent: args.qty,
            sent_date: args.sent,
            notes: args.notes,
        },
        &config.author(),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} External {} {} recorded for {}",
        style("✓").green(),
        ep.process_type,
        style(format_short_id(&ep.id)).cyan(),
        job.job_number
    );
    Ok(())
}

fn run_receive(args: ReceiveArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let id = parse_id(&args.id, EntityPrefix::Extp)?;
    let date = args
        .date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let ep = escalation::receive_external(&mut store, &id, date, args.qty, &config.author())
        .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} {} parts received back ({} of {} sent)",
        style("✓").green(),
        style(format_short_id(&ep.id)).cyan(),
        ep.quantity_received
            .map(|q| q.to_string())
            .unwrap_or_else(|| "?".to_string()),
        ep.quantity_sent
            .map(|q| q.to_string())
            .unwrap_or_else(|| "?".to_string())
    );
    Ok(())
}

fn run_inspect(args: InspectArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let id = parse_id(&args.id, EntityPrefix::Extp)?;
    let verdict = args
        .verdict
        .parse::<ExternalStatus>()
        .map_err(|e| miette::miette!("{}", e))?;

    let mut sink =
        StoreSink::open(&project.db_path()).map_err(|e| miette::miette!("{}", e))?;
    let roster = project.load_roster();

    let (ep, outcome) = escalation::inspect_external(
        &mut store,
        &mut sink,
        &roster,
        &id,
        verdict,
        &config.author(),
        args.notes.as_deref(),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    let status_styled = match ep.status {
        ExternalStatus::Rejected => style(ep.status.to_string()).red(),
        _ => style(ep.status.to_string()).green(),
    };
    println!(
        "{} External process {} {}",
        style("✓").green(),
        style(format_short_id(&ep.id)).cyan(),
        status_styled
    );
    if let Some(outcome) = outcome {
        report_notified(&outcome, global.quiet);
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let job = resolve_job(store.conn(), &args.job)?;
    let processes = store::list_external_processes(store.conn(), &job.id)
        .map_err(|e| miette::miette!("{}", e))?;
    if processes.is_empty() {
        println!("No external processes on {}.", job.job_number);
        return Ok(());
    }

    match global.format {
        OutputFormat::Json => print_show(&processes, OutputFormat::Json)?,
        OutputFormat::Yaml => print_show(&processes, OutputFormat::Yaml)?,
        OutputFormat::Id => {
            for ep in &processes {
                println!("{}", ep.id);
            }
        }
        _ => {
            println!(
                "{:<17} {:<18} {:<18} {:<10} {:<11}",
                style("ID").bold(),
                style("PROCESS").bold(),
                style("SUPPLIER").bold(),
                style("STATUS").bold(),
                style("SENT").bold()
            );
            println!("{}", "-".repeat(76));
            for ep in &processes {
                let status_styled = match ep.status {
                    ExternalStatus::Rejected => style(ep.status.to_string()).red(),
                    ExternalStatus::Approved => style(ep.status.to_string()).green(),
                    _ => style(ep.status.to_string()).yellow(),
                };
                println!(
                    "{:<17} {:<18} {:<18} {:<10} {:<11}",
                    format_short_id(&ep.id),
                    truncate_str(&ep.process_type, 16),
                    truncate_str(ep.supplier.as_deref().unwrap_or("-"), 16),
                    status_styled,
                    ep.sent_date.map(|d| d.to_string()).unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let id = parse_id(&args.id, EntityPrefix::Extp)?;
    let ep = store::find_external_process(store.conn(), &id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("No external process found matching '{}'", args.id))?;
    print_show(&ep, global.format)
}

fn run_attach(args: AttachArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let id = parse_id(&args.id, EntityPrefix::Extp)?;
    if store::find_external_process(store.conn(), &id)
        .map_err(|e| miette::miette!("{}", e))?
        .is_none()
    {
        return Err(miette::miette!(
            "No external process found matching '{}'",
            args.id
        ));
    }

    let attachment = files::store_attachment(
        store.conn(),
        &project.attachments_dir(),
        "external_process",
        &id.to_string(),
        &args.file,
        Some(&config.author()),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Attached {} ({})",
        style("✓").green(),
        style(&attachment.file_name).cyan(),
        style(&attachment.sha256[..12]).dim()
    );
    Ok(())
}
