//! `shopqc material` command - incoming material inspection

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{
    format_short_id, open_project, parse_id, print_show, report_notified, resolve_job,
    truncate_str,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::escalation::{self, NewMaterialControl};
use crate::core::files;
use crate::core::identity::EntityPrefix;
use crate::core::{store, Config, StoreSink};
use crate::entities::material::MaterialStatus;

#[derive(Subcommand, Debug)]
pub enum MaterialCommands {
    /// Record an incoming material inspection for a job
    New(NewArgs),

    /// List a job's material controls
    List(ListArgs),

    /// Show a material control's details
    Show(ShowArgs),

    /// Set the inspection verdict (rejection notifies quality users)
    Status(StatusArgs),

    /// Attach a file (material certificate) to a material control
    Attach(AttachArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Job number or id
    pub job: String,

    /// Material type (e.g. "6082-T6 bar stock")
    #[arg(long, short = 't')]
    pub material: String,

    /// Supplier name
    #[arg(long, short = 's')]
    pub supplier: Option<String>,

    /// Supplier batch / heat number
    #[arg(long, short = 'b')]
    pub batch: Option<String>,

    /// Quantity received (free text: "12 bars", "4.2 kg")
    #[arg(long)]
    pub qty: Option<String>,

    /// Certificate matches the PO requirements
    #[arg(long)]
    pub cert_ok: bool,

    /// Visual check passed
    #[arg(long)]
    pub visual_ok: bool,

    /// Dimensional check result
    #[arg(long, action = clap::ArgAction::Set)]
    pub dims_ok: Option<bool>,

    /// Notes
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
    /// Material control id (MATC-...)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Material control id (MATC-...)
    pub id: String,

    /// Verdict: pending, approved, or rejected
    pub status: String,
}

#[derive(clap::Args, Debug)]
pub struct AttachArgs {
    /// Material control id (MATC-...)
    pub id: String,

    /// File to attach
    pub file: std::path::PathBuf,
}

/// Run a material subcommand
pub fn run(cmd: MaterialCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        MaterialCommands::New(args) => run_new(args, global),
        MaterialCommands::List(args) => run_list(args, global),
        MaterialCommands::Show(args) => run_show(args, global),
        MaterialCommands::Status(args) => run_status(args, global),
        MaterialCommands::Attach(args) => run_attach(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let job = resolve_job(store.conn(), &args.job)?;
    let mc = escalation::create_material_control(
        &mut store,
        &job.id,
        NewMaterialControl {
            material_type: args.material,
            supplier: args.supplier,
            batch_number: args.batch,
            quantity_received: args.qty,
            certificate_matches: args.cert_ok,
            visual_ok: args.visual_ok,
            dimensions_ok: args.dims_ok,
            inspector: Some(config.author()),
            notes: args.notes,
        },
        &config.author(),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Material control {} recorded for {}",
        style("✓").green(),
        style(format_short_id(&mc.id)).cyan(),
        job.job_number
    );
    if !global.quiet {
        println!("   {} | status {}", mc.material_type, mc.status);
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let job = resolve_job(store.conn(), &args.job)?;
    let controls = store::list_material_controls(store.conn(), &job.id)
        .map_err(|e| miette::miette!("{}", e))?;
    if controls.is_empty() {
        println!("No material controls on {}.", job.job_number);
        return Ok(());
    }

    match global.format {
        OutputFormat::Json => print_show(&controls, OutputFormat::Json)?,
        OutputFormat::Yaml => print_show(&controls, OutputFormat::Yaml)?,
        OutputFormat::Id => {
            for mc in &controls {
                println!("{}", mc.id);
            }
        }
        _ => {
            println!(
                "{:<17} {:<24} {:<18} {:<10}",
                style("ID").bold(),
                style("MATERIAL").bold(),
                style("SUPPLIER").bold(),
                style("STATUS").bold()
            );
            println!("{}", "-".repeat(72));
            for mc in &controls {
                let status_styled = match mc.status {
                    MaterialStatus::Rejected => style(mc.status.to_string()).red(),
                    MaterialStatus::Approved => style(mc.status.to_string()).green(),
                    MaterialStatus::Pending => style(mc.status.to_string()).yellow(),
                };
                println!(
                    "{:<17} {:<24} {:<18} {:<10}",
                    format_short_id(&mc.id),
                    truncate_str(&mc.material_type, 22),
                    truncate_str(mc.supplier.as_deref().unwrap_or("-"), 16),
                    status_styled
                );
            }
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let id = parse_id(&args.id, EntityPrefix::Matc)?;
    let mc = store::find_material_control(store.conn(), &id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("No material control found matching '{}'", args.id))?;
    print_show(&mc, global.format)
}

fn run_status(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let status = args
        .status
        .parse::<MaterialStatus>()
        .map_err(|e| miette::miette!("{}", e))?;
    let id = parse_id(&args.id, EntityPrefix::Matc)?;

    let mut sink =
        StoreSink::open(&project.db_path()).map_err(|e| miette::miette!("{}", e))?;
    let roster = project.load_roster();

    let (mc, outcome) = escalation::set_material_status(
        &mut store,
        &mut sink,
        &roster,
        &id,
        status,
        &config.author(),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Material control {} is now {}",
        style("✓").green(),
        style(format_short_id(&mc.id)).cyan(),
        style(mc.status.to_string()).yellow()
    );
    if let Some(outcome) = outcome {
        report_notified(&outcome, global.quiet);
    }
    Ok(())
}

fn run_attach(args: AttachArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let id = parse_id(&args.id, EntityPrefix::Matc)?;
    if store::find_material_control(store.conn(), &id)
        .map_err(|e| miette::miette!("{}", e))?
        .is_none()
    {
        return Err(miette::miette!(
            "No material control found matching '{}'",
            args.id
        ));
    }

    let attachment = files::store_attachment(
        store.conn(),
        &project.attachments_dir(),
        "material_control",
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
