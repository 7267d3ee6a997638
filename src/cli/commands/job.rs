//! `shopqc job` command - job management

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{format_short_id, open_project, print_show, resolve_job, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::lifecycle::{self, NewDimension, NewJob};
use crate::core::{audit, store, Config};
use crate::entities::dimension::JobDimension;
use crate::entities::job::{Job, WorkflowStage};

#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// Register a new job at PO receipt
    New(NewArgs),

    /// List jobs
    List(ListArgs),

    /// Show a job's details and dimensions
    Show(ShowArgs),

    /// Move a job to a workflow stage
    Stage(StageArgs),

    /// Mark the drawing revision as verified against the PO
    VerifyRev(VerifyRevArgs),

    /// Add a dimension to a job
    DimAdd(DimAddArgs),

    /// List a job's dimensions
    Dims(DimsArgs),

    /// Replace a job's dimensions with copies from another job
    DimCopy(DimCopyArgs),

    /// Show the audit trail of a job
    History(HistoryArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Purchase order number
    #[arg(long, short = 'p')]
    pub po: String,

    /// Part number
    #[arg(long, short = 'P')]
    pub part: String,

    /// Part revision
    #[arg(long, short = 'r')]
    pub rev: Option<String>,

    /// Part description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Customer name
    #[arg(long, short = 'c')]
    pub customer: Option<String>,

    /// Order quantity
    #[arg(long, short = 'n')]
    pub qty: u32,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<NaiveDate>,

    /// Drawing number
    #[arg(long)]
    pub drawing: Option<String>,

    /// Special requirements
    #[arg(long)]
    pub requirements: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by workflow stage
    #[arg(long, short = 's')]
    pub stage: Option<String>,

    /// Limit number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Job number or id
    pub job: String,
}

#[derive(clap::Args, Debug)]
pub struct StageArgs {
    /// Job number or id
    pub job: String,

    /// Target workflow stage
    pub stage: String,
}

#[derive(clap::Args, Debug)]
pub struct VerifyRevArgs {
    /// Job number or id
    pub job: String,
}

#[derive(clap::Args, Debug)]
pub struct DimAddArgs {
    /// Job number or id
    pub job: String,

    /// Dimension name (e.g. "bore diameter")
    #[arg(long, short = 'N')]
    pub name: String,

    /// Nominal value
    #[arg(long)]
    pub nominal: f64,

    /// Plus tolerance (signed)
    #[arg(long, allow_hyphen_values = true)]
    pub plus: Option<f64>,

    /// Minus tolerance (signed, conventionally <= 0)
    #[arg(long, allow_hyphen_values = true)]
    pub minus: Option<f64>,

    /// Unit of measure ("go/nogo" marks a gauge check)
    #[arg(long, short = 'u', default_value = "mm")]
    pub unit: String,

    /// Drawing zone reference
    #[arg(long = "ref")]
    pub drawing_reference: Option<String>,

    /// Mark as a critical characteristic
    #[arg(long)]
    pub critical: bool,
}

#[derive(clap::Args, Debug)]
pub struct DimsArgs {
    /// Job number or id
    pub job: String,
}

#[derive(clap::Args, Debug)]
pub struct DimCopyArgs {
    /// Target job number or id
    pub job: String,

    /// Source job number or id to copy dimensions from
    #[arg(long)]
    pub from: String,
}

#[derive(clap::Args, Debug)]
pub struct HistoryArgs {
    /// Job number or id
    pub job: String,
}

/// Run a job subcommand
pub fn run(cmd: JobCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        JobCommands::New(args) => run_new(args, global),
        JobCommands::List(args) => run_list(args, global),
        JobCommands::Show(args) => run_show(args, global),
        JobCommands::Stage(args) => run_stage(args, global),
        JobCommands::VerifyRev(args) => run_verify_rev(args, global),
        JobCommands::DimAdd(args) => run_dim_add(args, global),
        JobCommands::Dims(args) => run_dims(args, global),
        JobCommands::DimCopy(args) => run_dim_copy(args, global),
        JobCommands::History(args) => run_history(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let input = NewJob {
        po_number: args.po,
        customer: args.customer,
        part_number: args.part,
        part_revision: args.rev,
        part_description: args.description,
        quantity: args.qty,
        due_date: args.due,
        drawing_number: args.drawing,
        special_requirements: args.requirements,
        dimensions: Vec::new(),
    };

    let job = lifecycle::create_job(&mut store, input, &config.author())
        .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Created job {} ({})",
        style("✓").green(),
        style(&job.job_number).cyan(),
        style(format_short_id(&job.id)).dim()
    );
    if !global.quiet {
        let rev = if job.part_revision.is_empty() {
            String::new()
        } else {
            format!(" rev {}", job.part_revision)
        };
        println!(
            "   {}{} | qty {} | PO {}",
            style(&job.part_number).white(),
            rev,
            job.quantity,
            job.po_number
        );
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let stage = match args.stage.as_deref() {
        Some(s) => Some(
            s.parse::<WorkflowStage>()
                .map_err(|e| miette::miette!("{}", e))?,
        ),
        None => None,
    };

    let mut jobs = store::list_jobs(store.conn(), stage).map_err(|e| miette::miette!("{}", e))?;
    if let Some(limit) = args.limit {
        jobs.truncate(limit);
    }

    if args.count {
        println!("{}", jobs.len());
        return Ok(());
    }
    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    match global.format {
        OutputFormat::Json => print_show(&jobs, OutputFormat::Json)?,
        OutputFormat::Yaml => print_show(&jobs, OutputFormat::Yaml)?,
        OutputFormat::Id => {
            for job in &jobs {
                println!("{}", job.id);
            }
        }
        OutputFormat::Auto | OutputFormat::Tsv => {
            println!(
                "{:<10} {:<14} {:<18} {:<5} {:<6} {:<16} {:<10}",
                style("JOB").bold(),
                style("PO").bold(),
                style("PART").bold(),
                style("REV").bold(),
                style("QTY").bold(),
                style("STAGE").bold(),
                style("DUE").bold()
            );
            println!("{}", "-".repeat(84));
            for job in &jobs {
                println!(
                    "{:<10} {:<14} {:<18} {:<5} {:<6} {:<16} {:<10}",
                    style(&job.job_number).cyan(),
                    truncate_str(&job.po_number, 12),
                    truncate_str(&job.part_number, 16),
                    job.part_revision,
                    job.quantity,
                    styled_stage(job),
                    job.due_date.map(|d| d.to_string()).unwrap_or_default()
                );
            }
            println!();
            println!("{} job(s) found.", style(jobs.len()).cyan());
        }
    }
    Ok(())
}

fn styled_stage(job: &Job) -> console::StyledObject<String> {
    let s = job.workflow_stage.to_string();
    match job.workflow_stage {
        WorkflowStage::Complete => style(s).green(),
        WorkflowStage::OnHold => style(s).yellow(),
        _ => style(s).white(),
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let job = resolve_job(store.conn(), &args.job)?;
    let dimensions =
        store::list_dimensions(store.conn(), &job.id).map_err(|e| miette::miette!("{}", e))?;

    #[derive(serde::Serialize)]
    struct JobDetail {
        #[serde(flatten)]
        job: Job,
        dimensions: Vec<JobDimension>,
    }

    print_show(&JobDetail { job, dimensions }, global.format)
}

fn run_stage(args: StageArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let stage = args
        .stage
        .parse::<WorkflowStage>()
        .map_err(|e| miette::miette!("{}", e))?;

    let job = resolve_job(store.conn(), &args.job)?;
    let old_stage = job.workflow_stage;
    let updated = lifecycle::set_stage(&mut store, &job.id, stage, &config.author())
        .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} {} moved {} -> {}",
        style("✓").green(),
        style(&updated.job_number).cyan(),
        old_stage,
        style(updated.workflow_stage.to_string()).yellow()
    );
    if !global.quiet {
        if updated.workflow_stage == WorkflowStage::Complete {
            println!("   {}", style("Completion timestamp set").dim());
        } else if old_stage == WorkflowStage::Complete {
            println!("   {}", style("Completion timestamp cleared").dim());
        }
    }
    Ok(())
}

fn run_verify_rev(args: VerifyRevArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let job = resolve_job(store.conn(), &args.job)?;
    let updated = lifecycle::verify_revision(&mut store, &job.id, &config.author())
        .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Drawing revision verified for {} by {}",
        style("✓").green(),
        style(&updated.job_number).cyan(),
        updated.revision_verified_by.unwrap_or_default()
    );
    Ok(())
}

fn run_dim_add(args: DimAddArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let job = resolve_job(store.conn(), &args.job)?;
    let dim = lifecycle::add_dimension(
        &mut store,
        &job.id,
        NewDimension {
            name: args.name,
            nominal: args.nominal,
            tolerance_plus: args.plus,
            tolerance_minus: args.minus,
            unit: args.unit,
            drawing_reference: args.drawing_reference,
            critical: args.critical,
        },
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Added dimension {} '{}' to {}",
        style("✓").green(),
        style(dim.dimension_number).cyan(),
        dim.name,
        job.job_number
    );
    Ok(())
}

fn run_dims(args: DimsArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let job = resolve_job(store.conn(), &args.job)?;
    let dims =
        store::list_dimensions(store.conn(), &job.id).map_err(|e| miette::miette!("{}", e))?;
    if dims.is_empty() {
        println!("No dimensions on {}.", job.job_number);
        return Ok(());
    }

    match global.format {
        OutputFormat::Json => print_show(&dims, OutputFormat::Json)?,
        OutputFormat::Yaml => print_show(&dims, OutputFormat::Yaml)?,
        OutputFormat::Id => {
            for dim in &dims {
                println!("{}", dim.id);
            }
        }
        _ => {
            let mut builder = Builder::default();
            builder.push_record(["#", "NAME", "NOMINAL", "+TOL", "-TOL", "UNIT", "CRIT"]);
            for dim in &dims {
                builder.push_record([
                    dim.dimension_number.to_string(),
                    truncate_str(&dim.name, 28),
                    format!("{}", dim.nominal),
                    dim.tolerance_plus.map(|t| t.to_string()).unwrap_or_default(),
                    dim.tolerance_minus.map(|t| t.to_string()).unwrap_or_default(),
                    dim.unit.clone(),
                    if dim.critical { "yes".to_string() } else { String::new() },
                ]);
            }
            println!("{}", builder.build().with(Style::sharp()));
        }
    }
    Ok(())
}

fn run_dim_copy(args: DimCopyArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let target = resolve_job(store.conn(), &args.job)?;
    let source = resolve_job(store.conn(), &args.from)?;
    let copied = lifecycle::copy_dimensions(&mut store, &target.id, &source.id)
        .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Copied {} dimension(s) from {} to {}",
        style("✓").green(),
        style(copied).cyan(),
        source.job_number,
        target.job_number
    );
    Ok(())
}

fn run_history(args: HistoryArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let job = resolve_job(store.conn(), &args.job)?;
    let entries = audit::history(store.conn(), "job", &job.id.to_string())
        .map_err(|e| miette::miette!("{}", e))?;
    if entries.is_empty() {
        println!("No audit entries for {}.", job.job_number);
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{} {:<14} {:<10} {}",
            style(entry.created.format("%Y-%m-%d %H:%M").to_string()).dim(),
            style(&entry.action).yellow(),
            entry.actor.as_deref().unwrap_or("-"),
            entry.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
