//! `shopqc exit` command - exit-control sampling and lot sign-off

use clap::Subcommand;
use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{format_short_id, open_project, parse_id, print_show, resolve_job};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityPrefix;
use crate::core::sampling;
use crate::core::{store, Config};
use crate::entities::exit_control::{ExitControl, ExitControlSample, LotStatus};

#[derive(Subcommand, Debug)]
pub enum ExitCommands {
    /// Open an exit control for a job, materializing the sampling plan
    New(NewArgs),

    /// Manually add extra sample positions to a lot
    AddSamples(AddSamplesArgs),

    /// Record the inspection result for one sampled unit
    Record(RecordArgs),

    /// Explicitly finalize an exit control
    Complete(CompleteArgs),

    /// List a job's exit controls
    List(ListArgs),

    /// Show an exit control and its samples
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Job number or id
    pub job: String,

    /// Number of physical units in the lot
    #[arg(long, short = 'n')]
    pub lot_qty: u32,

    /// Notes
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct AddSamplesArgs {
    /// Exit control id (EXIT-...)
    pub id: String,

    /// 1-based lot positions to add
    #[arg(required = true)]
    pub positions: Vec<u32>,
}

#[derive(clap::Args, Debug)]
pub struct RecordArgs {
    /// Exit control id (EXIT-...)
    pub id: String,

    /// 1-based lot position of the inspected unit
    #[arg(long, short = 'p')]
    pub position: u32,

    /// Dimensional check result
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub dimensions_ok: bool,

    /// Visual check result
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub visual_ok: bool,

    /// Surface finish check result
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub surface_ok: bool,

    /// Notes
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct CompleteArgs {
    /// Exit control id (EXIT-...)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Job number or id
    pub job: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Exit control id (EXIT-...)
    pub id: String,
}

/// Run an exit subcommand
pub fn run(cmd: ExitCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ExitCommands::New(args) => run_new(args, global),
        ExitCommands::AddSamples(args) => run_add_samples(args, global),
        ExitCommands::Record(args) => run_record(args, global),
        ExitCommands::Complete(args) => run_complete(args, global),
        ExitCommands::List(args) => run_list(args, global),
        ExitCommands::Show(args) => run_show(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let job = resolve_job(store.conn(), &args.job)?;
    let (ec, sample_count) = sampling::create(
        &mut store,
        &job.id,
        args.lot_qty,
        &config.author(),
        args.notes,
    )
    .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Exit control {} opened for {} (lot of {})",
        style("✓").green(),
        style(format_short_id(&ec.id)).cyan(),
        job.job_number,
        ec.lot_quantity
    );
    if !global.quiet {
        let positions = sampling::sample_positions(ec.lot_quantity);
        let rendered: Vec<String> = positions.iter().map(|p| p.to_string()).collect();
        println!(
            "   {} unit(s) to inspect: {}",
            sample_count,
            style(rendered.join(", ")).yellow()
        );
    }
    Ok(())
}

fn run_add_samples(args: AddSamplesArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let id = parse_id(&args.id, EntityPrefix::Exit)?;
    let added = sampling::add_samples(&mut store, &id, &args.positions)
        .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Added {} extra sample position(s)",
        style("✓").green(),
        style(added).cyan()
    );
    Ok(())
}

fn run_record(args: RecordArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let id = parse_id(&args.id, EntityPrefix::Exit)?;
    let sample = store::find_sample_by_position(store.conn(), &id, args.position)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| {
            miette::miette!(
                "Exit control has no sample at position {} (add it with 'shopqc exit add-samples')",
                args.position
            )
        })?;

    let outcome = sampling::record_sample(
        &mut store,
        &sample.id,
        args.dimensions_ok,
        args.visual_ok,
        args.surface_ok,
        args.notes,
        &config.author(),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    let verdict = if outcome.sample.overall_pass == Some(true) {
        style("pass").green()
    } else {
        style("FAIL").red().bold()
    };
    println!(
        "{} Unit {} recorded: {}",
        style("✓").green(),
        args.position,
        verdict
    );
    if !global.quiet {
        print_lot_outcome(outcome.lot_status, outcome.job_completed);
    }
    Ok(())
}

fn run_complete(args: CompleteArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let id = parse_id(&args.id, EntityPrefix::Exit)?;
    let (status, job_completed) = sampling::complete(&mut store, &id, &config.author())
        .map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Exit control {} finalized",
        style("✓").green(),
        style(format_short_id(&id)).cyan()
    );
    print_lot_outcome(status, job_completed);
    Ok(())
}

fn print_lot_outcome(status: LotStatus, job_completed: bool) {
    match status {
        LotStatus::Passed => {
            println!("   Lot {}", style("passed").green());
            if job_completed {
                println!("   {}", style("Job moved to complete").green());
            }
        }
        LotStatus::Failed => println!("   Lot {}", style("failed").red().bold()),
        LotStatus::InProgress => {
            println!("   Lot {}", style("still in progress").yellow())
        }
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let job = resolve_job(store.conn(), &args.job)?;
    let controls =
        store::list_exit_controls(store.conn(), &job.id).map_err(|e| miette::miette!("{}", e))?;
    if controls.is_empty() {
        println!("No exit controls on {}.", job.job_number);
        return Ok(());
    }

    match global.format {
        OutputFormat::Json => print_show(&controls, OutputFormat::Json)?,
        OutputFormat::Yaml => print_show(&controls, OutputFormat::Yaml)?,
        OutputFormat::Id => {
            for ec in &controls {
                println!("{}", ec.id);
            }
        }
        _ => {
            println!(
                "{:<17} {:<8} {:<12} {:<17}",
                style("ID").bold(),
                style("LOT").bold(),
                style("STATUS").bold(),
                style("CREATED").bold()
            );
            println!("{}", "-".repeat(56));
            for ec in &controls {
                let status_styled = match ec.overall_status {
                    LotStatus::Passed => style(ec.overall_status.to_string()).green(),
                    LotStatus::Failed => style(ec.overall_status.to_string()).red(),
                    LotStatus::InProgress => style(ec.overall_status.to_string()).yellow(),
                };
                println!(
                    "{:<17} {:<8} {:<12} {:<17}",
                    format_short_id(&ec.id),
                    ec.lot_quantity,
                    status_styled,
                    ec.created.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let id = parse_id(&args.id, EntityPrefix::Exit)?;
    let ec = store::find_exit_control(store.conn(), &id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("No exit control found matching '{}'", args.id))?;
    let samples =
        store::list_samples(store.conn(), &id).map_err(|e| miette::miette!("{}", e))?;

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            #[derive(serde::Serialize)]
            struct ExitDetail {
                #[serde(flatten)]
                exit_control: ExitControl,
                samples: Vec<ExitControlSample>,
            }
            print_show(
                &ExitDetail {
                    exit_control: ec,
                    samples,
                },
                global.format,
            )
        }
        _ => {
            println!(
                "Exit control {} | lot of {} | {}",
                style(format_short_id(&ec.id)).cyan(),
                ec.lot_quantity,
                style(ec.overall_status.to_string()).yellow()
            );
            let mut builder = Builder::default();
            builder.push_record(["POS", "DIMS", "VISUAL", "SURFACE", "OVERALL"]);
            for sample in &samples {
                builder.push_record([
                    sample.position.to_string(),
                    render_check(sample.dimensions_ok),
                    render_check(sample.visual_ok),
                    render_check(sample.surface_ok),
                    render_check(sample.overall_pass),
                ]);
            }
            println!("{}", builder.build().with(Style::sharp()));
            Ok(())
        }
    }
}

fn render_check(check: Option<bool>) -> String {
    match check {
        Some(true) => "ok".to_string(),
        Some(false) => "FAIL".to_string(),
        None => "-".to_string(),
    }
}
