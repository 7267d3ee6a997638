//! `shopqc measure` command - measurement report intake

use clap::Subcommand;
use console::style;
use miette::Result;
use std::collections::HashMap;

use crate::cli::helpers::{format_short_id, open_project, parse_id, print_show, resolve_job};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityPrefix;
use crate::core::measurement::{self, MeasurementEntry};
use crate::core::{store, Config};
use crate::entities::measurement::{Measurement, MeasurementReport, ReportKind, ReportStatus};

#[derive(Subcommand, Debug)]
pub enum MeasureCommands {
    /// Record a batch of measurements as a new report
    New(NewArgs),

    /// List a job's measurement reports
    List(ListArgs),

    /// Show a report and its measurements
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Job number or id
    pub job: String,

    /// Measured values as DIM_NUMBER=VALUE (repeat a dimension for
    /// multiple samples, e.g. 1=10.02 1=10.05 2=1)
    #[arg(required = true)]
    pub entries: Vec<String>,

    /// Report kind
    #[arg(long, short = 'k', default_value = "in_process")]
    pub kind: String,

    /// Measurement equipment used
    #[arg(long, short = 'e')]
    pub equipment: Option<String>,

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
    /// Measurement report id (RPT-...)
    pub id: String,
}

/// Run a measure subcommand
pub fn run(cmd: MeasureCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        MeasureCommands::New(args) => run_new(args, global),
        MeasureCommands::List(args) => run_list(args, global),
        MeasureCommands::Show(args) => run_show(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = project.open_store().map_err(|e| miette::miette!("{}", e))?;
    let config = Config::load();

    let kind = args
        .kind
        .parse::<ReportKind>()
        .map_err(|e| miette::miette!("{}", e))?;

    let job = resolve_job(store.conn(), &args.job)?;
    let dimensions =
        store::list_dimensions(store.conn(), &job.id).map_err(|e| miette::miette!("{}", e))?;

    // Repeated mentions of the same dimension become successive samples
    let mut sample_counters: HashMap<u32, u32> = HashMap::new();
    let mut entries = Vec::with_capacity(args.entries.len());
    for raw in &args.entries {
        let (number, value) = raw.split_once('=').ok_or_else(|| {
            miette::miette!("Invalid entry '{}': expected DIM_NUMBER=VALUE", raw)
        })?;
        let number: u32 = number
            .trim()
            .parse()
            .map_err(|_| miette::miette!("Invalid dimension number in '{}'", raw))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| miette::miette!("Invalid measured value in '{}'", raw))?;

        let dimension = dimensions
            .iter()
            .find(|d| d.dimension_number == number)
            .ok_or_else(|| {
                miette::miette!("Job {} has no dimension {}", job.job_number, number)
            })?;

        let sample = sample_counters.entry(number).or_insert(0);
        *sample += 1;
        let mut entry = MeasurementEntry::new(dimension.id.clone(), value);
        entry.sample_number = *sample;
        entry.equipment = args.equipment.clone();
        entries.push(entry);
    }

    let report = measurement::create_report(
        &mut store,
        &job.id,
        kind,
        &entries,
        &config.author(),
        args.notes,
    )
    .map_err(|e| miette::miette!("{}", e))?;

    let status_styled = match report.overall_status {
        ReportStatus::Pass => style(report.overall_status.to_string()).green(),
        ReportStatus::Fail => style(report.overall_status.to_string()).red(),
        ReportStatus::Pending => style(report.overall_status.to_string()).yellow(),
    };
    println!(
        "{} Report {} for {}: {}",
        style("✓").green(),
        style(format_short_id(&report.id)).cyan(),
        job.job_number,
        status_styled
    );
    if !global.quiet {
        println!("   {} measurement(s) recorded", entries.len());
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let job = resolve_job(store.conn(), &args.job)?;
    let reports = store::list_measurement_reports(store.conn(), &job.id)
        .map_err(|e| miette::miette!("{}", e))?;
    if reports.is_empty() {
        println!("No measurement reports on {}.", job.job_number);
        return Ok(());
    }

    match global.format {
        OutputFormat::Json => print_show(&reports, OutputFormat::Json)?,
        OutputFormat::Yaml => print_show(&reports, OutputFormat::Yaml)?,
        OutputFormat::Id => {
            for report in &reports {
                println!("{}", report.id);
            }
        }
        _ => {
            println!(
                "{:<17} {:<12} {:<12} {:<10} {:<17}",
                style("ID").bold(),
                style("KIND").bold(),
                style("INSPECTOR").bold(),
                style("STATUS").bold(),
                style("CREATED").bold()
            );
            println!("{}", "-".repeat(70));
            for report in &reports {
                let status_styled = match report.overall_status {
                    ReportStatus::Pass => style(report.overall_status.to_string()).green(),
                    ReportStatus::Fail => style(report.overall_status.to_string()).red(),
                    ReportStatus::Pending => style(report.overall_status.to_string()).yellow(),
                };
                println!(
                    "{:<17} {:<12} {:<12} {:<10} {:<17}",
                    format_short_id(&report.id),
                    report.kind.to_string(),
                    report.inspector.as_deref().unwrap_or("-"),
                    status_styled,
                    report.created.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = project.open_store().map_err(|e| miette::miette!("{}", e))?;

    let id = parse_id(&args.id, EntityPrefix::Rpt)?;
    let report = store::find_measurement_report(store.conn(), &id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("No measurement report found matching '{}'", args.id))?;
    let measurements =
        store::list_measurements(store.conn(), &id).map_err(|e| miette::miette!("{}", e))?;

    #[derive(serde::Serialize)]
    struct ReportDetail {
        #[serde(flatten)]
        report: MeasurementReport,
        measurements: Vec<Measurement>,
    }

    print_show(
        &ReportDetail {
            report,
            measurements,
        },
        global.format,
    )
}
