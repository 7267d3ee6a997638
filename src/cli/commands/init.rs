//! `shopqc init` command - Initialize a new shopqc project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::core::project::{Project, ProjectError};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Force initialization even if .shopqc/ already exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    let project = if args.force {
        Project::init_force(&path)
    } else {
        Project::init(&path)
    };

    match project {
        Ok(project) => {
            println!(
                "{} Initialized shopqc project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!();
            println!("Created:");
            println!("  {}", style(".shopqc/quality.db").dim());
            println!("  {}", style(".shopqc/config.yaml").dim());
            println!("  {}", style(".shopqc/roster.yaml").dim());
            println!("  {}", style(".shopqc/attachments/").dim());
            println!();
            println!("Next steps:");
            println!(
                "  {} Add quality-role users to the roster",
                style("shopqc roster add").yellow()
            );
            println!(
                "  {} Register your first job",
                style("shopqc job new").yellow()
            );
            println!("  {} List all jobs", style("shopqc job list").yellow());
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} shopqc project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to reinitialize",
                style("shopqc init --force").yellow()
            );
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}
