//! `shopqc roster` command - quality roster and role management

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::open_project;
use crate::cli::GlobalOpts;
use crate::core::roster::{quality_notification_users, Role, RosterMember};

#[derive(Subcommand, Debug)]
pub enum RosterCommands {
    /// Add a member to the roster
    Add(AddArgs),

    /// List roster members
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Username
    pub username: String,

    /// Full name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Email address
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// Roles: operator, quality_manager, admin (repeatable)
    #[arg(long, short = 'r', default_value = "operator")]
    pub role: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show only the recipients of quality-escalation notifications
    #[arg(long)]
    pub quality: bool,
}

/// Run a roster subcommand
pub fn run(cmd: RosterCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RosterCommands::Add(args) => run_add(args, global),
        RosterCommands::List(args) => run_list(args, global),
    }
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut roster = project.load_roster();

    if roster.find_member(&args.username).is_some() {
        return Err(miette::miette!(
            "Member '{}' is already on the roster",
            args.username
        ));
    }

    let mut roles = Vec::new();
    for role in &args.role {
        roles.push(role.parse::<Role>().map_err(|e| miette::miette!("{}", e))?);
    }

    let member = RosterMember {
        name: args.name.clone().unwrap_or_else(|| args.username.clone()),
        username: args.username.clone(),
        email: args.email,
        roles,
        active: true,
    };
    roster.add_member(member);
    roster.save(&project.roster_path()).into_diagnostic()?;

    println!(
        "{} Added {} to the roster",
        style("✓").green(),
        style(&args.username).cyan()
    );
    if !global.quiet {
        let roles: Vec<String> = args.role.clone();
        println!("   roles: {}", style(roles.join(", ")).yellow());
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let roster = project.load_roster();

    if args.quality {
        let users = quality_notification_users(&roster);
        if users.is_empty() {
            println!("No quality-oversight users in the roster.");
            return Ok(());
        }
        for user in users {
            println!("{}", user);
        }
        return Ok(());
    }

    if roster.members.is_empty() {
        println!("The roster is empty. Add members with 'shopqc roster add'.");
        return Ok(());
    }

    println!(
        "{:<14} {:<22} {:<32} {:<8}",
        style("USERNAME").bold(),
        style("NAME").bold(),
        style("ROLES").bold(),
        style("ACTIVE").bold()
    );
    println!("{}", "-".repeat(78));
    for member in &roster.members {
        let roles: Vec<String> = member.roles.iter().map(|r| r.to_string()).collect();
        println!(
            "{:<14} {:<22} {:<32} {:<8}",
            style(&member.username).cyan(),
            member.name,
            roles.join(", "),
            if member.active { "yes" } else { "no" }
        );
    }
    if !global.quiet {
        println!();
        println!("{} member(s).", style(roster.members.len()).cyan());
    }
    Ok(())
}
