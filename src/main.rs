use clap::Parser;
use miette::Result;
use shopqc::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .width(1000)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    match cli.command {
        Commands::Init(args) => shopqc::cli::commands::init::run(args),
        Commands::Job(cmd) => shopqc::cli::commands::job::run(cmd, &global),
        Commands::Material(cmd) => shopqc::cli::commands::material::run(cmd, &global),
        Commands::Extp(cmd) => shopqc::cli::commands::extp::run(cmd, &global),
        Commands::Measure(cmd) => shopqc::cli::commands::measure::run(cmd, &global),
        Commands::Exit(cmd) => shopqc::cli::commands::exit::run(cmd, &global),
        Commands::Err(cmd) => shopqc::cli::commands::err::run(cmd, &global),
        Commands::Roster(cmd) => shopqc::cli::commands::roster::run(cmd, &global),
        Commands::Completions(args) => shopqc::cli::commands::completions::run(args),
    }
}
