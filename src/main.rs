use clap::Parser;
use miette::Result;
use rpt::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
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
                .build(),
        )
    }))?;
    rpt::logging::init_tracing();

    let cli = Cli::parse();
    let global = cli.global;

    match cli.command {
        Commands::List(args) => rpt::cli::commands::list::run(args, &global),
        Commands::Show(args) => rpt::cli::commands::show::run(args, &global),
        Commands::Import(args) => rpt::cli::commands::import::run(args, &global),
        Commands::Delete(args) => rpt::cli::commands::delete::run(args, &global),
        Commands::Order(args) => rpt::cli::commands::order::run(args, &global),
        Commands::CategoryDeleted(args) => rpt::cli::commands::category::run(args, &global),
    }
}
