//! `rpt list` command - List reports visible in a container

use clap::Args;
use miette::Result;

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::Session;
use crate::cli::output::print_list;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only reports stored under this key
    #[arg(long, short = 'k')]
    pub key: Option<String>,

    /// List reports inherited from ancestor and shared containers instead
    #[arg(long)]
    pub inheritable: bool,
}

pub fn run(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let key = args.key.as_deref();

    let reports = if args.inheritable {
        session
            .service
            .get_inheritable_reports(session.user.as_ref(), &session.container, key)?
    } else {
        session
            .service
            .get_reports(session.user.as_ref(), &session.container, key)?
    };

    print_list(&reports, global.format)?;
    if !global.quiet && reports.is_empty() {
        eprintln!("No reports found in {}", session.container);
    }
    Ok(())
}
