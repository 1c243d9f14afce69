//! `rpt show` command - Show a single report

use clap::Args;
use miette::Result;

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::Session;
use crate::cli::output::print_report;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Report id (`db:<rowId>`, `module:<module>/<path>` or a row id)
    pub id: String,
}

pub fn run(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let id = session.parse_id(&args.id)?;

    let Some(report) = session
        .service
        .find_report(session.user.as_ref(), &session.container, &id)?
    else {
        return Err(miette::miette!(
            "Report {} not found in {}",
            id,
            session.container
        ));
    };
    print_report(report.as_ref(), global.format)
}
