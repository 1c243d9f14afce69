//! `rpt delete` command - Delete a saved report

use clap::Args;
use console::style;
use miette::Result;

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::Session;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Report id (`db:<rowId>` or a row id)
    pub id: String,
}

pub fn run(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
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

    let deleted = session.service.delete_report(&session.context(), report.as_ref())?;
    if !global.quiet {
        if deleted {
            println!(
                "{} Deleted report {} ({})",
                style("✓").green(),
                style(&id).cyan(),
                report.descriptor().name
            );
        } else {
            println!("{} Report {} was already gone", style("!").yellow(), id);
        }
    }
    Ok(())
}
