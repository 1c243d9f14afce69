//! `rpt order` command - Change a report's display order

use clap::Args;
use console::style;
use miette::Result;

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::Session;

#[derive(Args, Debug)]
pub struct OrderArgs {
    /// Report id (`db:<rowId>` or a row id)
    pub id: String,

    /// New display order (0 = natural order)
    #[arg(allow_negative_numbers = true)]
    pub display_order: i32,
}

pub fn run(args: OrderArgs, global: &GlobalOpts) -> Result<()> {
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

    let saved = session.service.set_report_display_order(
        &session.context(),
        report.as_ref(),
        args.display_order,
    )?;
    if !global.quiet {
        println!(
            "{} {} now has display order {}",
            style("✓").green(),
            style(saved.id()).cyan(),
            saved.descriptor().display_order
        );
    }
    Ok(())
}
