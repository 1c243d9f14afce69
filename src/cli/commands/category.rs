//! `rpt category-deleted` command - Clear a deleted category from reports

use clap::Args;
use console::style;
use miette::Result;

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::Session;

#[derive(Args, Debug)]
pub struct CategoryDeletedArgs {
    /// Id of the category that was deleted
    pub category_id: i64,
}

pub fn run(args: CategoryDeletedArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let updated = session
        .service
        .on_category_deleted(&session.context(), args.category_id)?;

    if !global.quiet {
        println!(
            "{} Cleared category {} from {} report(s) in {}",
            style("✓").green(),
            args.category_id,
            style(updated).cyan(),
            session.container
        );
    }
    Ok(())
}
