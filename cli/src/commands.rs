//! Dispatch from parsed arguments to the custody engine.

use std::io::Write;

use anyhow::{bail, Context, Result};

use bchoc_ledger::{Clock, CustodyEngine, LedgerBackend, LedgerError, LogQuery};

use crate::cli::Commands;
use crate::report;

/// Attach the command name and error kind to a ledger failure.
fn failed(command: &'static str) -> impl FnOnce(LedgerError) -> anyhow::Error {
    move |e| {
        let kind = e.kind();
        anyhow::Error::new(e).context(format!("{command} failed ({kind})"))
    }
}

/// Run one command and write its report to `out`.
///
/// A verification that finds a violation still prints its report, then
/// returns an error so the process exits non-zero.
pub fn execute<B, C, W>(engine: &mut CustodyEngine<B, C>, command: Commands, out: &mut W) -> Result<()>
where
    B: LedgerBackend,
    C: Clock,
    W: Write,
{
    let text = match command {
        Commands::Init => report::init(&engine.init().map_err(failed("init"))?),
        Commands::Add(args) => {
            let receipt = engine
                .add(args.case_id, &args.item_ids)
                .map_err(failed("add"))?;
            report::add(&receipt)
        }
        Commands::Checkout(args) => {
            report::moved(&engine.checkout(args.item_id).map_err(failed("checkout"))?)
        }
        Commands::Checkin(args) => {
            report::moved(&engine.checkin(args.item_id).map_err(failed("checkin"))?)
        }
        Commands::Remove(args) => {
            let block = engine
                .remove(args.item_id, args.reason, args.owner.as_deref())
                .map_err(failed("remove"))?;
            report::removed(&block)
        }
        Commands::Log(args) => {
            let query = LogQuery {
                case_ids: args.case_ids.into_iter().collect(),
                item_ids: args.item_ids.into_iter().collect(),
                reverse: args.reverse,
                limit: args.num_entries,
            };
            let log = engine.log(&query).map_err(failed("log"))?;
            if args.json {
                report::log_json(&log).context("failed to serialize log")?
            } else {
                report::log(&log)
            }
        }
        Commands::Verify(args) => {
            let chain = engine.verify().map_err(failed("verify"))?;
            let text = if args.json {
                report::verify_json(&chain).context("failed to serialize report")?
            } else {
                report::verify(&chain)
            };
            write_report(out, &text)?;
            if let Some(violation) = chain.violation {
                bail!("ledger failed verification: {violation}");
            }
            return Ok(());
        }
    };
    write_report(out, &text)
}

fn write_report<W: Write>(out: &mut W, text: &str) -> Result<()> {
    let written = if text.ends_with('\n') {
        out.write_all(text.as_bytes())
    } else {
        writeln!(out, "{text}")
    };
    written.context("failed to write report")
}
