// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # bchoc
//!
//! Entry point for the `bchoc` binary. Parses CLI arguments, initializes
//! logging, opens the ledger file, and runs one custody command:
//!
//! - `init`    : create or check the ledger
//! - `add`     : check new items in under a case
//! - `checkout`: hand an item out
//! - `checkin` : take an item back
//! - `remove`  : dispose of, destroy, or release an item
//! - `log`     : show custody history
//! - `verify`  : check the ledger for tampering

mod cli;
mod commands;
mod logging;
mod report;

use anyhow::{Context, Result};
use clap::Parser;

use bchoc_ledger::{CustodyEngine, LedgerConfig};

use cli::BchocCli;

fn main() -> Result<()> {
    let cli = BchocCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.global.log_format);

    let config = LedgerConfig::new(&cli.global.file);
    tracing::debug!(path = %config.path.display(), "using ledger file");

    let mut engine = CustodyEngine::open(config);
    let stdout = std::io::stdout();
    commands::execute(&mut engine, cli.command, &mut stdout.lock())
        .with_context(|| format!("ledger {}", cli.global.file.display()))
}
