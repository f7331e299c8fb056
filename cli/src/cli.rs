//! # CLI Interface
//!
//! Defines the command-line argument structure for `bchoc` using `clap`
//! derive. One subcommand per custody command: `init`, `add`, `checkout`,
//! `checkin`, `remove`, `log`, and `verify`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use bchoc_ledger::config::{DEFAULT_LEDGER_FILE, LEDGER_PATH_ENV};
use bchoc_ledger::RemovalReason;

use crate::logging::LogFormat;

/// Evidence chain-of-custody ledger.
///
/// Records every custody event for physical evidence items in an
/// append-only, hash-linked ledger file, and verifies that the file has not
/// been tampered with.
#[derive(Parser, Debug)]
#[command(
    name = "bchoc",
    about = "Evidence chain-of-custody ledger",
    version,
    propagate_version = true
)]
pub struct BchocCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Path to the ledger file.
    #[arg(long, global = true, env = LEDGER_PATH_ENV, default_value = DEFAULT_LEDGER_FILE)]
    pub file: PathBuf,

    /// Diagnostic log format on stderr. Filter with `RUST_LOG`.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Top-level subcommands for the `bchoc` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the ledger with its INITIAL block, or check the existing one.
    Init,
    /// Check new evidence items into custody under a case.
    Add(AddArgs),
    /// Hand a checked-in item out.
    Checkout(ItemArgs),
    /// Return a checked-out item.
    Checkin(ItemArgs),
    /// Take a checked-in item out of custody for good.
    Remove(RemoveArgs),
    /// Show custody history.
    Log(LogArgs),
    /// Check the whole ledger for tampering.
    Verify(VerifyArgs),
}

/// Arguments for the `add` subcommand.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Case the items belong to.
    #[arg(short = 'c', long = "case-id")]
    pub case_id: Uuid,

    /// Evidence item id; repeat for several items.
    #[arg(short = 'i', long = "item-id", required = true)]
    pub item_ids: Vec<u32>,
}

/// A single evidence item.
#[derive(Args, Debug)]
pub struct ItemArgs {
    /// Evidence item id.
    #[arg(short = 'i', long = "item-id")]
    pub item_id: u32,
}

/// Arguments for the `remove` subcommand.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Evidence item id.
    #[arg(short = 'i', long = "item-id")]
    pub item_id: u32,

    /// DISPOSED, DESTROYED or RELEASED.
    #[arg(short = 'y', long = "why", visible_alias = "reason")]
    pub reason: RemovalReason,

    /// Who the item is released to. Required for RELEASED.
    #[arg(short = 'o', long = "owner")]
    pub owner: Option<String>,
}

/// Arguments for the `log` subcommand.
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Newest entries first.
    #[arg(short = 'r', long = "reverse")]
    pub reverse: bool,

    /// Show at most this many entries; 0 shows all.
    #[arg(short = 'n', long = "num-entries")]
    pub num_entries: Option<usize>,

    /// Only entries for this case; repeatable.
    #[arg(short = 'c', long = "case-id")]
    pub case_ids: Vec<Uuid>,

    /// Only entries for this item; repeatable.
    #[arg(short = 'i', long = "item-id")]
    pub item_ids: Vec<u32>,

    /// Print entries as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `verify` subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> BchocCli {
        BchocCli::try_parse_from(std::iter::once("bchoc").chain(args.iter().copied()))
            .unwrap_or_else(|e| panic!("failed to parse {args:?}: {e}"))
    }

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        BchocCli::command().debug_assert();
    }

    #[test]
    fn add_takes_case_and_repeated_items() {
        let cli = parse(&[
            "add",
            "-c",
            "65cc391d-6568-4dcc-a3f1-86a2f04140f3",
            "-i",
            "1",
            "-i",
            "2",
        ]);
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.case_id.as_u128(), 0x65cc391d65684dcca3f186a2f04140f3);
                assert_eq!(args.item_ids, vec![1, 2]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn add_requires_an_item_and_a_valid_case() {
        assert!(BchocCli::try_parse_from(["bchoc", "add", "-c", "65cc391d-6568-4dcc-a3f1-86a2f04140f3"]).is_err());
        assert!(BchocCli::try_parse_from(["bchoc", "add", "-c", "not-a-uuid", "-i", "1"]).is_err());
        assert!(BchocCli::try_parse_from(["bchoc", "add", "-c", "65cc391d-6568-4dcc-a3f1-86a2f04140f3", "-i", "-5"]).is_err());
    }

    #[test]
    fn checkout_and_checkin_take_one_item() {
        assert!(matches!(parse(&["checkout", "-i", "7"]).command, Commands::Checkout(ItemArgs { item_id: 7 })));
        assert!(matches!(parse(&["checkin", "-i", "7"]).command, Commands::Checkin(ItemArgs { item_id: 7 })));
    }

    #[test]
    fn remove_accepts_short_and_long_reason() {
        for flag in ["-y", "--why"] {
            let cli = parse(&["remove", "-i", "3", flag, "RELEASED", "-o", "Jane Roe"]);
            match cli.command {
                Commands::Remove(args) => {
                    assert_eq!(args.item_id, 3);
                    assert_eq!(args.reason, RemovalReason::Released);
                    assert_eq!(args.owner.as_deref(), Some("Jane Roe"));
                }
                other => panic!("unexpected command {other:?}"),
            }
        }
        assert!(BchocCli::try_parse_from(["bchoc", "remove", "-i", "3", "-y", "LOST"]).is_err());
    }

    #[test]
    fn log_flags() {
        let cli = parse(&["log", "--reverse", "-n", "2", "-i", "1", "-i", "4", "--json"]);
        match cli.command {
            Commands::Log(args) => {
                assert!(args.reverse);
                assert!(args.json);
                assert_eq!(args.num_entries, Some(2));
                assert_eq!(args.item_ids, vec![1, 4]);
                assert!(args.case_ids.is_empty());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(matches!(parse(&["log", "-r"]).command, Commands::Log(LogArgs { reverse: true, .. })));
    }

    #[test]
    fn file_flag_works_after_subcommand() {
        let cli = parse(&["verify", "--file", "/tmp/custody.bin", "--log-format", "json"]);
        assert_eq!(cli.global.file, PathBuf::from("/tmp/custody.bin"));
        assert_eq!(cli.global.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Verify(VerifyArgs { json: false })));
    }
}
