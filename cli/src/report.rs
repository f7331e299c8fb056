//! Report text for each command.
//!
//! Everything here renders to a `String`; printing is the caller's job. The
//! line prefixes are stable because downstream scripts match on them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use bchoc_ledger::{
    AddReceipt, Block, ChainReport, CustodyState, InitReport, LogReport, Violation,
    ViolationKind,
};

const GENESIS_CREATED: &str = "Blockchain file not found. Created INITIAL block.";
const GENESIS_FOUND: &str = "Blockchain file found with INITIAL block.";

/// ISO-8601 UTC with microseconds, e.g. `2024-03-09T16:00:00.250000Z`.
pub fn format_timestamp(timestamp: f64) -> String {
    let micros = (timestamp * 1_000_000.0).round() as i64;
    match DateTime::<Utc>::from_timestamp_micros(micros) {
        Some(at) => at.to_rfc3339_opts(SecondsFormat::Micros, true),
        None => format!("{timestamp}"),
    }
}

/// Joins report lines, each terminated by a newline.
fn render(lines: Vec<String>) -> String {
    lines.into_iter().map(|line| line + "\n").collect()
}

pub fn init(report: &InitReport) -> String {
    match report {
        InitReport::Created(_) => GENESIS_CREATED.to_string(),
        InitReport::Found(_) => GENESIS_FOUND.to_string(),
    }
}

pub fn add(receipt: &AddReceipt) -> String {
    let mut lines = Vec::new();
    if receipt.genesis_created() {
        lines.push(GENESIS_CREATED.to_string());
    }
    lines.push(format!("Case: {}", receipt.case_id));
    for block in &receipt.blocks {
        lines.push(format!("Added item: {}", block.evidence_id()));
        lines.extend(status(block));
    }
    render(lines)
}

/// Report for `checkout` and `checkin`.
pub fn moved(block: &Block) -> String {
    let verb = match block.state() {
        Ok(CustodyState::CheckedOut) => "Checked out item",
        _ => "Checked in item",
    };
    let mut lines = vec![
        format!("Case: {}", block.case_id()),
        format!("{verb}: {}", block.evidence_id()),
    ];
    lines.extend(status(block));
    render(lines)
}

pub fn removed(block: &Block) -> String {
    let mut lines = vec![
        format!("Case: {}", block.case_id()),
        format!("Removed item: {}", block.evidence_id()),
        format!("  Status: {}", block.header.state_label()),
    ];
    if !block.payload.is_empty() {
        lines.push(format!("  Owner info: {}", block.payload_text()));
    }
    lines.push(time_of_action(block));
    render(lines)
}

fn status(block: &Block) -> [String; 2] {
    [
        format!("  Status: {}", block.header.state_label()),
        time_of_action(block),
    ]
}

fn time_of_action(block: &Block) -> String {
    format!("  Time of action: {}", format_timestamp(block.header.timestamp))
}

/// Log entries, one stanza each, separated by blank lines.
pub fn log(report: &LogReport) -> String {
    let mut lines = Vec::new();
    if report.genesis_created {
        lines.push(GENESIS_CREATED.to_string());
    }
    for (i, entry) in report.entries.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.extend([
            format!("Case: {}", entry.case_id),
            format!("Item: {}", entry.evidence_id),
            format!("Action: {}", entry.state),
            format!("Time: {}", format_timestamp(entry.timestamp)),
        ]);
    }
    render(lines)
}

pub fn verify(report: &ChainReport) -> String {
    let mut lines = vec![format!("Transactions in blockchain: {}", report.block_count)];
    match &report.violation {
        None => lines.push("State of blockchain: CLEAN".to_string()),
        Some(violation) => lines.extend(violation_lines(violation)),
    }
    render(lines)
}

fn violation_lines(violation: &Violation) -> Vec<String> {
    let mut lines = vec![
        "State of blockchain: ERROR".to_string(),
        format!("Bad block: {}", violation.block),
    ];
    match violation.kind {
        ViolationKind::ParentNotFound => lines.push("Parent block: NOT FOUND".to_string()),
        ViolationKind::Fork => {
            if let Some(parent) = violation.parent {
                lines.push(format!("Parent block: {parent}"));
            }
            lines.push("Two blocks found with same parent.".to_string());
        }
        kind => {
            lines.push(format!("Item: {}", violation.evidence_id));
            lines.push(format!("Reason: {kind}"));
        }
    }
    lines
}

#[derive(Serialize)]
struct VerifyJson<'a> {
    clean: bool,
    #[serde(flatten)]
    report: &'a ChainReport,
}

pub fn verify_json(report: &ChainReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&VerifyJson {
        clean: report.is_clean(),
        report,
    })
}

pub fn log_json(report: &LogReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bchoc_ledger::{BlockDigest, CustodyEngine, FixedClock, LogQuery, RemovalReason};
    use uuid::Uuid;

    const CASE: Uuid = Uuid::from_u128(0x65cc_391d_6568_4dcc_a3f1_86a2_f041_40f3);
    // 2024-03-09T16:00:00Z
    const T0: f64 = 1_710_000_000.0;

    fn engine() -> CustodyEngine<bchoc_ledger::MemoryBackend, FixedClock> {
        CustodyEngine::in_memory(FixedClock::stepping(T0, 0.25))
    }

    #[test]
    fn timestamps_are_iso_utc_with_micros() {
        assert_eq!(format_timestamp(T0), "2024-03-09T16:00:00.000000Z");
        assert_eq!(format_timestamp(T0 + 0.25), "2024-03-09T16:00:00.250000Z");
        assert_eq!(format_timestamp(0.0), "1970-01-01T00:00:00.000000Z");
    }

    #[test]
    fn add_on_fresh_ledger() {
        let receipt = engine().add(CASE, &[1, 2]).unwrap();
        assert_eq!(
            add(&receipt),
            "Blockchain file not found. Created INITIAL block.\n\
             Case: 65cc391d-6568-4dcc-a3f1-86a2f04140f3\n\
             Added item: 1\n  Status: CHECKEDIN\n  Time of action: 2024-03-09T16:00:00.250000Z\n\
             Added item: 2\n  Status: CHECKEDIN\n  Time of action: 2024-03-09T16:00:00.500000Z\n"
        );
    }

    #[test]
    fn init_lines() {
        let mut engine = engine();
        assert_eq!(init(&engine.init().unwrap()), GENESIS_CREATED);
        assert_eq!(init(&engine.init().unwrap()), GENESIS_FOUND);
    }

    #[test]
    fn checkout_and_release() {
        let mut engine = engine();
        engine.add(CASE, &[4]).unwrap();
        let out = moved(&engine.checkout(4).unwrap());
        assert!(out.starts_with("Case: 65cc391d-6568-4dcc-a3f1-86a2f04140f3\nChecked out item: 4\n  Status: CHECKEDOUT\n"));
        let back = moved(&engine.checkin(4).unwrap());
        assert!(back.contains("Checked in item: 4\n  Status: CHECKEDIN\n"));

        let released = engine.remove(4, RemovalReason::Released, Some("Jane Roe")).unwrap();
        let out = removed(&released);
        assert!(out.contains("Removed item: 4\n  Status: RELEASED\n  Owner info: Jane Roe\n  Time of action: "));

        let mut other = self::engine();
        other.add(CASE, &[5]).unwrap();
        let out = removed(&other.remove(5, RemovalReason::Disposed, None).unwrap());
        assert!(!out.contains("Owner info"));
    }

    #[test]
    fn log_stanzas_are_blank_line_separated() {
        let mut engine = engine();
        engine.add(CASE, &[1]).unwrap();
        let report = engine.log(&LogQuery::default()).unwrap();
        assert_eq!(
            log(&report),
            "Case: 00000000-0000-0000-0000-000000000000\n\
             Item: 0\n\
             Action: INITIAL\n\
             Time: 2024-03-09T16:00:00.000000Z\n\
             \n\
             Case: 65cc391d-6568-4dcc-a3f1-86a2f04140f3\n\
             Item: 1\n\
             Action: CHECKEDIN\n\
             Time: 2024-03-09T16:00:00.250000Z\n"
        );
    }

    #[test]
    fn clean_verify() {
        let mut engine = engine();
        engine.add(CASE, &[1]).unwrap();
        assert_eq!(
            verify(&engine.verify().unwrap()),
            "Transactions in blockchain: 2\nState of blockchain: CLEAN\n"
        );
    }

    #[test]
    fn missing_parent_and_fork_lines() {
        let block = BlockDigest::from_bytes([0xAB; 20]);
        let parent = BlockDigest::from_bytes([0xCD; 20]);
        let mut violation = Violation {
            kind: ViolationKind::ParentNotFound,
            position: 3,
            evidence_id: 9,
            block,
            parent: Some(parent),
            sibling: None,
        };
        let report = ChainReport {
            block_count: 4,
            violation: Some(violation.clone()),
        };
        assert_eq!(
            verify(&report),
            format!(
                "Transactions in blockchain: 4\nState of blockchain: ERROR\nBad block: {block}\nParent block: NOT FOUND\n"
            )
        );

        violation.kind = ViolationKind::Fork;
        let report = ChainReport {
            block_count: 4,
            violation: Some(violation),
        };
        let out = verify(&report);
        assert!(out.ends_with(&format!(
            "Parent block: {parent}\nTwo blocks found with same parent.\n"
        )));
    }

    #[test]
    fn state_violation_names_item_and_reason() {
        let block = BlockDigest::from_bytes([0xAB; 20]);
        let report = ChainReport {
            block_count: 3,
            violation: Some(Violation {
                kind: ViolationKind::RepeatedState,
                position: 2,
                evidence_id: 1,
                block,
                parent: None,
                sibling: None,
            }),
        };
        assert_eq!(
            verify(&report),
            format!(
                "Transactions in blockchain: 3\nState of blockchain: ERROR\nBad block: {block}\n\
                 Item: 1\nReason: illegal repeated state\n"
            )
        );
    }

    #[test]
    fn first_log_announces_genesis_even_when_nothing_matches() {
        let mut engine = engine();
        let query = LogQuery {
            item_ids: [7].into(),
            ..LogQuery::default()
        };
        assert_eq!(log(&engine.log(&query).unwrap()), format!("{GENESIS_CREATED}\n"));
        assert_eq!(log(&engine.log(&query).unwrap()), "");
    }

    #[test]
    fn verify_json_carries_clean_flag() {
        let json = verify_json(&ChainReport {
            block_count: 0,
            violation: None,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["clean"], true);
        assert_eq!(value["block_count"], 0);
        assert!(value["violation"].is_null());
    }
}
