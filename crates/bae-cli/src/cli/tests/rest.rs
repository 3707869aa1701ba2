//! Tests for status, pause, resume, remove.

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_status_all() {
    match parse(&["bae", "status"]) {
        CliCommand::Status { id } => assert!(id.is_none()),
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_status_one() {
    match parse(&["bae", "status", "5"]) {
        CliCommand::Status { id } => assert_eq!(id, Some(5)),
        _ => panic!("expected Status with id"),
    }
}

#[test]
fn cli_parse_pause() {
    match parse(&["bae", "pause", "42"]) {
        CliCommand::Pause { id } => assert_eq!(id, 42),
        _ => panic!("expected Pause"),
    }
}

#[test]
fn cli_parse_resume() {
    match parse(&["bae", "resume", "1"]) {
        CliCommand::Resume { id } => assert_eq!(id, 1),
        _ => panic!("expected Resume"),
    }
}

#[test]
fn cli_parse_remove() {
    match parse(&["bae", "remove", "99"]) {
        CliCommand::Remove { id } => assert_eq!(id, 99),
        _ => panic!("expected Remove"),
    }
}
