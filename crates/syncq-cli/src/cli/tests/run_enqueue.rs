//! Tests for run, enqueue and select.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;
use syncq_core::selection::QualityPreference;
use syncq_core::JobType;

#[test]
fn cli_parse_run_defaults() {
    match parse(&["syncq", "run"]) {
        CliCommand::Run {
            workers,
            batch,
            until_idle,
        } => {
            assert!(workers.is_none());
            assert!(batch.is_none());
            assert!(!until_idle);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_with_options() {
    match parse(&[
        "syncq",
        "run",
        "--workers",
        "2",
        "--batch",
        "jobs.toml",
        "--until-idle",
    ]) {
        CliCommand::Run {
            workers,
            batch,
            until_idle,
        } => {
            assert_eq!(workers, Some(2));
            assert_eq!(batch, Some(PathBuf::from("jobs.toml")));
            assert!(until_idle);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_enqueue() {
    match parse(&[
        "syncq",
        "enqueue",
        "download",
        "--payload",
        r#"{"query":"Xtal"}"#,
        "--priority",
        "-3",
        "--max-retries",
        "1",
    ]) {
        CliCommand::Enqueue {
            job_type,
            payload,
            priority,
            max_retries,
        } => {
            assert_eq!(job_type, JobType::Download);
            assert_eq!(payload, r#"{"query":"Xtal"}"#);
            assert_eq!(priority, -3);
            assert_eq!(max_retries, Some(1));
        }
        _ => panic!("expected Enqueue"),
    }
}

#[test]
fn cli_parse_enqueue_defaults() {
    match parse(&["syncq", "enqueue", "library_scan"]) {
        CliCommand::Enqueue {
            job_type,
            payload,
            priority,
            max_retries,
        } => {
            assert_eq!(job_type, JobType::LibraryScan);
            assert_eq!(payload, "{}");
            assert_eq!(priority, 0);
            assert!(max_retries.is_none());
        }
        _ => panic!("expected Enqueue"),
    }
}

#[test]
fn cli_rejects_unknown_job_type() {
    assert!(Cli::try_parse_from(["syncq", "enqueue", "podcast"]).is_err());
}

#[test]
fn cli_parse_select() {
    match parse(&["syncq", "select", "results.json", "--quality", "good"]) {
        CliCommand::Select { path, quality } => {
            assert_eq!(path, PathBuf::from("results.json"));
            assert_eq!(quality, Some(QualityPreference::Good));
        }
        _ => panic!("expected Select"),
    }
}
