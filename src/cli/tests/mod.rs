//! Unit tests for CLI module
//!
//! Tests argument handling and output formatting.
//! No registry access or command execution.

#![allow(clippy::unwrap_used)]

use std::{path::PathBuf, time::Instant};

use clap::Parser;

use crate::cli::{
    Cli, CliError, Commands, SourceArgs,
    formatting::{format_entry, format_reload_header, format_value},
};
use crate::provider::ReloadEvent;
use crate::registry::Hive;

fn source_args(root_key: Option<&str>) -> SourceArgs {
    SourceArgs {
        hive_dir: PathBuf::from("/tmp/hive"),
        hive: Hive::CurrentUser,
        root_key: root_key.map(str::to_string),
        source: None,
        required: false,
        delay_ms: None,
    }
}

#[test]
fn format_value_quotes_text_and_shows_null() {
    assert_eq!(format_value(Some("hello world")), "\"hello world\"");
    assert_eq!(format_value(Some("")), "\"\"");
    assert_eq!(format_value(None), "null");
}

#[test]
fn format_entry_names_the_root_value() {
    assert_eq!(format_entry("Db:Provider", Some("Sql")), "Db:Provider = \"Sql\"");
    assert_eq!(format_entry("", Some("x")), "(root) = \"x\"");
}

#[test]
fn reload_header_reflects_outcome() {
    let mut event = ReloadEvent {
        sequence: 3,
        changed_paths: vec!["A".to_string()],
        succeeded: true,
        timestamp: Instant::now(),
    };

    let header = format_reload_header(&event, "12:00:00.000");
    assert!(header.contains("#3"));
    assert!(header.contains("reloaded"));

    event.succeeded = false;
    assert!(format_reload_header(&event, "12:00:00.000").contains("data cleared"));
}

#[test]
fn parses_get_with_short_hive_name() {
    let cli = Cli::try_parse_from([
        "registry-config",
        "get",
        "--hive-dir",
        "/tmp/hive",
        "--hive",
        "HKCU",
        "--root-key",
        r"SOFTWARE\Contoso",
        "Db:Provider",
    ])
    .unwrap();

    let Commands::Get { source, path } = cli.command else {
        unreachable!("parsed a different command");
    };
    assert_eq!(source.hive, Hive::CurrentUser);
    assert_eq!(source.root_key.as_deref(), Some(r"SOFTWARE\Contoso"));
    assert_eq!(path, "Db:Provider");
}

#[test]
fn rejects_unknown_hive() {
    let result = Cli::try_parse_from([
        "registry-config",
        "dump",
        "--hive-dir",
        "/tmp/hive",
        "--hive",
        "HKEY_NOWHERE",
        "--root-key",
        "x",
    ]);
    assert!(result.is_err());
}

#[test]
fn watch_pattern_defaults_to_everything() {
    let cli = Cli::try_parse_from([
        "registry-config",
        "watch",
        "--hive-dir",
        "/tmp/hive",
        "--root-key",
        "x",
    ])
    .unwrap();

    let Commands::Watch { source, pattern } = cli.command else {
        unreachable!("parsed a different command");
    };
    assert_eq!(pattern, "*");
    assert_eq!(source.hive, Hive::LocalMachine);
}

#[test]
fn options_require_a_root() {
    let err = source_args(None).to_options().unwrap_err();
    assert!(matches!(err, CliError::InvalidArguments(_)));
}

#[test]
fn options_follow_flags() {
    let mut args = source_args(Some("App"));
    args.required = true;
    args.delay_ms = Some(10);

    let options = args.to_options().unwrap();
    assert_eq!(options.root_key, "App");
    assert_eq!(options.hive, Hive::CurrentUser);
    assert!(!options.optional);
    assert_eq!(options.reload_delay, std::time::Duration::from_millis(10));
}
