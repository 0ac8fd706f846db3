//! End-to-end tests of the command line against scripted boards.

use boardctl::cli::{run_with, Cli};
use boardctl::scripted::{Script, ScriptedPortFactory};
use boardctl::{Board, CommandExecutor, InProcessLock};
use clap::Parser;
use std::sync::Arc;

fn scripted_board(factory: &ScriptedPortFactory, lock: &InProcessLock) -> Board {
    Board::new(CommandExecutor::new(
        Arc::new(lock.clone()),
        Arc::new(factory.clone()),
    ))
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("boardctl").chain(args.iter().copied()))
        .expect("Arguments should parse")
}

#[test]
fn test_env_prints_reading() {
    let factory = ScriptedPortFactory::new();
    factory.push(Script::reply("temp_read\nTMP: 235\nHUM: 412\nRasPi-ExtBoard> "));
    factory.push(Script::reply("bri_read\nBRI: 77\nRasPi-ExtBoard> "));
    let lock = InProcessLock::new("board");

    let envelope = run_with(&cli(&["env"]), &scripted_board(&factory, &lock));

    assert_eq!(
        envelope.to_json(),
        r#"{"result":"ok","temperature":23.5,"humidity":41.2,"brightness":77}"#
    );
}

#[test]
fn test_env_missing_field_reports_ng() {
    let factory = ScriptedPortFactory::new();
    factory.push(Script::respond("temp_read", "TMP: 235"));
    let lock = InProcessLock::new("board");

    let envelope = run_with(&cli(&["env"]), &scripted_board(&factory, &lock));

    assert!(!envelope.is_ok());
    assert!(envelope.reading().is_none());
    assert_eq!(
        envelope.message(),
        Some("failed to parse temp_read response: failed to get Humidity")
    );
}

#[test]
fn test_cmd_sends_ir() {
    let factory = ScriptedPortFactory::new();
    factory.push(Script::respond("ir_send 500", "1010"));
    let lock = InProcessLock::new("board");

    let envelope = run_with(&cli(&["cmd", "500", "1010"]), &scripted_board(&factory, &lock));

    assert_eq!(envelope.to_json(), r#"{"result":"ok"}"#);
    assert_eq!(factory.writes(), vec![b"ir_send 500\n1010\n".to_vec()]);
}

#[test]
fn test_malformed_interval_touches_nothing() {
    let factory = ScriptedPortFactory::new();
    factory.push(Script::respond("ir_send 500", "1010"));
    let lock = InProcessLock::new("board");

    let envelope = run_with(&cli(&["cmd", "five", "1010"]), &scripted_board(&factory, &lock));

    assert!(!envelope.is_ok());
    assert!(envelope.message().unwrap().contains("invalid interval"));
    assert_eq!(lock.acquisitions(), 0);
    assert_eq!(factory.opens(), 0);
}

#[test]
fn test_missing_command() {
    let factory = ScriptedPortFactory::new();
    let lock = InProcessLock::new("board");

    let envelope = run_with(&cli(&[]), &scripted_board(&factory, &lock));

    assert_eq!(
        envelope.to_json(),
        r#"{"result":"ng","message":"invalid argument: command required"}"#
    );
    assert_eq!(lock.acquisitions(), 0);
}
