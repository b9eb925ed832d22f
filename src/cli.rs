use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, process::Command};

use crate::ipc;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::server::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("jackcount: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => {
            let r = ipc::server::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::server::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("snapshot") => {
            let r = ipc::server::client_request(serde_json::json!({"op":"snapshot"}))?;
            print_response(&r);
            Ok(())
        }

        Some("reset") => {
            let r = ipc::server::client_request(serde_json::json!({"op":"reset"}))?;
            print_response(&r);
            Ok(())
        }

        Some("reload") => {
            let r = ipc::server::client_request(serde_json::json!({"op":"reload"}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: jackcount use <profile_name>"))?;
            let r = ipc::server::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let r = ipc::server::client_request(serde_json::json!({"op":"list"}))?;
            print_response(&r);
            Ok(())
        }

        Some("doctor") => {
            let r = ipc::server::client_request(serde_json::json!({"op":"doctor"}))?;
            print_response(&r);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"jackcount — jumping-jack repetition counting daemon

USAGE:
  jackcount help [command]     Show general or command-specific help
  jackcount start              Start the daemon
  jackcount stop               Stop the daemon
  jackcount status             Show daemon state
  jackcount snapshot           Current per-person counts, stages and fps
  jackcount reset              Clear all tracked people and counts
  jackcount reload             Reload active profile
  jackcount use <name>         Switch active profile
  jackcount list               List profiles
  jackcount doctor             Diagnose sockets/profiles

TIPS:
  - The pose process streams frames to ~/.local/run/jackcount-frames.sock,
    one JSON object per line.
  - Profiles: ~/.config/jackcount/profiles
  - Active profile pointer: ~/.config/jackcount/active
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: jackcount start\nStarts the background daemon."),
        "stop" => println!("usage: jackcount stop\nStops the running daemon."),
        "status" => println!(
            "usage: jackcount status\nShows active profile, sockets and tracked-people count."
        ),
        "snapshot" => println!(
            "usage: jackcount snapshot\nPrints the current read model: jumps, stage and fps per person."
        ),
        "reset" => println!(
            "usage: jackcount reset\nClears every tracked person; the next detection starts at zero."
        ),
        "reload" => println!(
            "usage: jackcount reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: jackcount use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => {
            println!("usage: jackcount list\nLists available profiles.")
        }
        "doctor" => println!(
            "usage: jackcount doctor\nChecks sockets and profile locations."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
