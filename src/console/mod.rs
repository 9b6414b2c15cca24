// src/console/mod.rs
use crate::config::ConfigOverrides;
use crate::core::control::ControlHandle;
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const HELP: &str = "\
Commands:
  start                begin polling and trading
  stop                 stop before the next tick
  status               engine, position and trigger report
  reset                clear the open position (profit ledger kept)
  set k=v [k=v ...]    adjust buy/sell/limit/step/interval/buffer
  help                 this text
  quit                 leave the console and shut the engine down";

enum Dispatch {
    Report(String),
    Empty,
    Quit,
}

/// Line-oriented control channel over stdin. Every command prints the
/// engine's report string; Ctrl+C behaves like `quit`.
pub async fn run(handle: ControlHandle) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    // EOF or an unreadable terminal both end the session.
                    Ok(None) | Err(_) => break,
                };
                match dispatch(&handle, line.trim()).await {
                    Dispatch::Report(report) => println!("{report}"),
                    Dispatch::Empty => {}
                    Dispatch::Quit => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    info!("console closed");
}

async fn dispatch(handle: &ControlHandle, line: &str) -> Dispatch {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Dispatch::Empty;
    };
    let args: Vec<&str> = words.collect();

    match command {
        "start" => Dispatch::Report(handle.start().await),
        "stop" => Dispatch::Report(handle.stop().await),
        "status" => Dispatch::Report(handle.status().await),
        "reset" => Dispatch::Report(handle.reset().await),
        "set" => set_command(handle, &args).await,
        "help" => Dispatch::Report(HELP.to_string()),
        "quit" | "exit" => Dispatch::Quit,
        other => Dispatch::Report(format!("Unknown command \"{other}\". Try `help`.")),
    }
}

async fn set_command(handle: &ControlHandle, args: &[&str]) -> Dispatch {
    if args.is_empty() {
        return Dispatch::Report("Usage: set key=value [key=value ...]".to_string());
    }

    let (overrides, unparsed) = parse_overrides(args);
    if overrides.is_empty() {
        return Dispatch::Report(format!("No recognized fields in: {}.", unparsed.join(", ")));
    }

    let mut report = handle.configure(overrides).await;
    if !unparsed.is_empty() {
        report.push_str(&format!(" Ignored: {}.", unparsed.join(", ")));
    }
    Dispatch::Report(report)
}

/// Splits `key=value` words into typed overrides; anything unrecognized or
/// non-numeric comes back verbatim for the report.
fn parse_overrides(args: &[&str]) -> (ConfigOverrides, Vec<String>) {
    let mut overrides = ConfigOverrides::default();
    let mut unparsed = Vec::new();

    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            unparsed.push(arg.to_string());
            continue;
        };
        let Ok(value) = Decimal::from_str(value) else {
            unparsed.push(arg.to_string());
            continue;
        };
        let slot = match key {
            "buy" => &mut overrides.buy,
            "sell" => &mut overrides.sell,
            "limit" => &mut overrides.limit,
            "step" => &mut overrides.step,
            "interval" => &mut overrides.interval,
            "buffer" => &mut overrides.buffer,
            _ => {
                unparsed.push(arg.to_string());
                continue;
            }
        };
        *slot = Some(value);
    }

    (overrides, unparsed)
}
