//! waypoint-ctl — command-line interface for the Waypoint daemon.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_PORT: u16 = 9100;

fn print_usage() {
    println!("Usage: waypoint-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  sessions        List active sessions");
    println!("  get <id>        Show one session by its public id");
    println!("  tunnel <name>   Negotiate a tunnel on a named relay");
    println!();
    println!("Options:");
    println!("  --port <port>   Registry API port (default: {DEFAULT_PORT})");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["sessions"] | [] => cmd::sessions::cmd_sessions(port).await,
        ["get", id] => {
            let id = id.parse().context("session id must be a number")?;
            cmd::sessions::cmd_get(port, id).await
        }
        ["tunnel", name] => cmd::tunnel::cmd_tunnel(port, name).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            print_usage();
            std::process::exit(1);
        }
    }
}
