//! Session listing and lookup commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListEntry {
    fields: SessionFields,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct SessionFields {
    id: i32,
    username: String,
    country: String,
    game_name: String,
    game_crc: String,
    core_name: String,
    core_version: String,
    subsystem_name: String,
    client_version: String,
    frontend: String,
    ip: String,
    port: u16,
    host_method: u8,
    relay_addr: String,
    relay_port: u16,
    relay_session: String,
    has_password: bool,
    has_spectator_password: bool,
    connectable: bool,
    protocol_ok: bool,
    created: String,
    updated: String,
}

fn host_method_name(method: u8) -> &'static str {
    match method {
        0 => "unknown",
        1 => "manual",
        2 => "upnp",
        3 => "relay",
        _ => "invalid",
    }
}

fn print_session(s: &SessionFields) {
    println!("  ┌─ #{} {}", s.id, s.username);
    println!("  │  game        : {} ({})", s.game_name, s.game_crc);
    println!("  │  core        : {} {}", s.core_name, s.core_version);
    println!("  │  endpoint    : {}:{}", s.ip, s.port);
    println!("  │  hosting     : {}", host_method_name(s.host_method));
    if s.host_method == 3 {
        println!("  │  relay       : {}:{}", s.relay_addr, s.relay_port);
    }
    println!("  │  country     : {}", s.country);
    println!("  │  password    : {}", if s.has_password { "yes" } else { "no" });
    println!(
        "  │  connectable : {}",
        if s.connectable { "yes" } else { "no" }
    );
    println!("  └─ updated     : {}", s.updated);
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

pub async fn cmd_sessions(port: u16) -> Result<()> {
    let entries: Vec<ListEntry> = get_json(&format!("{}/list", base_url(port))).await?;

    if entries.is_empty() {
        println!("No active sessions.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Active Sessions ({})", entries.len());
    println!("═══════════════════════════════════════");
    for entry in &entries {
        print_session(&entry.fields);
    }

    Ok(())
}

pub async fn cmd_get(port: u16, id: i32) -> Result<()> {
    let session: SessionFields = get_json(&format!("{}/list/{}", base_url(port), id)).await?;

    println!("═══════════════════════════════════════");
    println!("  Session #{}", session.id);
    println!("═══════════════════════════════════════");
    print_session(&session);

    Ok(())
}
