//! Relay tunnel negotiation command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct TunnelResponse {
    name: String,
    address: String,
    port: u16,
}

pub async fn cmd_tunnel(port: u16, name: &str) -> Result<()> {
    let tunnel: TunnelResponse =
        get_json(&format!("{}/tunnel?name={}", base_url(port), name)).await?;

    println!("Tunnel opened on relay '{}'", tunnel.name);
    println!("  endpoint : {}:{}", tunnel.address, tunnel.port);

    Ok(())
}
