use std::env;

use anyhow::{Context, Result};

/// Process configuration, collected from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub private_key: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub database_url: String,
    pub bind_addr: String,
    pub scan_interval_secs: u64,
    pub gas_margin_pct: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            rpc_url: require("RPC_URL")?,
            private_key: require("PRIVATE_KEY")?,
            contract_address: require("CONTRACT_ADDRESS")?,
            chain_id: require("CHAIN_ID")?
                .parse()
                .context("CHAIN_ID must be an integer")?,
            database_url: require("DATABASE_URL")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            scan_interval_secs: parse_or("SCAN_INTERVAL_SECS", 300)?,
            gas_margin_pct: parse_or("GAS_MARGIN_PCT", 20)?,
        })
    }
}

fn require(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_or(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{key} must be an integer")),
        Err(_) => Ok(default),
    }
}
