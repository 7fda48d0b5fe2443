//! `serve` subcommand: open the store, recover, and run until interrupted.

use std::collections::HashMap;

use anyhow::Result;
use clap::Args;
use hopper_db::{Frontier, StoreConfig};

#[derive(Args)]
pub struct Command {
    /// Configuration options as `key=value` pairs,
    /// e.g. `-o store.path=/data/frontier -o store.bloom_filters`
    #[clap(short = 'o', long = "option", value_parser = parse_key_value)]
    options: Vec<(String, String)>,
}

pub fn run(args: &Command) -> Result<()> {
    let options: HashMap<String, String> = args.options.iter().cloned().collect();
    let config = StoreConfig::from_map(&options)?;

    // Failed recovery propagates out of open() and aborts startup non-zero.
    let frontier = Frontier::open(config)?;
    tracing::info!(queues = frontier.number_of_queues(), "Frontier ready");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(tokio::signal::ctrl_c())?;

    tracing::info!("Shutting down, flushing store");
    frontier.close()?;
    Ok(())
}

/// Parse `key=value`; a bare `key` is a presence flag.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Ok((raw.to_string(), String::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs_split_once() {
        assert_eq!(
            parse_key_value("store.path=/data/db").unwrap(),
            ("store.path".to_string(), "/data/db".to_string())
        );
        // Values may themselves contain '='.
        assert_eq!(
            parse_key_value("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert_eq!(
            parse_key_value("store.purge").unwrap(),
            ("store.purge".to_string(), String::new())
        );
    }
}
