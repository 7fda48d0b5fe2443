//! Offline inspection commands against an existing store.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hopper_db::{Frontier, QueueWithinCrawl, StoreConfig};

#[derive(Args)]
pub struct StatsCommand {
    /// Store path
    #[clap(long, default_value = "./frontier")]
    path: PathBuf,
    /// Restrict to one queue key
    #[clap(long)]
    queue: Option<String>,
    /// Crawl id to pair with --queue (defaults to the DEFAULT crawl)
    #[clap(long, default_value = "")]
    crawl: String,
}

pub fn run_stats(args: &StatsCommand) -> Result<()> {
    let frontier = Frontier::open(StoreConfig::with_path(&args.path))?;
    let queue = args
        .queue
        .as_ref()
        .map(|key| QueueWithinCrawl::new(&args.crawl, key));
    let stats = frontier.get_stats(queue.as_ref())?;

    println!("queues:     {}", stats.number_of_queues);
    println!("size:       {}", stats.size);
    println!("in_process: {}", stats.in_process);
    let mut counts: Vec<_> = stats.counts.iter().collect();
    counts.sort();
    for (state, count) in counts {
        println!("{state}:  {count}");
    }
    Ok(())
}

#[derive(Args)]
pub struct QueuesCommand {
    /// Store path
    #[clap(long, default_value = "./frontier")]
    path: PathBuf,
    /// Maximum queues to list (0 = all)
    #[clap(long, default_value_t = 0)]
    max: u32,
}

pub fn run_queues(args: &QueuesCommand) -> Result<()> {
    let frontier = Frontier::open(StoreConfig::with_path(&args.path))?;
    for queue in frontier.list_queues(args.max)? {
        println!("{queue}");
    }
    Ok(())
}
