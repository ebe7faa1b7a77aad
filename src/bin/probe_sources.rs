//! Probe: one fetch against every configured source
//!
//! Prints, per source, how many items came back, the latency, and every item
//! that passes the keyword filter as a JSON line. Nothing is sent and no
//! subscriber state is touched.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use wlfi_watcher::api::{
    self, MentionQuery, fetch_mentions, fetch_pools, fetch_token_list, fetch_transactions,
};
use wlfi_watcher::config::{AppConfig, CONFIG_PATH, Credentials};
use wlfi_watcher::http::build_client;

#[derive(Parser)]
#[command(name = "probe_sources", about = "Fetch each source once and print matches")]
struct Args {
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

fn print_matches<T: Serialize>(source: &str, items: &[T]) -> Result<()> {
    for item in items {
        println!("{source}\t{}", serde_json::to_string(item)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    let config = AppConfig::load_or_default(&args.config)?;
    let creds = Credentials::from_env();
    let client = build_client(config.settings.request_timeout())?;
    let keyword = config.settings.keyword.as_str();
    let endpoints = &config.endpoints;

    println!("=== Probe: sources (keyword \"{keyword}\") ===");
    for var in creds.missing() {
        println!("(unset: {var})");
    }
    println!();

    println!("--- token list ---");
    match &creds.birdeye_api_key {
        Some(key) => {
            let start = Instant::now();
            match fetch_token_list(&client, &endpoints.token_list, key).await {
                Ok(tokens) => {
                    println!("{} listings in {:?}", tokens.len(), start.elapsed());
                    let hits: Vec<_> = tokens
                        .into_iter()
                        .filter(|t| api::matches_token(t, keyword))
                        .collect();
                    print_matches("token_list", &hits)?;
                }
                Err(e) => println!("error: {e:#}"),
            }
        }
        None => println!("skipped"),
    }
    println!();

    println!("--- raydium ---");
    match &creds.helius_api_key {
        Some(key) => {
            let start = Instant::now();
            match fetch_transactions(&client, &endpoints.transactions, key).await {
                Ok(txs) => {
                    println!("{} transactions in {:?}", txs.len(), start.elapsed());
                    let hits: Vec<_> = txs
                        .into_iter()
                        .filter(|t| api::matches_transaction(t, keyword))
                        .collect();
                    print_matches("raydium", &hits)?;
                }
                Err(e) => println!("error: {e:#}"),
            }
        }
        None => println!("skipped"),
    }
    println!();

    println!("--- meteora ---");
    let start = Instant::now();
    match fetch_pools(&client, &endpoints.pools).await {
        Ok(pools) => {
            println!("{} pools in {:?}", pools.len(), start.elapsed());
            let hits: Vec<_> = pools
                .into_iter()
                .filter(|p| api::matches_pool(p, keyword))
                .collect();
            print_matches("meteora", &hits)?;
        }
        Err(e) => println!("error: {e:#}"),
    }
    println!();

    println!("--- mentions ---");
    match &creds.twitter_bearer_token {
        Some(token) => {
            let query_text = config.settings.mention_query();
            let query = MentionQuery {
                query: &query_text,
                max_results: config.settings.mention_max_results,
                since_id: None,
            };
            let start = Instant::now();
            match fetch_mentions(&client, &endpoints.search, token, &query).await {
                Ok(mentions) => {
                    println!("{} mentions in {:?}", mentions.len(), start.elapsed());
                    print_matches("mentions", &mentions)?;
                }
                Err(e) => println!("error: {e:#}"),
            }
        }
        None => println!("skipped"),
    }

    Ok(())
}
