//! Fetch and parse helpers for every external source.
//!
//! `fetch_*` functions perform exactly one HTTP call and fail on transport
//! errors. `parse_*` functions are pure and tolerate shape drift: entries that
//! do not have the expected fields are skipped rather than failing the batch.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Request};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::http::{build_request, send_json};
use crate::types::{Mention, Pool, TokenListing, Transaction, Update};

/// Case-insensitive substring test. `needle` may be in any case.
pub fn contains_keyword(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Case-insensitive equality, folded the same way as [`contains_keyword`].
pub fn equals_keyword(value: &str, needle: &str) -> bool {
    !needle.is_empty() && value.to_lowercase() == needle.to_lowercase()
}

/// Read a number that may be encoded as a JSON number or a numeric string.
fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read an identifier that may be encoded as a JSON string or number.
fn as_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Append `api-key=<key>` to an endpoint URL.
fn with_api_key(endpoint: &str, api_key: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint).with_context(|| format!("invalid endpoint {endpoint}"))?;
    url.query_pairs_mut().append_pair("api-key", api_key);
    Ok(url)
}

// ── Token list ─────────────────────────────────────────────────────

pub fn token_list_request(client: &Client, endpoint: &str, api_key: &str) -> Result<Request> {
    let req = client
        .get(endpoint)
        .header("x-api-key", api_key)
        .header("x-chain", "solana");
    build_request(req, "token list")
}

/// Fetch the token listing.
pub async fn fetch_token_list(
    client: &Client,
    endpoint: &str,
    api_key: &str,
) -> Result<Vec<TokenListing>> {
    let req = token_list_request(client, endpoint, api_key)?;
    let body = send_json(client, req, "token list").await?;
    let tokens = parse_token_list(&body);
    debug!("Fetched {} token listings", tokens.len());
    Ok(tokens)
}

/// Parse `{data: [...]}`, also accepting `{data: {tokens: [...]}}`.
pub fn parse_token_list(body: &Value) -> Vec<TokenListing> {
    let data = &body["data"];
    let entries = data
        .as_array()
        .or_else(|| data["tokens"].as_array());
    let Some(entries) = entries else {
        warn!("Token list response has no data array");
        return Vec::new();
    };
    entries
        .iter()
        .filter(|e| e.is_object())
        .map(|e| TokenListing {
            address: str_field(e, "address"),
            name: str_field(e, "name"),
            symbol: str_field(e, "symbol"),
        })
        .collect()
}

/// Listing matches when address, name or symbol contains the keyword.
pub fn matches_token(token: &TokenListing, keyword: &str) -> bool {
    contains_keyword(&token.address, keyword)
        || contains_keyword(&token.name, keyword)
        || contains_keyword(&token.symbol, keyword)
}

// ── Volume ─────────────────────────────────────────────────────────

/// `GET {endpoint}/{address}` with the token-list headers.
pub fn volume_request(
    client: &Client,
    endpoint: &str,
    api_key: &str,
    address: &str,
) -> Result<Request> {
    let url = format!("{}/{address}", endpoint.trim_end_matches('/'));
    let req = client
        .get(url)
        .header("x-api-key", api_key)
        .header("x-chain", "solana");
    build_request(req, "volume")
}

/// Fetch the 24h USD volume for a token address.
pub async fn fetch_volume(
    client: &Client,
    endpoint: &str,
    api_key: &str,
    address: &str,
) -> Result<Option<f64>> {
    let req = volume_request(client, endpoint, api_key, address)?;
    let body = send_json(client, req, "volume").await?;
    Ok(parse_volume(&body))
}

/// Parse `{data: {volume_24h_usd}}` (or the `volume_usd_24h` spelling).
pub fn parse_volume(body: &Value) -> Option<f64> {
    let data = &body["data"];
    ["volume_24h_usd", "volume_usd_24h"]
        .iter()
        .find_map(|key| data.get(*key).and_then(as_f64))
}

// ── Account metadata / authority ───────────────────────────────────

/// Build the `getAccountInfo` JSON-RPC request body.
pub fn account_info_request(address: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getAccountInfo",
        "params": [address, { "encoding": "jsonParsed" }],
    })
}

pub fn account_owner_request(
    client: &Client,
    endpoint: &str,
    api_key: &str,
    address: &str,
) -> Result<Request> {
    let url = with_api_key(endpoint, api_key)?;
    build_request(client.post(url).json(&account_info_request(address)), "account info")
}

/// Fetch the parsed owner of an account via JSON-RPC.
pub async fn fetch_account_owner(
    client: &Client,
    endpoint: &str,
    api_key: &str,
    address: &str,
) -> Result<Option<String>> {
    let req = account_owner_request(client, endpoint, api_key, address)?;
    let body = send_json(client, req, "account info").await?;
    if let Some(err) = body.get("error") {
        anyhow::bail!("account info: RPC error: {err}");
    }
    Ok(parse_owner(&body))
}

/// Extract `result.value.data.parsed.info.owner`.
pub fn parse_owner(body: &Value) -> Option<String> {
    body.pointer("/result/value/data/parsed/info/owner")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// A candidate is verified only when an authority is configured and the
/// owner equals it exactly.
pub fn is_verified(owner: Option<&str>, authority: Option<&str>) -> bool {
    match (owner, authority) {
        (Some(owner), Some(authority)) => owner == authority,
        _ => false,
    }
}

// ── Transactions ───────────────────────────────────────────────────

/// Fetch recent DEX transactions.
pub async fn fetch_transactions(
    client: &Client,
    endpoint: &str,
    api_key: &str,
) -> Result<Vec<Transaction>> {
    let url = with_api_key(endpoint, api_key)?;
    let req = build_request(client.get(url), "transactions")?;
    let body = send_json(client, req, "transactions").await?;
    let txs = parse_transactions(&body);
    debug!("Fetched {} transactions", txs.len());
    Ok(txs)
}

/// Parse either a bare list or `{transactions: [...]}`.
pub fn parse_transactions(body: &Value) -> Vec<Transaction> {
    let entries = body
        .as_array()
        .or_else(|| body["transactions"].as_array());
    let Some(entries) = entries else {
        warn!("Transaction response is neither a list nor wrapped list");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|e| {
            let signature = e.get("signature").and_then(as_id)?;
            let log_messages = e
                .pointer("/meta/logMessages")
                .and_then(Value::as_array)
                .map(|lines| {
                    lines
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(Transaction {
                signature,
                description: str_field(e, "description"),
                log_messages,
            })
        })
        .collect()
}

/// Transaction matches when its description or any log line contains the keyword.
pub fn matches_transaction(tx: &Transaction, keyword: &str) -> bool {
    contains_keyword(&tx.description, keyword)
        || tx.log_messages.iter().any(|l| contains_keyword(l, keyword))
}

// ── Pools ──────────────────────────────────────────────────────────

/// Fetch the pool listing.
pub async fn fetch_pools(client: &Client, endpoint: &str) -> Result<Vec<Pool>> {
    let req = build_request(client.get(endpoint), "pools")?;
    let body = send_json(client, req, "pools").await?;
    let pools = parse_pools(&body);
    debug!("Fetched {} pools", pools.len());
    Ok(pools)
}

/// Parse a bare list of pools (a `{data: [...]}` wrapper is tolerated).
pub fn parse_pools(body: &Value) -> Vec<Pool> {
    let entries = body.as_array().or_else(|| body["data"].as_array());
    let Some(entries) = entries else {
        warn!("Pool response is not a list");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|e| {
            let id = e.get("id").and_then(as_id)?;
            Some(Pool {
                id,
                token_a: e
                    .pointer("/tokenA/symbol")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                token_b: e
                    .pointer("/tokenB/symbol")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                fee_rate: e.get("feeRate").and_then(as_f64),
                volume: e.get("volume").and_then(as_f64),
                bin_value: e.get("binValue").and_then(as_f64),
            })
        })
        .collect()
}

/// Pool matches when either side's symbol equals the keyword (case-insensitive).
pub fn matches_pool(pool: &Pool, keyword: &str) -> bool {
    equals_keyword(&pool.token_a, keyword) || equals_keyword(&pool.token_b, keyword)
}

// ── Mentions ───────────────────────────────────────────────────────

/// Search parameters for the mention source.
#[derive(Debug, Clone)]
pub struct MentionQuery<'a> {
    pub query: &'a str,
    pub max_results: u32,
    pub since_id: Option<&'a str>,
}

/// Search request; `since_id` is only sent once a watermark exists.
pub fn mentions_request(
    client: &Client,
    endpoint: &str,
    bearer_token: &str,
    q: &MentionQuery<'_>,
) -> Result<Request> {
    // The v2 search endpoint rejects max_results outside 10..=100
    let max_results = q.max_results.clamp(10, 100).to_string();
    let mut params = vec![
        ("query", q.query),
        ("max_results", max_results.as_str()),
        ("tweet.fields", "created_at"),
    ];
    if let Some(since_id) = q.since_id {
        params.push(("since_id", since_id));
    }
    let req = client
        .get(endpoint)
        .bearer_auth(bearer_token)
        .query(&params);
    build_request(req, "mentions")
}

/// Fetch recent posts matching the query, newer than `since_id` when given.
pub async fn fetch_mentions(
    client: &Client,
    endpoint: &str,
    bearer_token: &str,
    q: &MentionQuery<'_>,
) -> Result<Vec<Mention>> {
    let req = mentions_request(client, endpoint, bearer_token, q)?;
    let body = send_json(client, req, "mentions").await?;
    let mentions = parse_mentions(&body);
    debug!("Fetched {} mentions", mentions.len());
    Ok(mentions)
}

/// Parse `{data: [{id, text, created_at}]}`. A missing `data` key means no results.
pub fn parse_mentions(body: &Value) -> Vec<Mention> {
    let Some(entries) = body["data"].as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|e| {
            let id = e.get("id").and_then(as_id)?;
            let created_at = e
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            Some(Mention {
                id,
                text: str_field(e, "text"),
                created_at,
            })
        })
        .collect()
}

/// Compare two post ids. Numeric ids compare numerically, anything else
/// falls back to length then lexicographic order (equivalent for digit strings).
pub fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

// ── Bot updates ────────────────────────────────────────────────────

/// `getUpdates` request. The request timeout is stretched past the long-poll
/// window so an idle poll is not reported as a transport failure.
pub fn updates_request(
    client: &Client,
    api_base: &str,
    bot_token: &str,
    offset: i64,
    long_poll: Duration,
    request_timeout: Duration,
) -> Result<Request> {
    let url = format!("{}/bot{bot_token}/getUpdates", api_base.trim_end_matches('/'));
    let req = client
        .get(url)
        .query(&[
            ("offset", offset.to_string()),
            ("timeout", long_poll.as_secs().to_string()),
        ])
        .timeout(long_poll + request_timeout);
    build_request(req, "updates")
}

/// Long-poll the bot for updates starting at `offset`.
pub async fn fetch_updates(
    client: &Client,
    api_base: &str,
    bot_token: &str,
    offset: i64,
    long_poll: Duration,
    request_timeout: Duration,
) -> Result<Vec<Update>> {
    let req = updates_request(client, api_base, bot_token, offset, long_poll, request_timeout)?;
    let body = send_json(client, req, "updates").await?;
    if body["ok"].as_bool() == Some(false) {
        anyhow::bail!(
            "updates: API returned ok=false: {}",
            body["description"].as_str().unwrap_or("no description")
        );
    }
    Ok(parse_updates(&body))
}

/// Parse `{ok, result: [{update_id, message: {chat: {id}, text}}]}`.
pub fn parse_updates(body: &Value) -> Vec<Update> {
    let Some(entries) = body["result"].as_array() else {
        warn!("Updates response has no result array");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|e| {
            let update_id = e.get("update_id").and_then(Value::as_i64)?;
            let message = e.get("message");
            Some(Update {
                update_id,
                chat_id: message
                    .and_then(|m| m.pointer("/chat/id"))
                    .and_then(Value::as_i64),
                text: message
                    .and_then(|m| m.get("text"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}
