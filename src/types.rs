use chrono::{DateTime, Utc};
use serde::Serialize;

/// A token listing entry as returned by the token list source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenListing {
    pub address: String,
    pub name: String,
    pub symbol: String,
}

/// A listing enriched with volume and authority data, ready to report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenCandidate {
    pub address: String,
    pub name: String,
    pub symbol: String,
    /// 24h volume in USD; `None` when the lookup failed.
    pub volume_24h_usd: Option<f64>,
    /// On-chain owner reported by account metadata, if it could be read.
    pub owner: Option<String>,
    /// Owner matches the configured authority.
    pub verified: bool,
}

/// A DEX transaction as returned by the transaction source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transaction {
    pub signature: String,
    pub description: String,
    pub log_messages: Vec<String>,
}

/// A liquidity pool as returned by the pool source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Pool {
    pub id: String,
    pub token_a: String,
    pub token_b: String,
    pub fee_rate: Option<f64>,
    pub volume: Option<f64>,
    pub bin_value: Option<f64>,
}

/// A social post matching the mention query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mention {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A bot update carrying a text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub chat_id: Option<i64>,
    pub text: Option<String>,
}
