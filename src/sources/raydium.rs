use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::api::{fetch_transactions, matches_transaction};
use crate::poller::Source;
use crate::reporter::transaction_message;
use crate::types::Transaction;

/// Watches recent Raydium transactions for the keyword in their description or logs.
pub struct RaydiumSource {
    client: Client,
    url: String,
    api_key: String,
    keyword: String,
}

impl RaydiumSource {
    pub fn new(client: Client, url: &str, api_key: &str, keyword: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            api_key: api_key.to_string(),
            keyword: keyword.to_string(),
        }
    }
}

#[async_trait]
impl Source for RaydiumSource {
    type Item = Transaction;

    fn name(&self) -> &'static str {
        "raydium"
    }

    async fn fetch(&mut self) -> Result<Vec<Transaction>> {
        fetch_transactions(&self.client, &self.url, &self.api_key).await
    }

    fn select(&self, item: &Transaction) -> Option<String> {
        matches_transaction(item, &self.keyword).then(|| item.signature.clone())
    }

    async fn render(&self, item: &Transaction) -> String {
        transaction_message(item)
    }
}
