use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::api::{fetch_pools, matches_pool};
use crate::poller::Source;
use crate::reporter::pool_message;
use crate::types::Pool;

/// Watches the Meteora pool listing for pools paired with the keyword token.
pub struct MeteoraSource {
    client: Client,
    url: String,
    keyword: String,
}

impl MeteoraSource {
    pub fn new(client: Client, url: &str, keyword: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            keyword: keyword.to_string(),
        }
    }
}

#[async_trait]
impl Source for MeteoraSource {
    type Item = Pool;

    fn name(&self) -> &'static str {
        "meteora"
    }

    async fn fetch(&mut self) -> Result<Vec<Pool>> {
        fetch_pools(&self.client, &self.url).await
    }

    fn select(&self, item: &Pool) -> Option<String> {
        matches_pool(item, &self.keyword).then(|| item.id.clone())
    }

    async fn render(&self, item: &Pool) -> String {
        pool_message(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_pools;
    use serde_json::json;

    #[tokio::test]
    async fn selects_pools_paired_with_keyword() {
        let s = MeteoraSource::new(Client::new(), "http://localhost/pools", "wlfi");
        let pools = parse_pools(&json!([
            { "id": "P1", "tokenA": { "symbol": "WLFI" }, "tokenB": { "symbol": "USDC" }, "feeRate": 0.3, "volume": 500, "binValue": 25 },
            { "id": "P2", "tokenA": { "symbol": "SOL" }, "tokenB": { "symbol": "USDC" } },
            { "id": "P3", "tokenA": { "symbol": "SOL" }, "tokenB": { "symbol": "wlfi" } },
        ]));
        let ids: Vec<String> = pools.iter().filter_map(|p| s.select(p)).collect();
        assert_eq!(ids, vec!["P1", "P3"]);

        let msg = s.render(&pools[0]).await;
        assert!(msg.contains("WLFI / USDC"));
        assert!(msg.contains("Fee: 0.3"));
        assert!(msg.contains("Bin: 25"));
    }
}
