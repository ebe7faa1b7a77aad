use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use crate::api::{self, fetch_account_owner, fetch_token_list, fetch_volume, matches_token};
use crate::poller::Source;
use crate::reporter::token_message;
use crate::types::{TokenCandidate, TokenListing};

/// Watches the token list for listings mentioning the keyword and reports each
/// new address with its volume and authority status.
pub struct TokenListSource {
    client: Client,
    list_url: String,
    liquidity_url: String,
    rpc_url: String,
    birdeye_api_key: String,
    /// Without a metadata key the authority check is skipped.
    helius_api_key: Option<String>,
    authority: Option<String>,
    keyword: String,
}

impl TokenListSource {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Client,
        list_url: &str,
        liquidity_url: &str,
        rpc_url: &str,
        birdeye_api_key: &str,
        helius_api_key: Option<&str>,
        authority: Option<&str>,
        keyword: &str,
    ) -> Self {
        Self {
            client,
            list_url: list_url.to_string(),
            liquidity_url: liquidity_url.to_string(),
            rpc_url: rpc_url.to_string(),
            birdeye_api_key: birdeye_api_key.to_string(),
            helius_api_key: helius_api_key.map(str::to_string),
            authority: authority.map(str::to_string),
            keyword: keyword.to_string(),
        }
    }

    /// Look up volume and owner. Lookup failures are logged and leave the
    /// corresponding field empty; they never suppress the notification.
    pub async fn enrich(&self, listing: &TokenListing) -> TokenCandidate {
        let volume = match fetch_volume(
            &self.client,
            &self.liquidity_url,
            &self.birdeye_api_key,
            &listing.address,
        )
        .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(address = %listing.address, "Volume lookup failed: {e:#}");
                None
            }
        };

        let owner = match &self.helius_api_key {
            Some(key) => {
                match fetch_account_owner(&self.client, &self.rpc_url, key, &listing.address).await
                {
                    Ok(owner) => owner,
                    Err(e) => {
                        warn!(address = %listing.address, "Metadata lookup failed: {e:#}");
                        None
                    }
                }
            }
            None => None,
        };

        build_candidate(listing, volume, owner, self.authority.as_deref())
    }
}

/// Fold lookups into a candidate. Verification requires a configured authority.
pub fn build_candidate(
    listing: &TokenListing,
    volume_24h_usd: Option<f64>,
    owner: Option<String>,
    authority: Option<&str>,
) -> TokenCandidate {
    let verified = api::is_verified(owner.as_deref(), authority);
    TokenCandidate {
        address: listing.address.clone(),
        name: listing.name.clone(),
        symbol: listing.symbol.clone(),
        volume_24h_usd,
        owner,
        verified,
    }
}

#[async_trait]
impl Source for TokenListSource {
    type Item = TokenListing;

    fn name(&self) -> &'static str {
        "token_list"
    }

    async fn fetch(&mut self) -> Result<Vec<TokenListing>> {
        fetch_token_list(&self.client, &self.list_url, &self.birdeye_api_key).await
    }

    fn select(&self, item: &TokenListing) -> Option<String> {
        (!item.address.is_empty() && matches_token(item, &self.keyword))
            .then(|| item.address.clone())
    }

    async fn render(&self, item: &TokenListing) -> String {
        token_message(&self.enrich(item).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(address: &str, name: &str, symbol: &str) -> TokenListing {
        TokenListing {
            address: address.into(),
            name: name.into(),
            symbol: symbol.into(),
        }
    }

    fn source(authority: Option<&str>) -> TokenListSource {
        TokenListSource::new(
            Client::new(),
            "http://localhost/list",
            "http://localhost/liq",
            "http://localhost/rpc",
            "key",
            None,
            authority,
            "wlfi",
        )
    }

    #[test]
    fn select_by_symbol_or_name() {
        let s = source(None);
        assert_eq!(s.select(&listing("A1", "", "WLFI")).as_deref(), Some("A1"));
        assert_eq!(s.select(&listing("A2", "", "ABC")), None);
        assert_eq!(s.select(&listing("A3", "wlfi-gov", "")).as_deref(), Some("A3"));
    }

    #[test]
    fn listing_without_address_is_skipped() {
        assert_eq!(source(None).select(&listing("", "WLFI", "WLFI")), None);
    }

    #[test]
    fn candidate_verified_against_authority() {
        let l = listing("A1", "World Liberty", "WLFI");
        let c = build_candidate(&l, Some(10.0), Some("Auth123".into()), Some("Auth123"));
        assert!(c.verified);
        let c = build_candidate(&l, None, Some("Other".into()), Some("Auth123"));
        assert!(!c.verified);
        let c = build_candidate(&l, None, Some("Auth123".into()), None);
        assert!(!c.verified);
        assert_eq!(c.owner.as_deref(), Some("Auth123"));
    }
}
