use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::api::{MentionQuery, compare_ids, fetch_mentions};
use crate::poller::Source;
use crate::reporter::mention_message;
use crate::types::Mention;

/// Watches social posts matching the search query.
///
/// The query already filters server-side, so every returned post is reported
/// once. The highest id seen so far is sent as `since_id` to narrow the next
/// search; the seen-set still guards against overlap.
pub struct MentionSource {
    client: Client,
    url: String,
    bearer_token: String,
    query: String,
    max_results: u32,
    since_id: Option<String>,
}

impl MentionSource {
    pub fn new(
        client: Client,
        url: &str,
        bearer_token: &str,
        query: &str,
        max_results: u32,
    ) -> Self {
        Self {
            client,
            url: url.to_string(),
            bearer_token: bearer_token.to_string(),
            query: query.to_string(),
            max_results,
            since_id: None,
        }
    }

    /// Current watermark.
    pub fn since_id(&self) -> Option<&str> {
        self.since_id.as_deref()
    }

    /// Search parameters for the next fetch.
    pub fn query(&self) -> MentionQuery<'_> {
        MentionQuery {
            query: &self.query,
            max_results: self.max_results,
            since_id: self.since_id.as_deref(),
        }
    }

    /// Raise the watermark to the largest id in `mentions`. Never lowers it.
    pub fn advance_watermark(&mut self, mentions: &[Mention]) {
        let newest = mentions.iter().map(|m| m.id.as_str()).fold(
            self.since_id.as_deref(),
            |best, id| match best {
                Some(b) if compare_ids(id, b) != Ordering::Greater => Some(b),
                _ => Some(id),
            },
        );
        if newest != self.since_id.as_deref() {
            debug!("Mention watermark advanced to {newest:?}");
            self.since_id = newest.map(str::to_string);
        }
    }
}

#[async_trait]
impl Source for MentionSource {
    type Item = Mention;

    fn name(&self) -> &'static str {
        "mentions"
    }

    async fn fetch(&mut self) -> Result<Vec<Mention>> {
        let mentions =
            fetch_mentions(&self.client, &self.url, &self.bearer_token, &self.query()).await?;
        self.advance_watermark(&mentions);
        Ok(mentions)
    }

    fn select(&self, item: &Mention) -> Option<String> {
        Some(item.id.clone())
    }

    async fn render(&self, item: &Mention) -> String {
        mention_message(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(id: &str) -> Mention {
        Mention {
            id: id.into(),
            text: String::new(),
            created_at: None,
        }
    }

    fn source() -> MentionSource {
        MentionSource::new(Client::new(), "http://localhost/search", "t", "WLFI", 10)
    }

    #[test]
    fn watermark_tracks_maximum() {
        let mut s = source();
        assert_eq!(s.since_id(), None);

        s.advance_watermark(&[mention("5"), mention("12"), mention("9")]);
        assert_eq!(s.since_id(), Some("12"));

        // Older batch never lowers it
        s.advance_watermark(&[mention("3"), mention("11")]);
        assert_eq!(s.since_id(), Some("12"));

        // Numeric, not lexicographic
        s.advance_watermark(&[mention("100")]);
        assert_eq!(s.since_id(), Some("100"));

        s.advance_watermark(&[]);
        assert_eq!(s.since_id(), Some("100"));
    }

    #[test]
    fn watermark_is_monotonic_over_many_cycles() {
        let mut s = source();
        let batches: Vec<Vec<&str>> = vec![
            vec!["1790000000000000005"],
            vec!["1790000000000000002", "1790000000000000009"],
            vec![],
            vec!["1790000000000000007"],
            vec!["1790000000000000010", "1790000000000000001"],
        ];
        let mut max_seen: Option<u128> = None;
        let mut previous: Option<u128> = None;
        for batch in batches {
            let mentions: Vec<Mention> = batch.iter().map(|id| mention(id)).collect();
            for id in &batch {
                let n: u128 = id.parse().unwrap();
                max_seen = Some(max_seen.map_or(n, |m| m.max(n)));
            }
            s.advance_watermark(&mentions);
            let current: Option<u128> = s.since_id().map(|id| id.parse().unwrap());
            assert_eq!(current, max_seen);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn next_search_starts_after_watermark() {
        let mut s = source();
        let first = crate::api::mentions_request(&s.client, &s.url, "t", &s.query()).unwrap();
        assert!(!first.url().query_pairs().any(|(k, _)| k == "since_id"));

        s.advance_watermark(&[mention("41"), mention("42")]);
        let next = crate::api::mentions_request(&s.client, &s.url, "t", &s.query()).unwrap();
        let since: Vec<String> = next
            .url()
            .query_pairs()
            .filter(|(k, _)| k == "since_id")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(since, vec!["42"]);
        assert!(next.url().query_pairs().any(|(k, v)| k == "query" && v == "WLFI"));
    }

    #[test]
    fn every_mention_is_selected() {
        assert_eq!(source().select(&mention("7")).as_deref(), Some("7"));
    }
}
