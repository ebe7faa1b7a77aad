//! Renders events as Telegram HTML messages.

use crate::types::{Mention, Pool, TokenCandidate, Transaction};

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn fmt_usd(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("${v:.2}"),
        None => "n/a".to_string(),
    }
}

fn fmt_num(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v}"),
        None => "n/a".to_string(),
    }
}

pub fn token_message(t: &TokenCandidate) -> String {
    let badge = if t.verified { " ✅ VERIFIED" } else { "" };
    let owner = t.owner.as_deref().unwrap_or("unknown");
    format!(
        "🔥 <b>Token found</b>{badge}\n\
         Name: {}\n\
         Symbol: {}\n\
         Address: <code>{}</code>\n\
         24h Vol: {}\n\
         Owner: <code>{}</code>",
        escape_html(&t.name),
        escape_html(&t.symbol),
        escape_html(&t.address),
        fmt_usd(t.volume_24h_usd),
        escape_html(owner),
    )
}

/// Longest description quoted in a transaction alert.
const MAX_DESCRIPTION_CHARS: usize = 300;

pub fn transaction_message(tx: &Transaction) -> String {
    let description: String = if tx.description.is_empty() {
        "(no description)".to_string()
    } else {
        tx.description.chars().take(MAX_DESCRIPTION_CHARS).collect()
    };
    format!(
        "🌊 <b>Raydium transaction</b>\n\
         {}\n\
         Signature: <code>{}</code>",
        escape_html(&description),
        escape_html(&tx.signature),
    )
}

pub fn pool_message(p: &Pool) -> String {
    format!(
        "🧪 <b>Meteora pool</b>\n\
         Pair: {} / {}\n\
         Pool: <code>{}</code>\n\
         Fee: {}\n\
         Volume: {}\n\
         Bin: {}",
        escape_html(&p.token_a),
        escape_html(&p.token_b),
        escape_html(&p.id),
        fmt_num(p.fee_rate),
        fmt_usd(p.volume),
        fmt_num(p.bin_value),
    )
}

pub fn mention_message(m: &Mention) -> String {
    let when = m
        .created_at
        .map(|t| format!("\n{}", t.format("%Y-%m-%d %H:%M UTC")))
        .unwrap_or_default();
    format!(
        "🐦 <b>New mention</b>{when}\n{}\nhttps://x.com/i/status/{}",
        escape_html(&m.text),
        escape_html(&m.id),
    )
}

/// Startup announcement, sent once the subscriber list is loaded.
pub fn startup_message(
    keyword: &str,
    enabled: &[&str],
    authority: Option<&str>,
    subscribers: usize,
) -> String {
    let mut msg = format!(
        "🚀 <b>Watcher started</b>\nKeyword: {}\nPollers: {}\nSubscribers: {subscribers}",
        escape_html(keyword),
        if enabled.is_empty() {
            "none".to_string()
        } else {
            enabled.join(", ")
        },
    );
    if let Some(authority) = authority {
        msg.push_str(&format!("\nAuthority: <code>{}</code>", escape_html(authority)));
    }
    msg
}

pub const SUBSCRIBED_MESSAGE: &str = "✅ Subscribed. You will receive alerts here.";
pub const ALREADY_SUBSCRIBED_MESSAGE: &str = "You are already subscribed.";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<b>a&b</b>"), "&lt;b&gt;a&amp;b&lt;/b&gt;");
    }

    #[test]
    fn token_message_badge_only_when_verified() {
        let mut t = TokenCandidate {
            address: "Addr".into(),
            name: "World <Liberty>".into(),
            symbol: "WLFI".into(),
            volume_24h_usd: Some(1234.5),
            owner: Some("Auth123".into()),
            verified: false,
        };
        let plain = token_message(&t);
        assert!(!plain.contains("VERIFIED"));
        assert!(plain.contains("World &lt;Liberty&gt;"));
        assert!(plain.contains("$1234.50"));

        t.verified = true;
        assert!(token_message(&t).contains("VERIFIED"));
    }

    #[test]
    fn token_message_missing_volume() {
        let t = TokenCandidate {
            address: "A".into(),
            name: String::new(),
            symbol: String::new(),
            volume_24h_usd: None,
            owner: None,
            verified: false,
        };
        let msg = token_message(&t);
        assert!(msg.contains("24h Vol: n/a"));
        assert!(msg.contains("unknown"));
    }

    #[test]
    fn transaction_description_is_capped() {
        let tx = Transaction {
            signature: "S".into(),
            description: "x".repeat(1000),
            log_messages: vec![],
        };
        let msg = transaction_message(&tx);
        assert!(msg.matches('x').count() <= MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn mention_message_links_post() {
        let m = Mention {
            id: "42".into(),
            text: "gm $WLFI".into(),
            created_at: Some(chrono::Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()),
        };
        let msg = mention_message(&m);
        assert!(msg.contains("https://x.com/i/status/42"));
        assert!(msg.contains("2025-09-01 12:00 UTC"));
    }

    #[test]
    fn startup_message_lists_pollers_and_authority() {
        let msg = startup_message("wlfi", &["meteora", "mentions"], Some("Auth123"), 2);
        assert!(msg.contains("meteora, mentions"));
        assert!(msg.contains("Auth123"));
        assert!(msg.contains("Subscribers: 2"));
        assert!(!startup_message("wlfi", &[], None, 0).contains("Authority"));
    }
}
