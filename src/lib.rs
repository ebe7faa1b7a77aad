pub mod api;
pub mod config;
pub mod http;
pub mod notifier;
pub mod orchestrator;
pub mod poller;
pub mod reporter;
pub mod seen;
pub mod sources;
pub mod store;
pub mod types;

/// Keyword every source is matched against (case-insensitive).
pub const DEFAULT_KEYWORD: &str = "wlfi";

/// Birdeye token list, sorted by 24h volume.
pub const BIRDEYE_TOKENLIST_URL: &str =
    "https://public-api.birdeye.so/public/tokenlist?sort_by=volume_24h_usd";

/// Birdeye pool/liquidity endpoint; the token address is appended as a path segment.
pub const BIRDEYE_LIQUIDITY_URL: &str = "https://public-api.birdeye.so/public/pool/mapping";

/// Helius mainnet JSON-RPC. The API key is passed as `api-key` query param.
pub const HELIUS_RPC_URL: &str = "https://mainnet.helius-rpc.com/";

/// Helius enhanced transactions for the Raydium AMM v4 program.
pub const RAYDIUM_TX_URL: &str =
    "https://api.helius.xyz/v0/addresses/675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8/transactions";

/// Meteora DLMM pool listing (public, no auth required)
pub const METEORA_POOLS_URL: &str = "https://dlmm-api.meteora.ag/pair/all";

/// X (Twitter) v2 recent search
pub const TWITTER_SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";

/// Telegram Bot API base URL; `/bot<token>/<method>` is appended.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
