//! Per-source adapters plugged into the generic poller.

pub mod mentions;
pub mod meteora;
pub mod raydium;
pub mod subscriptions;
pub mod token_list;

pub use mentions::MentionSource;
pub use meteora::MeteoraSource;
pub use raydium::RaydiumSource;
pub use subscriptions::CommandPoller;
pub use token_list::TokenListSource;
