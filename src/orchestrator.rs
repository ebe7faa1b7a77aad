//! Wires configuration into pollers and keeps them running.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::FutureExt;
use reqwest::Client;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::{AppConfig, Credentials};
use crate::http::build_client;
use crate::notifier::{LogSender, MessageSender, Notifier, TelegramSender};
use crate::poller::{PollTask, Poller, Schedule, run_forever};
use crate::reporter::startup_message;
use crate::sources::{
    CommandPoller, MentionSource, MeteoraSource, RaydiumSource, TokenListSource,
};
use crate::store::SubscriberStore;

/// Every poller the watcher knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerKind {
    TokenList,
    Raydium,
    Meteora,
    Mentions,
    Subscriptions,
}

impl PollerKind {
    pub const ALL: [PollerKind; 5] = [
        PollerKind::TokenList,
        PollerKind::Raydium,
        PollerKind::Meteora,
        PollerKind::Mentions,
        PollerKind::Subscriptions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PollerKind::TokenList => "token_list",
            PollerKind::Raydium => "raydium",
            PollerKind::Meteora => "meteora",
            PollerKind::Mentions => "mentions",
            PollerKind::Subscriptions => "subscriptions",
        }
    }

    /// The environment variable this poller needs but does not have, if any.
    pub fn missing_credential(self, creds: &Credentials) -> Option<&'static str> {
        match self {
            PollerKind::TokenList if creds.birdeye_api_key.is_none() => {
                Some(Credentials::BIRDEYE_API_KEY)
            }
            PollerKind::Raydium if creds.helius_api_key.is_none() => {
                Some(Credentials::HELIUS_API_KEY)
            }
            PollerKind::Mentions if creds.twitter_bearer_token.is_none() => {
                Some(Credentials::TWITTER_BEARER_TOKEN)
            }
            PollerKind::Subscriptions if creds.bot_token.is_none() => Some(Credentials::BOT_TOKEN),
            _ => None,
        }
    }

    fn schedule(self, config: &AppConfig) -> Schedule {
        let c = match self {
            PollerKind::TokenList => config.token_list,
            PollerKind::Raydium => config.raydium,
            PollerKind::Meteora => config.meteora,
            PollerKind::Mentions => config.mentions,
            PollerKind::Subscriptions => config.subscriptions,
        };
        Schedule::from(c)
    }
}

/// Pollers that can run with the given credentials, in start order.
pub fn enabled_pollers(creds: &Credentials) -> Vec<PollerKind> {
    PollerKind::ALL
        .into_iter()
        .filter(|k| k.missing_credential(creds).is_none())
        .collect()
}

/// Builds a fresh task each time it is called; used for the first start and
/// for restarts.
pub type TaskFactory = Arc<dyn Fn() -> Option<Box<dyn PollTask>> + Send + Sync>;

/// Everything a poller needs, shared by all factories.
struct Shared {
    config: AppConfig,
    creds: Credentials,
    client: Client,
    notifier: Arc<Notifier>,
}

fn build_task(kind: PollerKind, s: &Shared) -> Option<Box<dyn PollTask>> {
    let settings = &s.config.settings;
    let endpoints = &s.config.endpoints;
    let schedule = kind.schedule(&s.config);
    let keyword = settings.keyword.as_str();
    let capacity = settings.seen_capacity;
    let notifier = Arc::clone(&s.notifier);
    let client = s.client.clone();

    let task: Box<dyn PollTask> = match kind {
        PollerKind::TokenList => {
            let source = TokenListSource::new(
                client,
                &endpoints.token_list,
                &endpoints.liquidity,
                &endpoints.rpc,
                s.creds.birdeye_api_key.as_deref()?,
                s.creds.helius_api_key.as_deref(),
                s.creds.authority.as_deref(),
                keyword,
            );
            Box::new(Poller::new(source, schedule, capacity, notifier))
        }
        PollerKind::Raydium => {
            let source = RaydiumSource::new(
                client,
                &endpoints.transactions,
                s.creds.helius_api_key.as_deref()?,
                keyword,
            );
            Box::new(Poller::new(source, schedule, capacity, notifier))
        }
        PollerKind::Meteora => {
            let source = MeteoraSource::new(client, &endpoints.pools, keyword);
            Box::new(Poller::new(source, schedule, capacity, notifier))
        }
        PollerKind::Mentions => {
            let source = MentionSource::new(
                client,
                &endpoints.search,
                s.creds.twitter_bearer_token.as_deref()?,
                &settings.mention_query(),
                settings.mention_max_results,
            );
            Box::new(Poller::new(source, schedule, capacity, notifier))
        }
        PollerKind::Subscriptions => Box::new(CommandPoller::new(
            client,
            &endpoints.telegram,
            s.creds.bot_token.as_deref()?,
            settings.request_timeout(),
            schedule,
            notifier,
        )),
    };
    Some(task)
}

/// Owns the running poller tasks.
///
/// Each task is wrapped in a restart loop: if a poller ever stops (it should
/// not), it is rebuilt from its factory after its back-off.
#[derive(Default)]
pub struct Supervisor {
    tasks: JoinSet<()>,
    names: Vec<&'static str>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, name: &'static str, restart_delay: Duration, factory: TaskFactory) {
        self.names.push(name);
        self.tasks.spawn(async move {
            loop {
                let Some(task) = factory() else {
                    error!(source = name, "Poller could not be built, giving up");
                    return;
                };
                match AssertUnwindSafe(run_forever(task)).catch_unwind().await {
                    Ok(()) => warn!(source = name, "Poller exited, restarting"),
                    Err(_) => error!(source = name, "Poller crashed, restarting"),
                }
                tokio::time::sleep(restart_delay).await;
            }
        });
    }

    /// Names of the supervised pollers, in spawn order.
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait until every task has ended. With at least one poller running this
    /// does not return on its own.
    pub async fn wait(&mut self) {
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                if !e.is_cancelled() {
                    error!("Supervised task failed: {e}");
                }
            }
        }
    }

    pub async fn shutdown(&mut self) {
        self.tasks.abort_all();
        self.wait().await;
    }
}

/// Pick the message sender: log-only for dry runs or when no bot token is set.
pub fn build_sender(
    client: &Client,
    config: &AppConfig,
    creds: &Credentials,
    dry_run: bool,
) -> Arc<dyn MessageSender> {
    match (&creds.bot_token, dry_run) {
        (Some(token), false) => Arc::new(TelegramSender::new(
            client.clone(),
            &config.endpoints.telegram,
            token,
        )),
        (None, false) => {
            warn!(
                "{} not set; notifications will only be logged",
                Credentials::BOT_TOKEN
            );
            Arc::new(LogSender)
        }
        (_, true) => Arc::new(LogSender),
    }
}

/// The assembled application: config, shared client and notifier.
pub struct Watcher {
    shared: Arc<Shared>,
}

impl Watcher {
    /// Build the watcher with the sender chosen from credentials and mode.
    pub fn new(config: AppConfig, creds: Credentials, dry_run: bool) -> Result<Self> {
        let client = build_client(config.settings.request_timeout())?;
        let sender = build_sender(&client, &config, &creds, dry_run);
        Ok(Self::with_sender(config, creds, client, sender))
    }

    /// Build the watcher around an explicit sender.
    pub fn with_sender(
        config: AppConfig,
        creds: Credentials,
        client: Client,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        let store = Arc::new(SubscriberStore::new(&config.settings.subscribers_path));
        let notifier = Arc::new(Notifier::new(sender, store, creds.admin_chat_id));
        Self {
            shared: Arc::new(Shared {
                config,
                creds,
                client,
                notifier,
            }),
        }
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.shared.notifier
    }

    /// Warn once about every missing credential and return the pollers to run.
    pub fn plan(&self) -> Vec<PollerKind> {
        let creds = &self.shared.creds;
        for kind in PollerKind::ALL {
            if let Some(var) = kind.missing_credential(creds) {
                warn!("{var} not set; {} poller disabled", kind.name());
            }
        }
        if creds.admin_chat_id.is_none() {
            warn!(
                "{} not set; alerts go to subscribers only",
                Credentials::ADMIN_CHAT_ID
            );
        }
        if creds.helius_api_key.is_none() && creds.birdeye_api_key.is_some() {
            warn!(
                "{} not set; token authority check disabled",
                Credentials::HELIUS_API_KEY
            );
        }
        enabled_pollers(creds)
    }

    /// Load subscribers, announce startup, then spawn every enabled poller.
    pub async fn start(&self) -> Supervisor {
        let kinds = self.plan();
        let names: Vec<&str> = kinds.iter().map(|k| k.name()).collect();

        let notifier = &self.shared.notifier;
        let subscribers = notifier.store().load().await;
        info!(
            "Loaded {} subscriber(s) from {}",
            subscribers.len(),
            notifier.store().path().display()
        );

        let settings = &self.shared.config.settings;
        let banner = startup_message(
            &settings.keyword,
            &names,
            self.shared.creds.authority.as_deref(),
            subscribers.len(),
        );
        notifier.notify(&banner).await;

        let mut supervisor = Supervisor::new();
        for kind in kinds {
            let shared = Arc::clone(&self.shared);
            let factory: TaskFactory = Arc::new(move || build_task(kind, &shared));
            let restart_delay = kind.schedule(&self.shared.config).backoff;
            supervisor.spawn(kind.name(), restart_delay, factory);
        }
        info!("Started {} poller(s): {}", supervisor.len(), names.join(", "));
        supervisor
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::notifier::testing::RecordingSender;

    fn creds(pairs: &[(&str, &str)]) -> Credentials {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Credentials::from_lookup(move |key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn only_keyless_poller_without_credentials() {
        assert_eq!(enabled_pollers(&creds(&[])), vec![PollerKind::Meteora]);
    }

    #[test]
    fn all_pollers_with_full_credentials() {
        let c = creds(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("BIRDEYE_API_KEY", "b"),
            ("HELIUS_API_KEY", "h"),
            ("TWITTER_BEARER_TOKEN", "x"),
        ]);
        assert_eq!(enabled_pollers(&c), PollerKind::ALL.to_vec());
    }

    #[test]
    fn missing_credential_names_variable() {
        let c = creds(&[("BIRDEYE_API_KEY", "b")]);
        assert_eq!(PollerKind::TokenList.missing_credential(&c), None);
        assert_eq!(
            PollerKind::Raydium.missing_credential(&c),
            Some("HELIUS_API_KEY")
        );
        assert_eq!(
            PollerKind::Subscriptions.missing_credential(&c),
            Some("TELEGRAM_BOT_TOKEN")
        );
    }

    #[test]
    fn build_task_matches_plan() {
        let c = creds(&[("TWITTER_BEARER_TOKEN", "x")]);
        let shared = Shared {
            config: AppConfig::default(),
            creds: c,
            client: Client::new(),
            notifier: Arc::new(Notifier::new(
                Arc::new(LogSender),
                Arc::new(SubscriberStore::new("unused.json")),
                None,
            )),
        };
        for kind in PollerKind::ALL {
            let enabled = kind.missing_credential(&shared.creds).is_none();
            let task = build_task(kind, &shared);
            assert_eq!(task.is_some(), enabled, "{}", kind.name());
            if let Some(task) = task {
                assert_eq!(task.name(), kind.name());
            }
        }
    }

    /// Panics while being started the first time it is built.
    struct CrashOnFirstStart {
        first: bool,
        polls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PollTask for CrashOnFirstStart {
        fn name(&self) -> &'static str {
            "crashy"
        }

        fn schedule(&self) -> Schedule {
            if self.first {
                panic!("bad start");
            }
            Schedule {
                interval: Duration::from_millis(5),
                backoff: Duration::from_millis(5),
            }
        }

        async fn poll_once(&mut self) -> Result<usize> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    #[tokio::test]
    async fn crashed_poller_is_rebuilt() {
        let builds = Arc::new(AtomicUsize::new(0));
        let polls = Arc::new(AtomicUsize::new(0));
        let factory: TaskFactory = {
            let builds = Arc::clone(&builds);
            let polls = Arc::clone(&polls);
            Arc::new(move || {
                let n = builds.fetch_add(1, Ordering::SeqCst);
                Some(Box::new(CrashOnFirstStart {
                    first: n == 0,
                    polls: Arc::clone(&polls),
                }) as Box<dyn PollTask>)
            })
        };

        let mut supervisor = Supervisor::new();
        supervisor.spawn("crashy", Duration::from_millis(5), factory);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert!(polls.load(Ordering::SeqCst) > 0);
        assert_eq!(supervisor.names(), &["crashy"]);
        assert_eq!(supervisor.len(), 1);
        supervisor.shutdown().await;
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn start_loads_subscribers_then_announces() {
        let dir = tempfile::tempdir().unwrap();
        let subs = dir.path().join("subs.json");
        std::fs::write(&subs, "[111, 222]").unwrap();

        let mut config = AppConfig::default();
        config.settings.subscribers_path = subs.to_string_lossy().into_owned();
        // Nothing listens on the discard port; the meteora poller just backs off
        config.endpoints.pools = "http://127.0.0.1:9/pools".to_string();

        let sender = Arc::new(RecordingSender::default());
        let watcher = Watcher::with_sender(
            config,
            creds(&[("TELEGRAM_CHAT_ID", "333"), ("WLFI_AUTHORITY", "Auth123")]),
            Client::new(),
            sender.clone(),
        );
        let mut supervisor = watcher.start().await;

        let sent = sender.messages();
        let mut ids: Vec<i64> = sent.iter().map(|(id, _)| *id).collect();
        ids.sort();
        assert_eq!(ids, vec![111, 222, 333]);
        let banner = &sent[0].1;
        assert!(banner.contains("Subscribers: 2"));
        assert!(banner.contains("Pollers: meteora"));
        assert!(banner.contains("Auth123"));
        assert_eq!(supervisor.names(), &["meteora"]);

        supervisor.shutdown().await;
    }
}
