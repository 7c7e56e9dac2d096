//! Concurrent orchestration of every registered collector.
//!
//! # Execution Model
//!
//! ```text
//!  collector A ──start──► [buf 10] ──relay──┐
//!  collector B ──start──► [buf 10] ──relay──┼──► merged Sender<Post>
//!  collector C ──start──► [buf 10] ──relay──┘
//! ```
//!
//! Each collector gets a producer task running [`Collector::start`] and a
//! relay task that stamps provenance on every post and binds a
//! [`ContentResolver`] pointing back at the same collector. A failing
//! producer is logged and its stream simply ends; siblings keep going.
//!
//! [`Framework::start`] returns once every producer and relay has finished.
//! The merged sender is dropped at that point, which is the downstream
//! end-of-stream signal. There is no ordering across collectors; each
//! collector's own order is preserved.

use crate::collectors::Collector;
use crate::error::{Error, Result};
use crate::models::{ContentResolver, Post};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

/// Capacity of each collector's private channel.
pub const COLLECTOR_BUFFER: usize = 10;

pub struct Framework {
    collectors: Vec<Arc<dyn Collector>>,
    collector_timeout: Option<Duration>,
}

impl Framework {
    /// Build a framework over `collectors`, in the given order.
    ///
    /// # Arguments
    ///
    /// * `collectors` - Every collector to run; names must be unique
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateCollector`] naming the first name seen twice.
    pub fn new(collectors: Vec<Arc<dyn Collector>>) -> Result<Self> {
        let mut names = HashSet::new();
        for collector in &collectors {
            if !names.insert(collector.name()) {
                return Err(Error::DuplicateCollector(collector.name().to_string()));
            }
        }
        Ok(Self {
            collectors,
            collector_timeout: None,
        })
    }

    /// Abandon any collector whose `start` runs longer than `timeout`.
    ///
    /// Without a timeout a collector that never returns stalls the run.
    pub fn with_collector_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.collector_timeout = timeout;
        self
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Run every collector and merge their posts into `tx`.
    ///
    /// All collectors are initialized first, one after another. The first
    /// initialization failure aborts the run before any collector starts.
    /// After that, collector failures are logged and never returned.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Shared with every collector and every bound resolver
    /// * `tx` - Merged output; dropped once all collectors have finished,
    ///   which closes the stream for the receiver
    ///
    /// # Errors
    ///
    /// [`Error::Initialize`] naming the first collector whose setup failed.
    #[instrument(level = "info", skip_all)]
    pub async fn start(&self, cancel: CancellationToken, tx: mpsc::Sender<Post>) -> Result<()> {
        info!(collector_count = self.collectors.len(), "start to process collector");

        for collector in &self.collectors {
            collector
                .initialize(&cancel)
                .instrument(info_span!("collector", collector = %collector.name()))
                .await
                .map_err(|source| Error::Initialize {
                    collector: collector.name().to_string(),
                    source,
                })?;
        }

        let mut workers = Vec::with_capacity(self.collectors.len() * 2);
        for collector in &self.collectors {
            let (collector_tx, collector_rx) = mpsc::channel(COLLECTOR_BUFFER);
            let span = info_span!("collector", collector = %collector.name());

            workers.push(tokio::spawn(
                produce(
                    Arc::clone(collector),
                    cancel.clone(),
                    collector_tx,
                    self.collector_timeout,
                )
                .instrument(span.clone()),
            ));
            workers.push(tokio::spawn(
                relay(Arc::clone(collector), cancel.clone(), collector_rx, tx.clone())
                    .instrument(span),
            ));
        }
        // Relays hold the only remaining senders.
        drop(tx);

        for joined in join_all(workers).await {
            if let Err(e) = joined {
                error!(error = %e, "collector worker panicked");
            }
        }

        info!("all collectors finished");
        Ok(())
    }
}

/// Run one collector to completion. Dropping `tx` on return ends its stream.
async fn produce(
    collector: Arc<dyn Collector>,
    cancel: CancellationToken,
    tx: mpsc::Sender<Post>,
    timeout: Option<Duration>,
) {
    let started = collector.start(&cancel, tx);
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, started).await {
            Ok(outcome) => outcome,
            Err(_) => Err(format!("collector did not finish within {limit:?}").into()),
        },
        None => started.await,
    };

    match outcome {
        Ok(()) => debug!("collector finished"),
        Err(e) => error!(error = %e, "start collector failed"),
    }
}

/// Forward one collector's posts with provenance and a bound resolver.
async fn relay(
    collector: Arc<dyn Collector>,
    cancel: CancellationToken,
    mut rx: mpsc::Receiver<Post>,
    tx: mpsc::Sender<Post>,
) {
    let mut forwarded = 0usize;
    while let Some(mut post) = rx.recv().await {
        if post.title.trim().is_empty() {
            warn!(path = %post.path, "dropping post with empty title");
            continue;
        }

        post.domain = collector.name().to_string();
        let resolver = ContentResolver::new(Arc::clone(&collector), &post, cancel.clone());
        post.content_resolver = Some(resolver);

        if tx.send(post).await.is_err() {
            warn!("merged post channel closed; stop relaying");
            break;
        }
        forwarded += 1;
    }
    debug!(forwarded, "relay finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FakeCollector {
        name: String,
        posts: Vec<Post>,
        fail_init: bool,
        fail_start: bool,
        hang: bool,
        started: AtomicBool,
    }

    impl FakeCollector {
        fn new(name: &str, titles: &[&str]) -> Self {
            let posts = titles
                .iter()
                .map(|t| {
                    let mut post = Post::new(*t, format!("/{name}/{t}"), None);
                    post.domain = "spoofed".to_string();
                    post
                })
                .collect();
            Self {
                name: name.to_string(),
                posts,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Collector for FakeCollector {
        fn name(&self) -> &str {
            &self.name
        }

        async fn initialize(&self, _cancel: &CancellationToken) -> std::result::Result<(), BoxError> {
            if self.fail_init {
                return Err("no credentials".into());
            }
            Ok(())
        }

        async fn start(
            &self,
            cancel: &CancellationToken,
            tx: mpsc::Sender<Post>,
        ) -> std::result::Result<(), BoxError> {
            self.started.store(true, Ordering::SeqCst);
            for post in &self.posts {
                tx.send(post.clone()).await?;
            }
            if self.hang {
                cancel.cancelled().await;
                return Err("cancelled".into());
            }
            if self.fail_start {
                return Err("site is down".into());
            }
            Ok(())
        }

        async fn resolve_post_content(
            &self,
            _cancel: &CancellationToken,
            post: &Post,
        ) -> std::result::Result<String, BoxError> {
            Ok(format!("{} resolved {} for {}", self.name, post.path, post.domain))
        }
    }

    fn framework(collectors: Vec<FakeCollector>) -> Result<Framework> {
        Framework::new(
            collectors
                .into_iter()
                .map(|c| Arc::new(c) as Arc<dyn Collector>)
                .collect(),
        )
    }

    async fn run(framework: &Framework, cancel: CancellationToken) -> (Result<()>, Vec<Post>) {
        let (tx, mut rx) = mpsc::channel(1);
        let collect = async {
            let mut posts = Vec::new();
            while let Some(post) = rx.recv().await {
                posts.push(post);
            }
            posts
        };
        tokio::join!(framework.start(cancel, tx), collect)
    }

    #[test]
    fn test_duplicate_collector_name() {
        let err = framework(vec![
            FakeCollector::new("collector-a", &[]),
            FakeCollector::new("collector-b", &[]),
            FakeCollector::new("collector-a", &[]),
        ])
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "duplicate collector name: collector-a");
    }

    #[test]
    fn test_unique_collector_names() {
        let framework = framework(vec![
            FakeCollector::new("collector-a", &[]),
            FakeCollector::new("collector-b", &[]),
            FakeCollector::new("collector-c", &[]),
        ])
        .unwrap();
        assert_eq!(framework.len(), 3);
    }

    #[tokio::test]
    async fn test_merges_all_posts_with_domain_override() {
        let framework = framework(vec![
            FakeCollector::new("alpha", &["a1", "a2", "a3"]),
            FakeCollector::new("beta", &["b1"]),
            FakeCollector::new("gamma", &[]),
            FakeCollector::new("delta", &(0..25).map(|_| "d").collect::<Vec<_>>()),
        ])
        .unwrap();

        let (outcome, posts) = run(&framework, CancellationToken::new()).await;
        outcome.unwrap();
        assert_eq!(posts.len(), 3 + 1 + 25);

        for post in &posts {
            let expected = post.path.split('/').nth(1).unwrap();
            assert_eq!(post.domain, expected);
            assert!(post.content_resolver.is_some());
        }

        let alpha: Vec<&str> = posts
            .iter()
            .filter(|p| p.domain == "alpha")
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(alpha, vec!["a1", "a2", "a3"]);
    }

    #[tokio::test]
    async fn test_resolver_targets_emitting_collector() {
        let framework = framework(vec![
            FakeCollector::new("alpha", &["A"]),
            FakeCollector::new("beta", &["B"]),
        ])
        .unwrap();

        let (_, posts) = run(&framework, CancellationToken::new()).await;
        for post in &posts {
            let content = post.resolve_content().await.unwrap();
            assert_eq!(
                content,
                format!("{} resolved {} for {}", post.domain, post.path, post.domain)
            );
        }
    }

    #[tokio::test]
    async fn test_failing_collector_is_isolated() {
        let mut broken = FakeCollector::new("broken", &["partial"]);
        broken.fail_start = true;
        let framework = framework(vec![broken, FakeCollector::new("healthy", &["h1", "h2"])]).unwrap();

        let (outcome, posts) = run(&framework, CancellationToken::new()).await;
        outcome.unwrap();
        assert_eq!(posts.iter().filter(|p| p.domain == "healthy").count(), 2);
        assert_eq!(posts.iter().filter(|p| p.domain == "broken").count(), 1);
    }

    #[tokio::test]
    async fn test_initialize_failure_aborts_before_start() {
        let mut bad = FakeCollector::new("bad", &["x"]);
        bad.fail_init = true;
        let good = Arc::new(FakeCollector::new("good", &["y"]));
        let framework = Framework::new(vec![
            Arc::clone(&good) as Arc<dyn Collector>,
            Arc::new(bad) as Arc<dyn Collector>,
        ])
        .unwrap();

        let (outcome, posts) = run(&framework, CancellationToken::new()).await;
        match outcome {
            Err(Error::Initialize { collector, .. }) => assert_eq!(collector, "bad"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(posts.is_empty());
        assert!(!good.started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_empty_titles_are_dropped() {
        let framework = framework(vec![FakeCollector::new("alpha", &["ok", "", "  "])]).unwrap();
        let (_, posts) = run(&framework, CancellationToken::new()).await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "ok");
    }

    #[tokio::test]
    async fn test_timeout_abandons_hanging_collector() {
        let mut stuck = FakeCollector::new("stuck", &["s1"]);
        stuck.hang = true;
        let framework = framework(vec![stuck, FakeCollector::new("fine", &["f1"])])
            .unwrap()
            .with_collector_timeout(Some(Duration::from_millis(50)));

        let (outcome, posts) = run(&framework, CancellationToken::new()).await;
        outcome.unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_releases_cooperative_collector() {
        let mut waiting = FakeCollector::new("waiting", &["w1"]);
        waiting.hang = true;
        let framework = framework(vec![waiting]).unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let (outcome, posts) = run(&framework, cancel).await;
        outcome.unwrap();
        assert_eq!(posts.len(), 1);
    }
}
