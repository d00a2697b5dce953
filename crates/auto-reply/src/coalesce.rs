//! Per-sender debounce buffer.
//!
//! Fragments from one sender accumulate in a pending batch while a timer
//! slides forward on every arrival. When the sender goes quiet for the
//! window, the batch is detached and handed to a worker that generates one
//! reply and dispatches it. At most one worker runs per sender; a batch
//! whose timer fires while a worker is still running is kept and flushed as
//! soon as that worker finishes.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use {
    murmur_channels::ChannelOutbound,
    murmur_common::{InboundFragment, SenderId},
    murmur_config::AutoReplyConfig,
    tokio::{
        sync::Mutex,
        task::AbortHandle,
        time::{Instant, sleep_until, timeout},
    },
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    reply::ReplyGenerator,
};

/// Prepended when a batch holds more than one fragment.
const MULTI_FRAGMENT_HINT: &str = "[The user sent several messages in a row. Address every point \
                                   in a single reply.]";

/// Timing and formatting knobs for the buffer.
#[derive(Debug, Clone)]
pub struct CoalesceConfig {
    /// Quiet period after the last fragment.
    pub window: Duration,
    /// Cap on total batch age, measured from its first fragment.
    pub max_wait: Option<Duration>,
    pub separator: String,
    pub reply_timeout: Duration,
    pub dispatch_timeout: Duration,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self::from_config(&AutoReplyConfig::default(), Duration::from_secs(15))
    }
}

impl CoalesceConfig {
    pub fn from_config(config: &AutoReplyConfig, dispatch_timeout: Duration) -> Self {
        Self {
            window: config.debounce(),
            max_wait: config.max_wait(),
            separator: config.separator.clone(),
            reply_timeout: config.reply_timeout(),
            dispatch_timeout,
        }
    }
}

struct PendingBatch {
    fragments: Vec<InboundFragment>,
    created_at: Instant,
    last_fragment_at: Instant,
    timer: Option<AbortHandle>,
    /// Identifies the armed timer; a fire carrying another value is stale.
    generation: u64,
    /// Timer fired while a worker was running; flush when it finishes.
    deferred: bool,
}

impl PendingBatch {
    fn new(now: Instant) -> Self {
        Self {
            fragments: Vec::new(),
            created_at: now,
            last_fragment_at: now,
            timer: None,
            generation: 0,
            deferred: false,
        }
    }
}

impl Drop for PendingBatch {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct State {
    batches: HashMap<SenderId, PendingBatch>,
    in_flight: HashSet<SenderId>,
    next_generation: u64,
}

impl State {
    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

struct Inner {
    config: CoalesceConfig,
    generator: Arc<dyn ReplyGenerator>,
    dispatcher: Arc<dyn ChannelOutbound>,
    state: Mutex<State>,
}

/// Debounces inbound fragments per sender. Cheap to clone.
#[derive(Clone)]
pub struct CoalescingBuffer {
    inner: Arc<Inner>,
}

impl CoalescingBuffer {
    pub fn new(
        config: CoalesceConfig,
        generator: Arc<dyn ReplyGenerator>,
        dispatcher: Arc<dyn ChannelOutbound>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                generator,
                dispatcher,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Append `fragment` to the sender's pending batch and restart its timer.
    pub async fn enqueue(&self, sender: SenderId, fragment: InboundFragment) {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let now = Instant::now();
        let generation = state.bump_generation();
        let in_flight = state.in_flight.contains(&sender);

        let batch = state
            .batches
            .entry(sender.clone())
            .or_insert_with(|| PendingBatch::new(now));
        batch.fragments.push(fragment);
        batch.last_fragment_at = now;
        batch.generation = generation;
        if let Some(timer) = batch.timer.take() {
            timer.abort();
        }
        let deadline = self.deadline_for(batch);
        batch.timer = Some(self.arm(sender.clone(), generation, deadline));

        debug!(
            sender = %sender,
            fragments = batch.fragments.len(),
            in_flight,
            "fragment buffered"
        );
    }

    /// Number of fragments waiting for `sender`.
    pub async fn pending(&self, sender: &SenderId) -> usize {
        let state = self.inner.state.lock().await;
        state.batches.get(sender).map_or(0, |b| b.fragments.len())
    }

    /// Whether a worker is currently running for `sender`.
    pub async fn is_in_flight(&self, sender: &SenderId) -> bool {
        self.inner.state.lock().await.in_flight.contains(sender)
    }

    fn deadline_for(&self, batch: &PendingBatch) -> Instant {
        let config = &self.inner.config;
        let sliding = batch.last_fragment_at + config.window;
        match config.max_wait {
            Some(max_wait) => sliding.min(batch.created_at + max_wait),
            None => sliding,
        }
    }

    fn arm(&self, sender: SenderId, generation: u64, deadline: Instant) -> AbortHandle {
        let this = self.clone();
        tokio::spawn(async move {
            sleep_until(deadline).await;
            this.on_timer_fire(sender, generation).await;
        })
        .abort_handle()
    }

    async fn on_timer_fire(&self, sender: SenderId, generation: u64) {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        let Some(batch) = state.batches.get_mut(&sender) else {
            return;
        };
        if batch.generation != generation {
            return;
        }
        // This task is the timer; it must not abort itself when the batch drops.
        batch.timer = None;

        if state.in_flight.contains(&sender) {
            batch.deferred = true;
            debug!(sender = %sender, fragments = batch.fragments.len(), "worker busy, flush deferred");
            return;
        }

        let Some(mut batch) = state.batches.remove(&sender) else {
            return;
        };
        state.in_flight.insert(sender.clone());
        let fragments = std::mem::take(&mut batch.fragments);
        drop(guard);

        let this = self.clone();
        tokio::spawn(async move { this.run_worker(sender, fragments).await });
    }

    async fn run_worker(self, sender: SenderId, fragments: Vec<InboundFragment>) {
        let count = fragments.len();
        let this = self.clone();
        let worker_sender = sender.clone();
        let result = tokio::spawn(async move { this.process(&worker_sender, fragments).await })
            .await
            .map_err(Error::from)
            .and_then(|r| r);

        if let Err(e) = result {
            warn!(sender = %sender, fragments = count, error = %e, "dropping batch");
        }
        self.finish(&sender).await;
    }

    async fn process(&self, sender: &SenderId, fragments: Vec<InboundFragment>) -> Result<()> {
        let config = &self.inner.config;
        let count = fragments.len();
        let Some(text) = compose(&fragments, &config.separator) else {
            debug!(sender = %sender, "batch has no text, nothing to answer");
            return Ok(());
        };

        let reply = timeout(
            config.reply_timeout,
            self.inner.generator.generate(sender, &text),
        )
        .await
        .map_err(|_| Error::Timeout {
            stage: "reply generation",
            after: config.reply_timeout,
        })?
        .map_err(Error::Generate)?;

        let reply = reply.trim();
        if reply.is_empty() {
            debug!(sender = %sender, "empty reply, nothing to send");
            return Ok(());
        }

        timeout(
            config.dispatch_timeout,
            self.inner.dispatcher.send_text(sender, reply),
        )
        .await
        .map_err(|_| Error::Timeout {
            stage: "dispatch",
            after: config.dispatch_timeout,
        })??;

        info!(sender = %sender, fragments = count, "reply dispatched");
        Ok(())
    }

    async fn finish(&self, sender: &SenderId) {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        state.in_flight.remove(sender);

        let generation = state.bump_generation();
        if let Some(batch) = state.batches.get_mut(sender)
            && batch.deferred
        {
            batch.deferred = false;
            batch.generation = generation;
            let deadline = self.deadline_for(batch);
            batch.timer = Some(self.arm(sender.clone(), generation, deadline));
            debug!(sender = %sender, fragments = batch.fragments.len(), "re-armed deferred batch");
        }
    }
}

/// Join the text fragments of a batch. The multi-fragment hint is added
/// whenever more than one fragment was coalesced, blank ones included.
fn compose(fragments: &[InboundFragment], separator: &str) -> Option<String> {
    let texts: Vec<&str> = fragments
        .iter()
        .filter_map(InboundFragment::as_text)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    if texts.is_empty() {
        return None;
    }
    let joined = texts.join(separator);
    if fragments.len() > 1 {
        Some(format!("{MULTI_FRAGMENT_HINT}\n\n{joined}"))
    } else {
        Some(joined)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        std::sync::{
            Mutex as StdMutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    const WINDOW: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct FakeGenerator {
        calls: StdMutex<Vec<(String, String)>>,
        delay: Duration,
        fail_for: Option<String>,
        reply: Option<String>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait]
    impl ReplyGenerator for FakeGenerator {
        async fn generate(&self, sender: &SenderId, text: &str) -> anyhow::Result<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.calls
                .lock()
                .unwrap()
                .push((sender.to_string(), text.to_string()));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail_for.as_deref() == Some(sender.as_str()) {
                anyhow::bail!("model unavailable");
            }
            Ok(self
                .reply
                .clone()
                .unwrap_or_else(|| format!("re: {text}")))
        }
    }

    #[derive(Default)]
    struct FakeDispatcher {
        sent: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChannelOutbound for FakeDispatcher {
        async fn send_text(&self, to: &SenderId, text: &str) -> murmur_channels::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn config() -> CoalesceConfig {
        CoalesceConfig {
            window: WINDOW,
            max_wait: None,
            separator: "\n".into(),
            reply_timeout: Duration::from_secs(60),
            dispatch_timeout: Duration::from_secs(15),
        }
    }

    fn buffer(
        config: CoalesceConfig,
        generator: &Arc<FakeGenerator>,
        dispatcher: &Arc<FakeDispatcher>,
    ) -> CoalescingBuffer {
        CoalescingBuffer::new(config, generator.clone(), dispatcher.clone())
    }

    fn alice() -> SenderId {
        SenderId::from_canonical("972501234567")
    }

    fn bob() -> SenderId {
        SenderId::from_canonical("972507654321")
    }

    fn text(body: &str) -> InboundFragment {
        InboundFragment::text(body)
    }

    async fn advance(d: Duration) {
        tokio::time::sleep(d).await;
    }

    fn calls(generator: &FakeGenerator) -> Vec<(String, String)> {
        generator.calls.lock().unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_coalesced_and_later_message_is_separate() {
        let generator = Arc::new(FakeGenerator::default());
        let dispatcher = Arc::new(FakeDispatcher::default());
        let buf = buffer(config(), &generator, &dispatcher);

        buf.enqueue(alice(), text("A")).await;
        advance(Duration::from_secs(2)).await;
        buf.enqueue(alice(), text("B")).await;

        // Window restarted at B: nothing yet 4s after B.
        advance(Duration::from_secs(4)).await;
        assert!(calls(&generator).is_empty());
        assert_eq!(buf.pending(&alice()).await, 2);

        advance(Duration::from_secs(2)).await;
        let expected_batch = format!("{MULTI_FRAGMENT_HINT}\n\nA\nB");
        assert_eq!(calls(&generator), vec![(
            alice().to_string(),
            expected_batch.clone()
        )]);
        assert_eq!(buf.pending(&alice()).await, 0);
        assert!(!buf.is_in_flight(&alice()).await);

        buf.enqueue(alice(), text("C")).await;
        advance(WINDOW + Duration::from_millis(100)).await;

        assert_eq!(calls(&generator).len(), 2);
        assert_eq!(calls(&generator)[1].1, "C");
        let sent = dispatcher.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![
            (alice().to_string(), format!("re: {expected_batch}")),
            (alice().to_string(), "re: C".to_string()),
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn senders_are_independent() {
        let generator = Arc::new(FakeGenerator::default());
        let dispatcher = Arc::new(FakeDispatcher::default());
        let buf = buffer(config(), &generator, &dispatcher);

        buf.enqueue(alice(), text("from alice")).await;
        advance(Duration::from_secs(3)).await;
        buf.enqueue(bob(), text("from bob")).await;

        advance(Duration::from_millis(2100)).await;
        assert_eq!(calls(&generator), vec![(
            alice().to_string(),
            "from alice".to_string()
        )]);

        advance(Duration::from_secs(3)).await;
        assert_eq!(calls(&generator).len(), 2);
        assert_eq!(calls(&generator)[1].0, bob().to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_worker_per_sender() {
        let generator = Arc::new(FakeGenerator {
            delay: Duration::from_secs(30),
            ..Default::default()
        });
        let dispatcher = Arc::new(FakeDispatcher::default());
        let buf = buffer(config(), &generator, &dispatcher);

        buf.enqueue(alice(), text("first")).await;
        advance(WINDOW + Duration::from_secs(1)).await;
        assert!(buf.is_in_flight(&alice()).await);

        // Arrives mid-flight; its timer fires at ~11s while the worker still runs.
        buf.enqueue(alice(), text("second")).await;
        advance(WINDOW + Duration::from_secs(1)).await;
        assert_eq!(calls(&generator).len(), 1);
        assert_eq!(buf.pending(&alice()).await, 1, "batch kept, not cleared");

        // First worker finishes at ~35s; deferred batch flushes right after.
        advance(Duration::from_secs(25)).await;
        let all = calls(&generator);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].1, "second");
        assert_eq!(generator.max_active.load(Ordering::SeqCst), 1);

        advance(Duration::from_secs(31)).await;
        assert_eq!(dispatcher.sent.lock().unwrap().len(), 2);
        assert!(!buf.is_in_flight(&alice()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_isolated_and_clears_in_flight() {
        let generator = Arc::new(FakeGenerator {
            fail_for: Some(alice().to_string()),
            ..Default::default()
        });
        let dispatcher = Arc::new(FakeDispatcher::default());
        let buf = buffer(config(), &generator, &dispatcher);

        buf.enqueue(alice(), text("doomed")).await;
        buf.enqueue(bob(), text("fine")).await;
        advance(WINDOW + Duration::from_millis(100)).await;

        let sent = dispatcher.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(bob().to_string(), "re: fine".to_string())]);
        assert!(!buf.is_in_flight(&alice()).await);
        assert_eq!(buf.pending(&alice()).await, 0, "failed batch is dropped");

        buf.enqueue(alice(), text("again")).await;
        advance(WINDOW + Duration::from_millis(100)).await;
        assert_eq!(calls(&generator).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_is_not_dispatched() {
        let generator = Arc::new(FakeGenerator {
            reply: Some("   ".into()),
            ..Default::default()
        });
        let dispatcher = Arc::new(FakeDispatcher::default());
        let buf = buffer(config(), &generator, &dispatcher);

        buf.enqueue(alice(), text("hello")).await;
        advance(WINDOW + Duration::from_millis(100)).await;

        assert_eq!(calls(&generator).len(), 1);
        assert!(dispatcher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out() {
        let generator = Arc::new(FakeGenerator {
            delay: Duration::from_secs(120),
            ..Default::default()
        });
        let dispatcher = Arc::new(FakeDispatcher::default());
        let buf = buffer(config(), &generator, &dispatcher);

        buf.enqueue(alice(), text("hello")).await;
        advance(WINDOW + Duration::from_secs(61)).await;

        assert!(dispatcher.sent.lock().unwrap().is_empty());
        assert!(!buf.is_in_flight(&alice()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn max_wait_caps_a_sliding_batch() {
        let generator = Arc::new(FakeGenerator::default());
        let dispatcher = Arc::new(FakeDispatcher::default());
        let buf = buffer(
            CoalesceConfig {
                max_wait: Some(Duration::from_secs(8)),
                ..config()
            },
            &generator,
            &dispatcher,
        );

        for body in ["one", "two", "three"] {
            buf.enqueue(alice(), text(body)).await;
            advance(Duration::from_secs(3)).await;
        }
        // t=9s: the cap fired at 8s with the first three fragments.
        let first = calls(&generator);
        assert_eq!(first.len(), 1);
        assert!(first[0].1.ends_with("one\ntwo\nthree"));
    }

    #[test]
    fn compose_joins_text_and_skips_blanks() {
        assert_eq!(compose(&[text("only")], "\n").as_deref(), Some("only"));
        assert_eq!(
            compose(&[text("  "), text("x ")], "\n").unwrap(),
            format!("{MULTI_FRAGMENT_HINT}\n\nx")
        );
        assert_eq!(compose(&[text(" "), text("")], "\n"), None);
        assert_eq!(compose(&[], "\n"), None);
        assert_eq!(
            compose(&[text("a"), text("b")], " | ").unwrap(),
            format!("{MULTI_FRAGMENT_HINT}\n\na | b")
        );
    }
}
