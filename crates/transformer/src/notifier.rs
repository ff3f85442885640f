// transformer/src/notifier.rs

//! Polling emulation of `eth_subscribe`.
//!
//! The node has no push channel, so every subscription owns a task that
//! polls it and forwards matches to the connection's outbound queue:
//! - `logs` long-polls `waitforlogs`, re-reads the reported block through
//!   `searchlogs` and drops notifications it already sent
//! - `newHeads` polls the chain height and renders each new tip through
//!   the registry's own `eth_getBlockByHash`

use crate::conversion::{extract_eth_logs, filter_kaon_logs, parse_filter_addresses, translate_topics};
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::{EthBlock, EthNewHead, JsonRpcNotification, JsonRpcRequest, SubscriptionParams, SUBSCRIPTION_METHOD};
use crate::registry::{RequestContext, Transformer};
use kaon_client::types::{SearchLogsRequest, WaitForLogsRequest};
use kaon_client::KaonClient;
use kaon_core::{add_hex_prefix, TopicSlot};
use md5::{Digest, Md5};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longest pause between two `waitforlogs` calls
pub const MAX_BACKOFF: Duration = Duration::from_secs(15);

/// Failures after which the backoff stops growing
pub const MAX_FAILURES: u32 = 10;

/// At most this many calls per `ROLLING_WINDOW` before it counts as a failure
pub const ROLLING_LIMIT: usize = 5;
pub const ROLLING_WINDOW: Duration = Duration::from_secs(10);

pub const MIN_CALL_SPACING: Duration = Duration::from_millis(100);

pub const NEW_HEADS_INTERVAL: Duration = Duration::from_secs(10);

/// Notification hashes remembered per subscription
pub const DEDUP_CAPACITY: usize = 4096;

/// What a subscription listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    Logs {
        /// Hex without `0x`
        addresses: Vec<String>,
        topics: Vec<TopicSlot>,
    },
    NewHeads,
}

impl SubscriptionKind {
    /// Parse `eth_subscribe` params: `["logs", {address, topics}]` or `["newHeads"]`
    pub fn from_params(params: &[Value]) -> TransformResult<Self> {
        let kind = params
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("missing subscription type"))?;

        match kind.to_ascii_lowercase().as_str() {
            "newheads" => Ok(SubscriptionKind::NewHeads),
            "logs" => {
                let filter = params.get(1).cloned().unwrap_or(Value::Null);
                let addresses = parse_filter_addresses(filter.get("address").unwrap_or(&Value::Null))?;
                let topics = match filter.get("topics") {
                    Some(Value::Array(topics)) => translate_topics(topics).map_err(JsonRpcError::invalid_params)?,
                    None | Some(Value::Null) => Vec::new(),
                    Some(other) => {
                        return Err(JsonRpcError::invalid_params(format!("invalid topics {}, array expected", other)))
                    }
                };
                Ok(SubscriptionKind::Logs { addresses, topics })
            }
            other => Err(JsonRpcError::invalid_params(format!("unsupported subscription type: {}", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SubscriptionKind::Logs { .. } => "logs",
            SubscriptionKind::NewHeads => "newHeads",
        }
    }
}

/// State shared by every connection's notifier
pub struct Agent {
    client: KaonClient,
    transformer: OnceLock<Weak<Transformer>>,
    shutdown: CancellationToken,
}

impl Agent {
    pub fn new(client: KaonClient, shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            client,
            transformer: OnceLock::new(),
            shutdown,
        })
    }

    /// Registry used by `newHeads`. Only the first call has an effect.
    pub fn set_transformer(&self, transformer: &Arc<Transformer>) {
        if self.transformer.set(Arc::downgrade(transformer)).is_err() {
            tracing::warn!("Transformer already attached to the subscription agent");
        }
    }

    fn transformer(&self) -> Option<Arc<Transformer>> {
        self.transformer.get().and_then(Weak::upgrade)
    }

    pub fn client(&self) -> &KaonClient {
        &self.client
    }

    /// Notifier for one WebSocket connection writing into `sink`
    pub fn new_notifier(self: &Arc<Self>, sink: UnboundedSender<String>) -> Arc<Notifier> {
        Arc::new(Notifier {
            agent: self.clone(),
            sink,
            cancel: self.shutdown.child_token(),
            subscriptions: Mutex::new(HashMap::new()),
        })
    }
}

struct Subscription {
    kind: &'static str,
    cancel: CancellationToken,
}

/// Subscriptions of one connection
pub struct Notifier {
    agent: Arc<Agent>,
    sink: UnboundedSender<String>,
    cancel: CancellationToken,
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl Notifier {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Subscription>> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start polling for `kind`, returning the new subscription id
    pub fn subscribe(self: &Arc<Self>, kind: SubscriptionKind) -> String {
        let id = new_subscription_id();
        let cancel = self.cancel.child_token();

        self.lock().insert(
            id.clone(),
            Subscription {
                kind: kind.name(),
                cancel: cancel.clone(),
            },
        );

        let notifier = self.clone();
        let sub_id = id.clone();
        tokio::spawn(async move {
            match kind {
                SubscriptionKind::Logs { addresses, topics } => {
                    notifier.run_logs(&sub_id, addresses, topics, &cancel).await
                }
                SubscriptionKind::NewHeads => notifier.run_new_heads(&sub_id, &cancel).await,
            }
            tracing::debug!(subscription = %sub_id, "Subscription loop finished");
        });

        tracing::debug!(subscription = %id, "Subscription started");
        id
    }

    /// Stop a subscription. False if the id is unknown.
    pub fn unsubscribe(&self, id: &str) -> bool {
        match self.lock().remove(id) {
            Some(sub) => {
                sub.cancel.cancel();
                tracing::debug!(subscription = id, kind = sub.kind, "Subscription cancelled");
                true
            }
            None => false,
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().len()
    }

    /// Queue an `eth_subscription` notification. False once the connection is gone.
    pub fn send(&self, subscription: &str, result: Value) -> bool {
        match notification_text(subscription, result) {
            Some(text) => self.push(text),
            None => true,
        }
    }

    fn push(&self, text: String) -> bool {
        if self.sink.send(text).is_err() {
            self.close();
            return false;
        }
        true
    }

    /// Stop every subscription of the connection
    pub fn close(&self) {
        self.cancel.cancel();
        self.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn run_logs(&self, id: &str, addresses: Vec<String>, topics: Vec<TopicSlot>, cancel: &CancellationToken) {
        let client = self.agent.client.clone();
        let mut req = WaitForLogsRequest {
            from_block: None,
            addresses: addresses.clone(),
            topics: topics.clone(),
            min_confirmations: 0,
        };

        let mut rolling = RollingLimit::new(ROLLING_LIMIT);
        let mut sent = DedupSet::new(DEDUP_CAPACITY);
        let mut failures = 0u32;

        loop {
            let started = Instant::now();
            rolling.push(started);

            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = client.wait_for_logs(&req) => result,
            };
            let call_took = started.elapsed();

            match result {
                Ok(resp) => {
                    req.from_block = Some(resp.next_block);
                    let block = resp.next_block.saturating_sub(1);
                    match self.emit_logs(id, &client, block, &addresses, &topics, &mut sent).await {
                        Ok(()) => {
                            let too_frequent = rolling
                                .oldest()
                                .map_or(false, |oldest| Instant::now().duration_since(oldest) < ROLLING_WINDOW);
                            failures = if too_frequent { failures + 1 } else { 0 };
                        }
                        Err(err) => {
                            tracing::warn!(subscription = id, error = %err, "Error calling searchlogs");
                            failures += 1;
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(subscription = id, error = %err, "waitforlogs failed");
                    failures += 1;
                }
            }

            if cancel.is_cancelled() {
                return;
            }

            let mut pause = backoff(failures, Duration::ZERO, MAX_BACKOFF);
            if call_took < MIN_CALL_SPACING {
                pause = pause.max(MIN_CALL_SPACING - call_took);
            }
            if pause > MIN_CALL_SPACING {
                tracing::debug!(subscription = id, millis = pause.as_millis() as u64, "Backing off");
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    async fn emit_logs(
        &self,
        id: &str,
        client: &KaonClient,
        block: u64,
        addresses: &[String],
        topics: &[TopicSlot],
        sent: &mut DedupSet,
    ) -> Result<(), kaon_client::KaonError> {
        let req = SearchLogsRequest {
            from_block: block,
            to_block: block,
            addresses: addresses.to_vec(),
            topics: topics.to_vec(),
            min_confirmations: None,
        };

        for receipt in client.search_logs(&req).await? {
            let logs = filter_kaon_logs(addresses, topics, &receipt.log);
            for log in extract_eth_logs(&receipt, &logs) {
                let Ok(result) = serde_json::to_value(&log) else { continue };
                let Some(text) = notification_text(id, result) else { continue };
                if !sent.insert(md5_digest(text.as_bytes())) {
                    continue;
                }
                tracing::debug!(subscription = id, block, "Notifying of logs");
                if !self.push(text) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn run_new_heads(&self, id: &str, cancel: &CancellationToken) {
        let client = self.agent.client.clone();
        let mut last_block: Option<u64> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(NEW_HEADS_INTERVAL) => {}
            }

            let Some(transformer) = self.agent.transformer() else {
                tracing::error!("No transformer available, cannot process newHeads subscriptions");
                continue;
            };

            let info = tokio::select! {
                _ = cancel.cancelled() => return,
                info = client.get_blockchain_info() => info,
            };
            let info = match info {
                Ok(info) => info,
                Err(err) => {
                    tracing::error!(error = %err, "Failure getting blockchain info");
                    continue;
                }
            };

            let Some(last) = last_block else {
                tracing::debug!(block = info.blocks, "Initial block detected");
                last_block = Some(info.blocks);
                continue;
            };
            if info.blocks <= last {
                tracing::debug!(block = info.blocks, "No new head detected");
                continue;
            }

            tracing::debug!(block = info.blocks, "New head detected");
            let req = JsonRpcRequest::new(
                "eth_getBlockByHash",
                json!([add_hex_prefix(&info.bestblockhash), false]),
            );
            let ctx = RequestContext::new(cancel.clone());
            let block = match transformer.transform(&req, &ctx).await {
                Ok(value) => serde_json::from_value::<EthBlock>(value),
                Err(err) => {
                    tracing::error!(hash = %info.bestblockhash, error = %err, "Failed to eth_getBlockByHash");
                    continue;
                }
            };
            let block = match block {
                Ok(block) => block,
                Err(err) => {
                    tracing::error!(hash = %info.bestblockhash, error = %err, "Unexpected eth_getBlockByHash result");
                    continue;
                }
            };

            last_block = Some(info.blocks);
            let head = EthNewHead::from(block);
            match serde_json::to_value(&head) {
                Ok(result) => {
                    if !self.send(id, result) {
                        return;
                    }
                }
                Err(err) => tracing::error!(error = %err, "Failed to encode new head"),
            }
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn new_subscription_id() -> String {
    format!("0x{}", hex::encode(rand::random::<[u8; 16]>()))
}

fn notification_text(subscription: &str, result: Value) -> Option<String> {
    let params = SubscriptionParams {
        subscription: subscription.to_string(),
        result,
    };
    let params = serde_json::to_value(params).ok()?;
    match serde_json::to_string(&JsonRpcNotification::new(SUBSCRIPTION_METHOD, params)) {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::error!(subscription, error = %err, "Failed to encode notification");
            None
        }
    }
}

fn md5_digest(bytes: &[u8]) -> [u8; 16] {
    Md5::digest(bytes).into()
}

/// Linear from `min` to `max` over `MAX_FAILURES` failures, then `max`
pub fn backoff(failures: u32, min: Duration, max: Duration) -> Duration {
    if failures == 0 {
        return min;
    }
    if failures > MAX_FAILURES {
        return max;
    }
    (max - min) / MAX_FAILURES * failures
}

/// Start times of the last `limit` calls
#[derive(Debug)]
pub struct RollingLimit {
    limit: usize,
    times: VecDeque<Instant>,
}

impl RollingLimit {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            times: VecDeque::with_capacity(limit),
        }
    }

    pub fn push(&mut self, at: Instant) {
        if self.times.len() == self.limit {
            self.times.pop_front();
        }
        self.times.push_back(at);
    }

    /// Oldest of the last `limit` calls, once that many were made
    pub fn oldest(&self) -> Option<Instant> {
        if self.times.len() < self.limit {
            return None;
        }
        self.times.front().copied()
    }
}

/// Bounded set evicting its oldest entry
#[derive(Debug)]
pub struct DedupSet {
    capacity: usize,
    order: VecDeque<[u8; 16]>,
    seen: HashSet<[u8; 16]>,
}

impl DedupSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// False if `key` is already present
    pub fn insert(&mut self, key: [u8; 16]) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaon_client::transport::mock::MockTransport;
    use kaon_client::{Chain, ClientOptions, NetworkSetting};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn agent(mock: Arc<MockTransport>) -> Arc<Agent> {
        let options = ClientOptions {
            network: NetworkSetting::Fixed(Chain::Test),
            ..Default::default()
        };
        let shutdown = CancellationToken::new();
        Agent::new(KaonClient::new(mock, options, shutdown.clone()), shutdown)
    }

    fn notifier(agent: &Arc<Agent>) -> (Arc<Notifier>, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (agent.new_notifier(tx), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    /// Node that always reports block 10 as done and one receipt in it
    fn logs_node() -> Arc<MockTransport> {
        let mock = Arc::new(MockTransport::new());
        mock.respond("waitforlogs", json!({"entries": [], "count": 0, "nextBlock": 11}));
        mock.respond(
            "searchlogs",
            json!([{
                "blockHash": "975326b65c20d0b8500f00a59f76b08a98513fff7ce0484382534a47b55f8985",
                "blockNumber": 10,
                "transactionHash": "c1816e5fbdd4d1cc62394be83c7c7130ccd2aadefcd91e789c1a0b33ec093fef",
                "transactionIndex": 0,
                "from": "6b22910b1e302cf74803ffd1691c2ecb858d3712",
                "to": "db46f738bf32cdafb9a4a70eb8b44c76646bcaf0",
                "cumulativeGasUsed": 68572,
                "gasUsed": 68572,
                "contractAddress": "db46f738bf32cdafb9a4a70eb8b44c76646bcaf0",
                "excepted": "None",
                "log": [{
                    "address": "db46f738bf32cdafb9a4a70eb8b44c76646bcaf0",
                    "topics": ["ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
                    "data": "00000000000000000000000000000000000000000000000000000000000003e8"
                }]
            }]),
        );
        mock
    }

    fn all_logs() -> SubscriptionKind {
        SubscriptionKind::Logs {
            addresses: vec![],
            topics: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_logs_sent_once_across_polls() {
        let mock = logs_node();
        let agent = agent(mock.clone());
        let (notifier, mut rx) = notifier(&agent);

        let id = notifier.subscribe(all_logs());
        tokio::time::sleep(Duration::from_secs(30)).await;

        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["method"], json!("eth_subscription"));
        assert_eq!(sent[0]["params"]["subscription"], json!(id));
        assert_eq!(sent[0]["params"]["result"]["address"], json!("0xdb46f738bf32cdafb9a4a70eb8b44c76646bcaf0"));
        assert_eq!(sent[0]["params"]["result"]["blockNumber"], json!("0xa"));

        // every poll re-read the same block, only the first one notified
        assert!(mock.calls_to("searchlogs").len() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logs_cursor_follows_next_block() {
        let mock = logs_node();
        let agent = agent(mock.clone());
        let (notifier, _rx) = notifier(&agent);

        notifier.subscribe(all_logs());
        tokio::time::sleep(Duration::from_secs(1)).await;

        let waits = mock.calls_to("waitforlogs");
        assert_eq!(waits[0], json!([null, null, {}, 0]));
        assert_eq!(waits[1], json!([11, null, {}, 0]));

        // the block before nextBlock is the one the node finished
        let searches = mock.calls_to("searchlogs");
        assert_eq!(searches[0], json!([10, 10, null, null]));
        assert!(searches.iter().all(|params| *params == searches[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_logs_polling_is_throttled() {
        let mock = logs_node();
        let agent = agent(mock.clone());
        let (notifier, _rx) = notifier(&agent);

        notifier.subscribe(all_logs());

        // five calls 100ms apart, then the window is full and backoff starts
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.calls_to("waitforlogs").len(), 5);

        // pauses of 1.5s, 3s and 4.5s
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(mock.calls_to("waitforlogs").len(), 8);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(mock.calls_to("waitforlogs").len(), 15);
        assert_eq!(mock.calls_to("searchlogs").len(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_polling() {
        let mock = logs_node();
        let agent = agent(mock.clone());
        let (notifier, _rx) = notifier(&agent);

        let id = notifier.subscribe(all_logs());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(notifier.subscription_count(), 1);

        assert!(notifier.unsubscribe(&id));
        assert!(!notifier.unsubscribe(&id));
        assert_eq!(notifier.subscription_count(), 0);

        let polled = mock.calls_to("waitforlogs").len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(mock.calls_to("waitforlogs").len(), polled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_connection_stops_polling() {
        let mock = logs_node();
        let agent = agent(mock.clone());
        let (notifier, rx) = notifier(&agent);

        notifier.subscribe(all_logs());
        drop(rx);
        tokio::time::sleep(Duration::from_secs(1)).await;

        // the first notification failed to send and closed the notifier
        assert!(notifier.is_closed());
        let polled = mock.calls_to("waitforlogs").len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(mock.calls_to("waitforlogs").len(), polled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_heads_render_through_block_by_hash() {
        let mock = Arc::new(MockTransport::new());
        let best = "bba11e1bacc69ba535d478cf1f2e542da3735a517b0b8eebaf7e6bb25eeb48c5";
        mock.push("getblockchaininfo", Ok(json!({"blocks": 3982, "bestblockhash": "aa"})));
        mock.respond("getblockchaininfo", json!({"blocks": 3983, "bestblockhash": best}));
        mock.respond(
            "getblockheader",
            json!({
                "hash": best,
                "height": 3983,
                "merkleroot": "0b5f03dc9d456c63c587cc554b70c1232449be43d1df62bc25a493b04de90334",
                "time": 1533092896,
                "nonce": 0,
                "hashStateRoot": "3e49216e58f1ad9e6823b5095dc532f0a6cc44943d36ff4a7b1aa474e172d672",
                "previousblockhash": "6d7d56af09383301e1bb32a97d4a5c0661d62302c06a778487d919b7115543be",
                "proposer": "7926223070547d2d15b2ef5e7383e541c338ffe9",
                "gasUsed": 1600
            }),
        );
        mock.respond("getblock", json!({"hash": best, "height": 3983, "size": 1037, "nonce": 0, "tx": []}));

        let agent = agent(mock.clone());
        let _transformer = crate::default_transformer(agent.client(), &agent).unwrap();
        let (notifier, mut rx) = notifier(&agent);

        let id = notifier.subscribe(SubscriptionKind::NewHeads);

        // first tick only records the tip
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(drain(&mut rx).is_empty());
        assert!(mock.calls_to("getblockheader").is_empty());

        tokio::time::sleep(Duration::from_secs(20)).await;
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["params"]["subscription"], json!(id));
        let head = &sent[0]["params"]["result"];
        assert_eq!(head["hash"], json!(format!("0x{}", best)));
        assert_eq!(head["number"], json!("0xf8f"));
        assert_eq!(head["parentHash"], json!("0x6d7d56af09383301e1bb32a97d4a5c0661d62302c06a778487d919b7115543be"));
        assert_eq!(mock.calls_to("getblockheader")[0][0], json!(best));
        assert_eq!(mock.calls_to("getblock")[0], json!([best, 1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_heads_need_a_transformer() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("getblockchaininfo", json!({"blocks": 1, "bestblockhash": "aa"}));
        let agent = agent(mock.clone());
        let (notifier, mut rx) = notifier(&agent);

        notifier.subscribe(SubscriptionKind::NewHeads);
        tokio::time::sleep(Duration::from_secs(35)).await;

        assert!(drain(&mut rx).is_empty());
        assert!(mock.calls_to("getblockchaininfo").is_empty());
    }

    #[test]
    fn test_backoff_is_linear_then_capped() {
        let max = Duration::from_secs(15);
        assert_eq!(backoff(0, Duration::ZERO, max), Duration::ZERO);
        assert_eq!(backoff(1, Duration::ZERO, max), Duration::from_millis(1500));
        assert_eq!(backoff(10, Duration::ZERO, max), max);
        assert_eq!(backoff(11, Duration::ZERO, max), max);
    }

    #[test]
    fn test_dedup_evicts_oldest() {
        let mut set = DedupSet::new(2);
        assert!(set.insert([1; 16]));
        assert!(!set.insert([1; 16]));
        assert!(set.insert([2; 16]));
        assert!(set.insert([3; 16]));
        assert_eq!(set.len(), 2);
        // evicted, so accepted again
        assert!(set.insert([1; 16]));
        assert!(!set.insert([3; 16]));
    }

    #[test]
    fn test_rolling_limit_needs_full_window() {
        let now = Instant::now();
        let mut rolling = RollingLimit::new(3);
        rolling.push(now);
        rolling.push(now + Duration::from_secs(1));
        assert_eq!(rolling.oldest(), None);
        rolling.push(now + Duration::from_secs(2));
        assert_eq!(rolling.oldest(), Some(now));
        rolling.push(now + Duration::from_secs(3));
        assert_eq!(rolling.oldest(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_subscription_kind_parsing() {
        let logs = SubscriptionKind::from_params(&[
            json!("logs"),
            json!({"address": "0xAB", "topics": [null, ["0x01", "0x02"]]}),
        ])
        .unwrap();
        assert_eq!(
            logs,
            SubscriptionKind::Logs {
                addresses: vec!["AB".into()],
                topics: vec![vec![], vec!["01".into(), "02".into()]],
            }
        );
        assert_eq!(SubscriptionKind::from_params(&[json!("newHeads")]).unwrap(), SubscriptionKind::NewHeads);
        assert!(SubscriptionKind::from_params(&[json!("syncing")]).is_err());
        assert!(SubscriptionKind::from_params(&[]).is_err());
    }

    #[test]
    fn test_subscription_ids_are_unique_hex() {
        let a = new_subscription_id();
        let b = new_subscription_id();
        assert_eq!(a.len(), 34);
        assert!(a.starts_with("0x"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_notification_shape() {
        let text = notification_text("0xabc", json!({"number": "0x1"})).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "method": "eth_subscription",
                "params": {"subscription": "0xabc", "result": {"number": "0x1"}}
            })
        );
    }
}
