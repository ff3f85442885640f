// rpc/src/analytics.rs

use async_trait::async_trait;
use kaon_client::{KaonError, KaonResult, Transport};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Requests remembered per success-rate window
pub const DEFAULT_WINDOW: usize = 50;

/// Success rate over the most recent requests
#[derive(Debug)]
pub struct Analytics {
    capacity: usize,
    outcomes: Mutex<VecDeque<bool>>,
}

impl Analytics {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            outcomes: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<bool>> {
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, success: bool) {
        let mut outcomes = self.lock();
        if outcomes.len() == self.capacity {
            outcomes.pop_front();
        }
        outcomes.push_back(success);
    }

    pub fn success(&self) {
        self.record(true);
    }

    pub fn failure(&self) {
        self.record(false);
    }

    /// 1.0 until anything was recorded
    pub fn success_rate(&self) -> f32 {
        let outcomes = self.lock();
        if outcomes.is_empty() {
            return 1.0;
        }
        let successes = outcomes.iter().filter(|ok| **ok).count();
        successes as f32 / outcomes.len() as f32
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// Counts node calls into an `Analytics` window. Any answer from the node,
/// error answers included, counts as a success; only failures to reach it
/// count against the rate.
pub struct RecordingTransport {
    inner: Arc<dyn Transport>,
    analytics: Arc<Analytics>,
}

impl RecordingTransport {
    pub fn new(inner: Arc<dyn Transport>, analytics: Arc<Analytics>) -> Self {
        Self { inner, analytics }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn call(&self, method: &str, params: Value) -> KaonResult<Value> {
        let result = self.inner.call(method, params).await;
        match &result {
            Err(KaonError::Http { .. }) | Err(KaonError::Transport(_)) => self.analytics.failure(),
            _ => self.analytics.success(),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaon_client::transport::mock::MockTransport;
    use serde_json::json;

    #[test]
    fn test_window_drops_oldest() {
        let analytics = Analytics::new(4);
        assert_eq!(analytics.success_rate(), 1.0);

        analytics.failure();
        analytics.failure();
        analytics.success();
        analytics.success();
        assert_eq!(analytics.success_rate(), 0.5);

        analytics.success();
        analytics.success();
        assert_eq!(analytics.len(), 4);
        assert_eq!(analytics.success_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_recording_transport() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("getblockcount", json!(1));
        mock.fail("getnetworkinfo", KaonError::Transport("connection refused".into()));
        mock.fail("getaccountinfo", KaonError::InvalidAddress("Address does not exist".into()));

        let analytics = Arc::new(Analytics::new(10));
        let transport = RecordingTransport::new(mock, analytics.clone());
        transport.call("getblockcount", json!([])).await.unwrap();
        transport.call("getaccountinfo", json!(["00"])).await.unwrap_err();
        transport.call("getnetworkinfo", json!([])).await.unwrap_err();

        assert_eq!(analytics.len(), 3);
        assert!((analytics.success_rate() - 2.0 / 3.0).abs() < f32::EPSILON);
    }
}
