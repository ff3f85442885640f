// kaon-client/src/chain.rs

use crate::error::{KaonError, KaonResult};
use crate::transport::Transport;
use crate::types::BlockchainInfo;
use kaon_crypto::AddressPrefix;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub const CHAIN_ID_MAIN: u64 = 0x2ED3;
pub const CHAIN_ID_TEST: u64 = 0x2ED5;
pub const CHAIN_ID_REGTEST: u64 = 0x2ED4;
pub const CHAIN_ID_DEFAULT: u64 = 0x22ba;

/// Upper bound on the backoff multiplier of the detection loop
const MAX_BACKOFF_STEPS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chain {
    Main,
    Test,
    RegTest,
    Other(String),
}

impl Chain {
    /// Case-insensitive, anything unrecognised is kept verbatim
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "main" => Chain::Main,
            "test" => Chain::Test,
            "regtest" => Chain::RegTest,
            other => Chain::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Chain::Main => "main",
            Chain::Test => "test",
            Chain::RegTest => "regtest",
            Chain::Other(name) => name,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Main => CHAIN_ID_MAIN,
            Chain::Test => CHAIN_ID_TEST,
            Chain::RegTest => CHAIN_ID_REGTEST,
            Chain::Other(_) => CHAIN_ID_DEFAULT,
        }
    }

    /// Base58 version byte, regtest shares the testnet one
    pub fn address_prefix(&self) -> KaonResult<AddressPrefix> {
        match self {
            Chain::Main => Ok(AddressPrefix::Main),
            Chain::Test | Chain::RegTest => Ok(AddressPrefix::Test),
            Chain::Other(name) => Err(KaonError::UnsupportedChain(name.clone())),
        }
    }

    pub fn can_generate(&self) -> bool {
        matches!(self, Chain::RegTest)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain setting from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSetting {
    Auto,
    Fixed(Chain),
}

impl NetworkSetting {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("auto") || value.is_empty() {
            NetworkSetting::Auto
        } else {
            NetworkSetting::Fixed(Chain::from_name(value))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionState {
    Unknown,
    Detecting,
    Detected(Chain),
}

/// Resolves which chain the node runs.
///
/// With a fixed setting the state starts as `Detected`. With `auto` the
/// first caller moves `Unknown -> Detecting` and spawns the only detection
/// loop; everyone waits on the watch channel until `Detected`.
#[derive(Clone)]
pub struct ChainDetector {
    state: Arc<watch::Sender<DetectionState>>,
    transport: Arc<dyn Transport>,
    shutdown: CancellationToken,
    interval: Duration,
}

impl ChainDetector {
    pub fn new(
        setting: NetworkSetting,
        transport: Arc<dyn Transport>,
        shutdown: CancellationToken,
        interval: Duration,
    ) -> Self {
        let initial = match setting {
            NetworkSetting::Auto => DetectionState::Unknown,
            NetworkSetting::Fixed(chain) => DetectionState::Detected(chain),
        };
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
            transport,
            shutdown,
            interval,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state.borrow().clone()
    }

    /// Start the detection loop unless one is running or already finished
    pub fn ensure_started(&self) {
        let start = self.state.send_if_modified(|state| {
            if *state == DetectionState::Unknown {
                *state = DetectionState::Detecting;
                true
            } else {
                false
            }
        });

        if start {
            let detector = self.clone();
            tokio::spawn(async move { detector.detect_loop().await });
        }
    }

    /// The detected chain, waiting for detection if needed.
    /// Dropping the future abandons the wait, not the detection.
    pub async fn chain(&self) -> KaonResult<Chain> {
        self.ensure_started();
        let mut rx = self.state.subscribe();

        loop {
            let detected = match &*rx.borrow_and_update() {
                DetectionState::Detected(chain) => Some(chain.clone()),
                _ => None,
            };
            if let Some(chain) = detected {
                return Ok(chain);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(KaonError::Shutdown),
                changed = rx.changed() => changed.map_err(|_| KaonError::Shutdown)?,
            }
        }
    }

    async fn detect_loop(self) {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let outcome = self
                .transport
                .call("getblockchaininfo", json!([]))
                .await
                .and_then(|raw| {
                    serde_json::from_value::<BlockchainInfo>(raw)
                        .map_err(|e| KaonError::decode("getblockchaininfo", e))
                });

            match outcome {
                Ok(info) => {
                    let chain = Chain::from_name(&info.chain);
                    tracing::info!(chain = %chain, attempts = attempt, "Detected kaond chain");
                    self.state.send_replace(DetectionState::Detected(chain));
                    return;
                }
                Err(err) => {
                    let delay = self.interval * attempt.min(MAX_BACKOFF_STEPS);
                    tracing::warn!(error = %err, attempt, ?delay, "Chain detection failed, retrying");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            self.state.send_replace(DetectionState::Unknown);
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_chain_ids() {
        assert_eq!(Chain::from_name("main").chain_id(), 0x2ED3);
        assert_eq!(Chain::from_name("test").chain_id(), 0x2ED5);
        assert_eq!(Chain::from_name("regtest").chain_id(), 0x2ED4);
        assert_eq!(Chain::from_name("signet").chain_id(), 0x22ba);
        assert_eq!(Chain::from_name("RegTest"), Chain::RegTest);
    }

    #[test]
    fn test_network_setting() {
        assert_eq!(NetworkSetting::parse("auto"), NetworkSetting::Auto);
        assert_eq!(NetworkSetting::parse("Main"), NetworkSetting::Fixed(Chain::Main));
    }

    #[tokio::test]
    async fn test_fixed_chain_skips_detection() {
        let mock = Arc::new(MockTransport::new());
        let detector = ChainDetector::new(
            NetworkSetting::Fixed(Chain::Test),
            mock.clone(),
            CancellationToken::new(),
            Duration::from_millis(1),
        );
        assert_eq!(detector.chain().await.unwrap(), Chain::Test);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_detection_retries_until_success() {
        let mock = Arc::new(MockTransport::new());
        mock.push("getblockchaininfo", Err(KaonError::Transport("down".into())));
        mock.push("getblockchaininfo", Err(KaonError::Transport("down".into())));
        mock.respond("getblockchaininfo", json!({"chain": "REGTEST", "blocks": 1, "bestblockhash": "00"}));

        let detector = ChainDetector::new(
            NetworkSetting::Auto,
            mock.clone(),
            CancellationToken::new(),
            Duration::from_millis(1),
        );

        let (a, b) = tokio::join!(detector.chain(), detector.chain());
        assert_eq!(a.unwrap(), Chain::RegTest);
        assert_eq!(b.unwrap(), Chain::RegTest);
        assert_eq!(mock.calls_to("getblockchaininfo").len(), 3);
        assert_eq!(detector.state(), DetectionState::Detected(Chain::RegTest));
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting() {
        let mock = Arc::new(MockTransport::new());
        mock.fail("getblockchaininfo", KaonError::Transport("down".into()));
        let shutdown = CancellationToken::new();
        let detector = ChainDetector::new(
            NetworkSetting::Auto,
            mock,
            shutdown.clone(),
            Duration::from_millis(5),
        );

        let waiter = tokio::spawn({
            let detector = detector.clone();
            async move { detector.chain().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        assert!(matches!(waiter.await.unwrap(), Err(KaonError::Shutdown)));
    }
}
