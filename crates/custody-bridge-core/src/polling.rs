use std::time::Duration;

use alloy::primitives::B256;
use serde_json::Value;

use crate::bridge::{ChannelBridge, PendingExchange};
use crate::domain::AuthzStatus;
use crate::error::ProviderError;
use crate::ports::{ClockPort, PortError, ServicePort, SurfaceHost};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const TRANSACTION_CANCELED: &str = "Transaction Canceled";

/// Fixed-period ticker. Cancelling is one-shot; repeated cancels are no-ops.
pub struct Interval<'a, C: ClockPort + ?Sized> {
    clock: &'a C,
    period: Duration,
    cancelled: bool,
}

impl<'a, C: ClockPort + ?Sized> Interval<'a, C> {
    pub fn new(clock: &'a C, period: Duration) -> Self {
        Self {
            clock,
            period,
            cancelled: false,
        }
    }

    /// Waits one period. Returns `false` without waiting once cancelled.
    pub async fn tick(&self) -> bool {
        if self.cancelled {
            return false;
        }
        self.clock.sleep(self.period).await;
        true
    }

    pub fn cancel(&mut self) -> bool {
        !std::mem::replace(&mut self.cancelled, true)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Submits transactions to the custody service and waits for the user's
/// decision by polling the authorization status.
pub struct AuthorizationPoller<'a, S: ServicePort + ?Sized, C: ClockPort + ?Sized> {
    service: &'a S,
    clock: &'a C,
    period: Duration,
}

impl<'a, S: ServicePort + ?Sized, C: ClockPort + ?Sized> AuthorizationPoller<'a, S, C> {
    pub fn new(service: &'a S, clock: &'a C, period: Duration) -> Self {
        Self {
            service,
            clock,
            period,
        }
    }

    pub async fn submit<H: SurfaceHost + ?Sized>(
        &self,
        bridge: &ChannelBridge<'_, H>,
        chain: &str,
        code: &str,
        params: &Value,
    ) -> Result<String, ProviderError> {
        bridge.require_browser()?;
        let authorization_id = self
            .service
            .create_authorization(chain, code, params)
            .await?;
        tracing::info!(%authorization_id, chain, "transaction authorization created");
        let exchange = bridge.open_authorization(chain, &authorization_id)?;
        self.await_decision(chain, &authorization_id, exchange).await
    }

    /// Polls until a terminal status, then tears down the interval and the
    /// approval surface.
    pub async fn await_decision<H: SurfaceHost + ?Sized>(
        &self,
        chain: &str,
        authorization_id: &str,
        mut exchange: PendingExchange<'_, H>,
    ) -> Result<String, ProviderError> {
        let mut interval = Interval::new(self.clock, self.period);
        let mut polls: u64 = 0;
        let outcome: Result<String, ProviderError> = loop {
            if !interval.tick().await {
                break Err(PortError::Transport("authorization polling stopped".to_owned()).into());
            }
            polls += 1;
            let status = match self
                .service
                .authorization_status(chain, authorization_id)
                .await
            {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(%authorization_id, error = %e, "authorization status poll failed");
                    break Err(e.into());
                }
            };
            match status.status {
                AuthzStatus::Approved => break parse_tx_hash(status.transaction_hash.as_deref()),
                AuthzStatus::Declined => {
                    break Err(ProviderError::UserDeclined(TRANSACTION_CANCELED.to_owned()))
                }
                AuthzStatus::Pending | AuthzStatus::Unknown => {
                    tracing::trace!(%authorization_id, polls, "authorization still pending");
                }
            }
        };
        interval.cancel();
        exchange.close();
        tracing::info!(%authorization_id, polls, ok = outcome.is_ok(), "authorization settled");
        outcome
    }
}

fn parse_tx_hash(raw: Option<&str>) -> Result<String, ProviderError> {
    let raw = raw.ok_or_else(|| {
        PortError::Validation("approved authorization carried no transactionHash".to_owned())
    })?;
    let hash: B256 = raw
        .parse()
        .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingClock {
        sleeps: Cell<u32>,
    }

    #[async_trait(?Send)]
    impl ClockPort for CountingClock {
        async fn sleep(&self, _duration: Duration) {
            self.sleeps.set(self.sleeps.get() + 1);
        }
    }

    #[tokio::test]
    async fn cancelled_interval_stops_ticking() {
        let clock = CountingClock::default();
        let mut interval = Interval::new(&clock, DEFAULT_POLL_INTERVAL);
        assert!(interval.tick().await);
        assert!(interval.cancel());
        assert!(!interval.cancel());
        assert!(interval.is_cancelled());
        assert!(!interval.tick().await);
        assert_eq!(clock.sleeps.get(), 1);
    }

    #[test]
    fn tx_hash_is_validated_and_normalized() {
        let hash = parse_tx_hash(Some(
            "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        ))
        .expect("valid hash");
        assert_eq!(
            hash,
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
        assert!(parse_tx_hash(Some("0x1234")).is_err());
        assert!(parse_tx_hash(None).is_err());
    }
}
