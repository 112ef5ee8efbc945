/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Bounded publish retry with randomized backoff.

use crate::bus::MessageBus;
use crate::error::{BusError, ControlError};
use crate::observability::events;
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

const COMPONENT: &str = "publish_retry";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total publish attempts, the first one included. Zero is treated as one.
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            min_backoff,
            max_backoff,
        }
    }

    /// Uniformly distributed pause between `min_backoff` and `max_backoff`.
    pub fn backoff(&self) -> Duration {
        let low = self.min_backoff.min(self.max_backoff).as_millis() as u64;
        let high = self.min_backoff.max(self.max_backoff).as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Publishes `payload`, retrying failed attempts until the policy is exhausted.
///
/// A closed bus is not retried. Returns the number of attempts used.
pub(crate) async fn publish_with_retry(
    bus: &dyn MessageBus,
    topic: &str,
    payload: &Value,
    policy: &RetryPolicy,
) -> Result<u32, ControlError> {
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        debug!(
            event = events::PUBLISH_ATTEMPT,
            component = COMPONENT,
            topic,
            attempt,
            "publishing"
        );

        let err = match bus.publish(topic, payload).await {
            Ok(()) => {
                debug!(
                    event = events::PUBLISH_OK,
                    component = COMPONENT,
                    topic,
                    attempt,
                    "published"
                );
                return Ok(attempt);
            }
            Err(err) => err,
        };

        warn!(
            event = events::PUBLISH_FAILED,
            component = COMPONENT,
            topic,
            attempt,
            err = %err,
            "publish failed"
        );

        if attempt >= max_attempts || matches!(err, BusError::Closed) {
            error!(
                event = events::PUBLISH_RETRIES_EXHAUSTED,
                component = COMPONENT,
                topic,
                attempt,
                "giving up on publish"
            );
            return Err(ControlError::Publish {
                attempts: attempt,
                source: err,
            });
        }

        let backoff = policy.backoff();
        debug!(
            event = events::PUBLISH_RETRY_SCHEDULED,
            component = COMPONENT,
            topic,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            "retrying publish after backoff"
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{publish_with_retry, RetryPolicy};
    use crate::bus::{MessageBus, MessageListener};
    use crate::error::{BusError, ControlError};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FailingBus {
        failures_left: AtomicU32,
        calls: AtomicU32,
        closed: bool,
    }

    impl FailingBus {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(times),
                calls: AtomicU32::new(0),
                closed: false,
            }
        }
    }

    #[async_trait]
    impl MessageBus for FailingBus {
        async fn publish(&self, _topic: &str, _payload: &Value) -> Result<(), BusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.closed {
                return Err(BusError::Closed);
            }
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(BusError::Publish("broker unavailable".to_string()));
            }
            Ok(())
        }

        async fn subscribe(
            &self,
            _topic: &str,
            _listener: Arc<dyn MessageListener>,
        ) -> Result<(), BusError> {
            Ok(())
        }
    }

    #[test]
    fn backoff_stays_within_bounds() {
        let policy = RetryPolicy::default();

        for _ in 0..100 {
            let backoff = policy.backoff();
            assert!(backoff >= Duration::from_secs(1));
            assert!(backoff <= Duration::from_secs(2));
        }
    }

    #[test]
    fn inverted_bounds_are_normalised() {
        let policy = RetryPolicy::new(3, Duration::from_millis(20), Duration::from_millis(10));

        let backoff = policy.backoff();

        assert!(backoff >= Duration::from_millis(10));
        assert!(backoff <= Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let bus = FailingBus::failing(2);
        let started = tokio::time::Instant::now();

        let attempts = publish_with_retry(&bus, "control", &json!({}), &RetryPolicy::default())
            .await
            .expect("third attempt should succeed");

        assert_eq!(attempts, 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() <= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let bus = FailingBus::failing(u32::MAX);
        let policy = RetryPolicy::new(4, Duration::from_secs(1), Duration::from_secs(2));

        let result = publish_with_retry(&bus, "control", &json!({}), &policy).await;

        assert!(matches!(
            result,
            Err(ControlError::Publish { attempts: 4, .. })
        ));
        assert_eq!(bus.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_bus_is_not_retried() {
        let bus = FailingBus {
            closed: true,
            ..FailingBus::failing(0)
        };

        let result =
            publish_with_retry(&bus, "control", &json!({}), &RetryPolicy::default()).await;

        assert!(matches!(
            result,
            Err(ControlError::Publish {
                attempts: 1,
                source: BusError::Closed
            })
        ));
        assert_eq!(bus.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let bus = FailingBus::failing(0);
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);

        let attempts = publish_with_retry(&bus, "control", &json!({}), &policy)
            .await
            .expect("publish should succeed");

        assert_eq!(attempts, 1);
    }
}
