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

use async_trait::async_trait;
use scs_control::{BusError, MessageBus, MessageListener};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Wraps a bus and fails a configurable number of publishes, or every subscribe.
pub struct FailingPublishBus {
    inner: Arc<dyn MessageBus>,
    failures_left: AtomicU32,
    publish_calls: AtomicU32,
    fail_subscribe: AtomicBool,
}

impl FailingPublishBus {
    /// Fails the first `failures` publishes, then forwards to `inner`.
    pub fn new(inner: Arc<dyn MessageBus>, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
            publish_calls: AtomicU32::new(0),
            fail_subscribe: AtomicBool::new(false),
        }
    }

    pub fn always_failing(inner: Arc<dyn MessageBus>) -> Self {
        Self::new(inner, u32::MAX)
    }

    pub fn failing_subscribe(inner: Arc<dyn MessageBus>) -> Self {
        let bus = Self::new(inner, 0);
        bus.fail_subscribe.store(true, Ordering::SeqCst);
        bus
    }

    pub fn publish_calls(&self) -> u32 {
        self.publish_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageBus for FailingPublishBus {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), BusError> {
        let call = self.publish_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            debug!("failing publish #{call} on {topic}");
            return Err(BusError::Publish(format!("injected failure #{call}")));
        }

        self.inner.publish(topic, payload).await
    }

    async fn subscribe(
        &self,
        topic: &str,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), BusError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            debug!("failing subscribe on {topic}");
            return Err(BusError::Subscribe("Failing to register listener".to_string()));
        }
        self.inner.subscribe(topic, listener).await
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        self.inner.disconnect().await
    }
}
