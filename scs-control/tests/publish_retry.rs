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

mod support;

use integration_test_utils::{DeviceScript, FailingPublishBus, ScriptedDevice, CONTROL_TOPIC};
use scs_control::{BusError, ControlError, ControlSession, MemoryBus, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use support::{close_to_strings, connect, secret, session_config, tokens};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn transient_publish_failures_are_retried_with_backoff() {
    let memory = Arc::new(MemoryBus::new());
    ScriptedDevice::attach(memory.clone(), CONTROL_TOPIC, secret(), DeviceScript::default()).await;
    let bus = Arc::new(FailingPublishBus::new(memory, 2));
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(2))).await;
    let started = Instant::now();

    session
        .run_once(tokens("uptime"))
        .await
        .expect("third publish should get through");

    assert_eq!(bus.publish_calls(), 3);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() <= Duration::from_secs(4));
    let (out, _) = close_to_strings(session).await;
    assert_eq!(out, "uptime: ok\n");
}

#[tokio::test(start_paused = true)]
async fn publish_retries_are_bounded() {
    let bus = Arc::new(FailingPublishBus::always_failing(Arc::new(MemoryBus::new())));
    let mut config = session_config(Duration::from_secs(2));
    config.retry = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(2));
    let mut session = connect(bus.clone(), config).await;

    let error = session
        .run_once(tokens("uptime"))
        .await
        .expect_err("publish should be abandoned");

    assert!(matches!(
        error,
        ControlError::Publish {
            attempts: 3,
            source: BusError::Publish(_)
        }
    ));
    assert!(error.is_recoverable());
    assert_eq!(bus.publish_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn interactive_session_continues_after_exhausted_publish() {
    let memory = Arc::new(MemoryBus::new());
    ScriptedDevice::attach(memory.clone(), CONTROL_TOPIC, secret(), DeviceScript::default()).await;
    let bus = Arc::new(FailingPublishBus::new(memory, 2));
    let mut config = session_config(Duration::from_secs(1));
    config.retry = RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(20));
    let mut session = connect(bus.clone(), config).await;

    session
        .run_interactive(&b"uptime\ndf\n"[..])
        .await
        .expect("interactive loop should end at end of input");

    let (out, err) = close_to_strings(session).await;
    assert_eq!(out, "df: ok\n");
    assert!(err.contains("publish failed after 2 attempt(s)"));
}

#[tokio::test]
async fn subscribe_failure_is_reported_at_connect() {
    let bus = Arc::new(FailingPublishBus::failing_subscribe(Arc::new(MemoryBus::new())));

    let result = ControlSession::connect(
        bus,
        session_config(Duration::from_secs(1)),
        Vec::new(),
        Vec::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(ControlError::Subscribe(BusError::Subscribe(_)))
    ));
}
