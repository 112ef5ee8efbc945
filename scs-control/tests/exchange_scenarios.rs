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

use integration_test_utils::{
    DeviceScript, ReceiptFault, RecordingListener, ScriptedDevice, CONTROL_TOPIC, DEVICE_TAG,
    HOST_TAG,
};
use scs_control::{ControlError, ExchangeState, MemoryBus, MessageBus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use support::{close_to_strings, connect, secret, session_config, tokens};
use tokio::time::Instant;

async fn device(bus: &Arc<MemoryBus>, script: DeviceScript) -> Arc<ScriptedDevice> {
    ScriptedDevice::attach(bus.clone(), CONTROL_TOPIC, secret(), script).await
}

#[tokio::test(start_paused = true)]
async fn matching_receipt_within_deadline_is_rendered() {
    let bus = Arc::new(MemoryBus::new());
    let device = device(&bus, DeviceScript::delayed(Duration::from_millis(500))).await;
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(2))).await;
    let started = Instant::now();

    let receipt = session
        .run_once(tokens("uptime"))
        .await
        .expect("exchange should succeed")
        .expect("receipt expected");

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(receipt.tag(), HOST_TAG);
    let sent = device.received().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].attn(), DEVICE_TAG);
    assert_eq!(receipt.omd(), sent[0].digest());

    let (out, err) = close_to_strings(session).await;
    assert_eq!(out, "uptime: ok\n");
    assert!(err.is_empty());
}

#[tokio::test(start_paused = true)]
async fn largest_accepted_wait_still_renders_receipt() {
    let bus = Arc::new(MemoryBus::new());
    device(&bus, DeviceScript::delayed(Duration::from_secs(30))).await;
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(u64::MAX))).await;

    let receipt = session
        .run_once(tokens("uptime"))
        .await
        .expect("exchange should succeed");

    assert!(receipt.is_some());
    let (out, _) = close_to_strings(session).await;
    assert_eq!(out, "uptime: ok\n");
}

#[tokio::test(start_paused = true)]
async fn receipt_with_wrong_omd_is_ignored_until_timeout() {
    let bus = Arc::new(MemoryBus::new());
    device(&bus, DeviceScript::with_fault(ReceiptFault::WrongOmd)).await;
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(2))).await;

    let result = session.run_once(tokens("uptime")).await;

    assert!(matches!(result, Err(ControlError::Timeout(t)) if t == Duration::from_secs(2)));
    assert_eq!(session.correlator().state().await, ExchangeState::Sent);
    let (out, _) = close_to_strings(session).await;
    assert!(out.is_empty());
}

#[tokio::test(start_paused = true)]
async fn receipt_with_wrong_tag_is_ignored_until_timeout() {
    let bus = Arc::new(MemoryBus::new());
    device(&bus, DeviceScript::with_fault(ReceiptFault::WrongTag)).await;
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(1))).await;

    let result = session.run_once(tokens("uptime")).await;

    assert!(matches!(result, Err(ControlError::Timeout(_))));
}

#[tokio::test(start_paused = true)]
async fn receipt_signed_with_wrong_secret_fails_authentication() {
    let bus = Arc::new(MemoryBus::new());
    device(&bus, DeviceScript::with_fault(ReceiptFault::WrongSecret)).await;
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(2))).await;

    let error = session
        .run_once(tokens("uptime"))
        .await
        .expect_err("exchange should fail");

    assert!(matches!(error, ControlError::Authentication { ref tag, .. } if tag == HOST_TAG));
    assert!(!error.is_recoverable());
    let (out, _) = close_to_strings(session).await;
    assert!(out.is_empty());
}

#[tokio::test(start_paused = true)]
async fn wait_times_out_within_deadline_window() {
    let bus = Arc::new(MemoryBus::new());
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(3))).await;
    let started = Instant::now();

    let result = session.run_once(tokens("uptime")).await;

    let elapsed = started.elapsed();
    assert!(matches!(result, Err(ControlError::Timeout(_))));
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_millis(3100));
}

#[tokio::test(start_paused = true)]
async fn duplicated_receipts_render_once() {
    let bus = Arc::new(MemoryBus::new());
    let script = DeviceScript {
        copies: 3,
        ..DeviceScript::default()
    };
    device(&bus, script).await;
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(2))).await;

    session
        .run_once(tokens("df -h"))
        .await
        .expect("exchange should succeed");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (out, _) = close_to_strings(session).await;
    assert_eq!(out, "df -h: ok\n");
}

#[tokio::test(start_paused = true)]
async fn one_shot_without_wait_only_publishes() {
    let bus = Arc::new(MemoryBus::new());
    let recorder = RecordingListener::new();
    bus.subscribe(CONTROL_TOPIC, Arc::new(recorder.clone()))
        .await
        .expect("subscribe should succeed");
    let mut config = session_config(Duration::from_secs(2));
    config.wait_for_receipt = false;
    let mut session = connect(bus.clone(), config).await;
    let started = Instant::now();

    let result = session
        .run_once(tokens("reboot"))
        .await
        .expect("publish should succeed");
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(result.is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
    let datums = recorder.datums().await;
    assert_eq!(datums.len(), 1);
    assert_eq!(datums[0].cmd(), &["reboot".to_string()]);
    assert!(datums[0].is_valid(&secret()));
}

#[tokio::test(start_paused = true)]
async fn late_receipt_for_first_interactive_command_does_not_answer_the_second() {
    let bus = Arc::new(MemoryBus::new());
    let script = DeviceScript {
        delays: HashMap::from([("uptime".to_string(), Duration::from_millis(1500))]),
        silent: vec!["df".to_string()],
        ..DeviceScript::default()
    };
    let device = device(&bus, script).await;
    let mut config = session_config(Duration::from_secs(1));
    config.wait_for_receipt = false;
    let mut session = connect(bus.clone(), config).await;

    session
        .run_interactive(&b"uptime\ndf\n"[..])
        .await
        .expect("interactive loop should end at end of input");

    assert_eq!(device.received().await.len(), 2);
    assert_eq!(session.correlator().poll().await, None);
    let (out, err) = close_to_strings(session).await;
    assert!(out.is_empty());
    assert_eq!(err.matches("no receipt within").count(), 2);
}

#[tokio::test(start_paused = true)]
async fn interactive_session_stops_on_authentication_failure() {
    let bus = Arc::new(MemoryBus::new());
    let device = device(&bus, DeviceScript::with_fault(ReceiptFault::WrongSecret)).await;
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(1))).await;

    let result = session.run_interactive(&b"uptime\ndf\n"[..]).await;

    assert!(matches!(result, Err(ControlError::Authentication { .. })));
    assert_eq!(device.received().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn interactive_session_answers_each_line_in_turn() {
    let bus = Arc::new(MemoryBus::new());
    device(&bus, DeviceScript::delayed(Duration::from_millis(200))).await;
    let mut session = connect(bus.clone(), session_config(Duration::from_secs(1))).await;

    session
        .run_interactive(&b"uptime\n\nls  -l\n"[..])
        .await
        .expect("interactive loop should end at end of input");

    let (out, err) = close_to_strings(session).await;
    assert_eq!(out, "uptime: ok\n: ok\nls -l: ok\n");
    assert_eq!(err, "> > > > \n");
}
