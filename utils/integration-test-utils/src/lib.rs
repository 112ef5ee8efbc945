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

mod failing_publish_bus;
pub use failing_publish_bus::FailingPublishBus;

mod recording_listener;
pub use recording_listener::RecordingListener;

mod scripted_device;
pub use scripted_device::{DeviceScript, ReceiptFault, ScriptedDevice};

pub const CONTROL_TOPIC: &str = "south-coast-science-dev/cube/device/control";
pub const HOST_TAG: &str = "scs-bgx-401";
pub const DEVICE_TAG: &str = "scs-be2-3";
pub const DEVICE_SECRET: &str = "S1";
