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

pub(crate) mod cli;

use anyhow::Context;
use scs_control::{LineBus, MessageBus, TransportConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;

/// Exit code for setup and resource failures. Usage errors exit with clap's 2.
pub(crate) const EXIT_FAILURE: u8 = 1;

/// Logs go to stderr; stdout carries remote command output only.
pub(crate) fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .try_init();
}

pub(crate) async fn open_bus(transport: &TransportConfig) -> anyhow::Result<Arc<dyn MessageBus>> {
    let bus = LineBus::open(transport)
        .await
        .with_context(|| format!("unable to open broker transport {transport:?}"))?;
    Ok(Arc::new(bus))
}

pub(crate) fn report_failure(program: &str, error: &anyhow::Error) -> ExitCode {
    eprintln!("{program}: {error:#}");
    ExitCode::from(EXIT_FAILURE)
}
