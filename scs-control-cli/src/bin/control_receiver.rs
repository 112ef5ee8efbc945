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

mod common;

use anyhow::{Context, Result};
use clap::Parser;
use common::cli::{DeviceTargetArgs, EndpointArgs};
use scs_control::{ControlResponder, ProcessExecutor};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

const PROGRAM: &str = "control_receiver";

#[derive(Debug, Parser)]
#[command(name = PROGRAM)]
#[command(about = "Execute authenticated control requests addressed to this device")]
struct Cli {
    #[command(flatten)]
    endpoint: EndpointArgs,

    #[command(flatten)]
    target: DeviceTargetArgs,

    /// Log every request at debug level
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    common::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => common::report_failure(PROGRAM, &error),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let endpoint = cli.endpoint.load()?;
    let target = cli.target.resolve(&endpoint)?;

    let bus = common::open_bus(&endpoint.transport).await?;
    let responder = Arc::new(ControlResponder::new(
        target.device_tag,
        target.topic,
        target.secret,
        bus.clone(),
        Arc::new(ProcessExecutor),
    ));
    bus.subscribe(responder.topic(), responder.clone())
        .await
        .with_context(|| format!("unable to subscribe to {}", responder.topic()))?;

    info!(
        component = PROGRAM,
        device_tag = responder.device_tag(),
        topic = responder.topic(),
        "answering control requests"
    );

    tokio::signal::ctrl_c()
        .await
        .context("unable to listen for interrupt")?;

    if let Err(err) = bus.disconnect().await {
        warn!(component = PROGRAM, err = %err, "bus disconnect failed");
    }
    Ok(())
}
