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

use anyhow::Result;
use clap::Parser;
use common::cli::{EndpointArgs, HostTargetArgs, DEFAULT_WAIT_SECS};
use scs_control::{forward_lines, ControlSession, SessionConfig};
use std::io::{self, Stderr, Stdout};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

const PROGRAM: &str = "mqtt_control";

#[derive(Debug, Parser)]
#[command(name = PROGRAM)]
#[command(about = "Run a command on a remote device and print its authenticated reply")]
struct Cli {
    #[command(flatten)]
    endpoint: EndpointArgs,

    #[command(flatten)]
    target: HostTargetArgs,

    /// Wait for the device's receipt in one-shot mode
    #[arg(short = 'r', long = "receipt")]
    receipt: bool,

    /// Read command lines from stdin until end of input
    #[arg(short = 'i', long = "interactive", conflicts_with = "cmd")]
    interactive: bool,

    /// Seconds to wait for each receipt
    #[arg(short = 'w', long = "wait", value_name = "SECS", default_value_t = DEFAULT_WAIT_SECS)]
    wait: u64,

    /// Echo requests and receipts to stderr and log at debug level
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Command and arguments to run on the device
    #[arg(
        value_name = "CMD",
        required_unless_present = "interactive",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    cmd: Vec<String>,
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
    // Configuration is resolved before the broker is touched.
    let endpoint = cli.endpoint.load()?;
    let target = cli.target.resolve()?;

    let mut config = SessionConfig::new(endpoint.client_tag.clone(), target);
    config.timeout = Duration::from_secs(cli.wait);
    config.wait_for_receipt = cli.receipt;
    config.verbose = cli.verbose;

    let bus = common::open_bus(&endpoint.transport).await?;
    let mut session = ControlSession::connect(bus, config, io::stdout(), io::stderr()).await?;

    let outcome = tokio::select! {
        outcome = drive(&mut session, cli.interactive, cli.cmd) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!(component = PROGRAM, "interrupted by operator");
            if cli.interactive {
                Ok(())
            } else {
                Err(anyhow::anyhow!("interrupted before the exchange completed"))
            }
        }
    };

    session.close().await;
    outcome
}

async fn drive(
    session: &mut ControlSession<Stdout, Stderr>,
    interactive: bool,
    cmd: Vec<String>,
) -> Result<()> {
    if interactive {
        // Stdin is read on its own thread so an interrupt can end the session
        // while a read is still blocked.
        session
            .run_interactive_from(forward_lines(io::BufReader::new(io::stdin())))
            .await?;
    } else {
        session.run_once(cmd).await?;
    }
    Ok(())
}
