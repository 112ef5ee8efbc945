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

use super::{ControlSession, COMPONENT};
use crate::error::ControlError;
use crate::observability::events;
use async_trait::async_trait;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const PROMPT: &str = "> ";

/// Splits an operator line into command tokens on whitespace.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Where operator command lines come from.
///
/// Waiting for the next line must be cancel safe: dropping the future between
/// lines loses nothing and leaves no read behind.
#[async_trait]
pub trait LineSource: Send {
    /// The next line without its terminator, or `None` once input has ended.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

#[async_trait]
impl<R> LineSource for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Lines::next_line(self).await
    }
}

/// Lines forwarded from a reader on another thread; a closed channel ends input.
#[async_trait]
impl LineSource for mpsc::Receiver<io::Result<String>> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.recv().await.transpose()
    }
}

/// Reads `reader` line by line on a dedicated thread and forwards each line.
///
/// A blocked read stays on that thread, so the receiving side can give up at
/// any time and the process can still exit. The channel closes after end of
/// input or the first read error.
pub fn forward_lines<R>(reader: R) -> mpsc::Receiver<io::Result<String>>
where
    R: io::BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in reader.lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

impl<O: Write, E: Write> ControlSession<O, E> {
    /// Reads command lines from `input` until it ends, running one exchange per line.
    ///
    /// Timeouts and exhausted publishes are reported on the error writer and the
    /// loop carries on; any other error ends it.
    pub async fn run_interactive<R>(&mut self, input: R) -> Result<(), ControlError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        self.run_interactive_from(input.lines()).await
    }

    /// [`run_interactive`](Self::run_interactive) over any [`LineSource`].
    pub async fn run_interactive_from<S>(&mut self, mut lines: S) -> Result<(), ControlError>
    where
        S: LineSource,
    {
        loop {
            write!(self.err, "{PROMPT}")?;
            self.err.flush()?;

            let Some(line) = lines.next_line().await? else {
                writeln!(self.err)?;
                info!(
                    event = events::SESSION_INPUT_CLOSED,
                    component = COMPONENT,
                    "end of operator input"
                );
                return Ok(());
            };

            match self.exchange(tokenize(&line), true).await {
                Ok(_) => {}
                Err(err) if err.is_recoverable() => {
                    debug!(
                        event = events::SESSION_EXCHANGE_REPORTED,
                        component = COMPONENT,
                        err = %err,
                        "exchange failed; awaiting next command"
                    );
                    writeln!(self.err, "{err}")?;
                    self.err.flush()?;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
