//! Bridge service core logic.
//!
//! Runs one [`Session`] against an in-memory store and exposes the store
//! on a line console:
//!
//! ```text
//! volume=20        request a change (unacknowledged write)
//! remote.mute=true press a remote key
//! power?           print the current value
//! keys             list every key with a value
//! ```
//!
//! Acknowledged changes, i.e. state reported by the TV, are logged.

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use lgtv_core::{MemoryStore, Session, StateStore, StateValue};

use crate::config::BridgeConfig;

// ── Console ──────────────────────────────────────────────────────

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Set { key: String, value: StateValue },
    Get(String),
    List,
}

impl ConsoleCommand {
    /// Parse a console line; blank or malformed lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line == "keys" {
            return Some(Self::List);
        }
        if let Some(key) = line.strip_suffix('?') {
            let key = key.trim();
            return (!key.is_empty()).then(|| Self::Get(key.to_string()));
        }
        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::Set {
            key: key.to_string(),
            value: StateValue::parse(value),
        })
    }
}

/// Serve console lines from `input` until EOF, writing answers to `output`.
pub async fn run_console<R, W>(
    store: Arc<MemoryStore>,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let reply = match ConsoleCommand::parse(&line) {
            Some(ConsoleCommand::Set { key, value }) => {
                debug!(%key, %value, "console write");
                store.set(&key, value, false).await;
                continue;
            }
            Some(ConsoleCommand::Get(key)) => match store.get(&key).await {
                Some(value) => format!("{key} = {value}\n"),
                None => format!("{key} is not set\n"),
            },
            Some(ConsoleCommand::List) => {
                let mut text = String::new();
                for key in store.keys() {
                    if let Some(value) = store.get(&key).await {
                        text.push_str(&format!("{key} = {value}\n"));
                    }
                }
                text
            }
            None if line.trim().is_empty() => continue,
            None => "expected key=value, key? or keys\n".to_string(),
        };
        output.write_all(reply.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(())
}

// ── BridgeService ────────────────────────────────────────────────

/// The top-level bridge service.
pub struct BridgeService {
    config: BridgeConfig,
    store: Arc<MemoryStore>,
    shutdown: CancellationToken,
}

impl BridgeService {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            store: Arc::new(MemoryStore::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Obtain a handle that stops the service when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Run the service until stopped.
    ///
    /// 1. Loads the command catalog.
    /// 2. Starts the change logger and the stdin console.
    /// 3. Runs the session until the stop handle is cancelled.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let catalog = Arc::new(self.config.load_catalog()?);
        info!(commands = catalog.commands().len(), "catalog loaded");

        let mut changes = self.store.subscribe();
        let logger = tokio::spawn(async move {
            while let Some(change) = changes.next().await {
                if change.ack {
                    info!(key = %change.key, value = %change.value, "state");
                }
            }
        });

        let console = tokio::spawn({
            let store = self.store();
            async move {
                let stdin = BufReader::new(tokio::io::stdin());
                if let Err(e) = run_console(store, stdin, tokio::io::stdout()).await {
                    debug!("console closed: {e}");
                }
            }
        });

        let session = Session::new(
            self.config.to_session_settings(),
            catalog,
            self.store(),
        )
        .with_shutdown(self.shutdown.clone());
        let result = session.run().await;

        console.abort();
        logger.abort();
        info!("bridge service stopped");
        result?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
