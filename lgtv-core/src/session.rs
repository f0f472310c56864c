//! The connection lifecycle: connect, serve, tear down, wait, repeat.
//!
//! A [`Session`] owns everything that lives for one TCP connection (the
//! poller, the burst, the holds) and resets it on every teardown. Exactly
//! one connection exists at a time, and a shutdown request ends the loop
//! from any state, including the reconnect wait.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::burst::BurstQuery;
use crate::catalog::Catalog;
use crate::dispatcher::{Dispatcher, Effect, REMOTE_GROUP, remote_meta};
use crate::error::LgtvError;
use crate::frame::{CommandFrame, StatusFrame};
use crate::inhibit::{Hold, Inhibition};
use crate::network::{Connection, ConnectionInfo, LinkEvent};
use crate::poller::Poller;
use crate::reconnect::{Disconnect, ReconnectPolicy};
use crate::state::ConnectionPhase;
use crate::store::{ObjectMeta, Role, StateChange, StateStore, StateValue, ValueType};

/// Store key of the connectivity indicator.
pub const CONNECTION_KEY: &str = "info.connection";

pub const DEFAULT_PORT: u16 = 23;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub host: String,
    pub port: u16,
    /// Set ID written into every outbound frame.
    pub set_id: u8,
    pub poll_interval: Duration,
    /// Gap between queries of the post power-on burst.
    pub burst_spacing: Duration,
    /// Extra hold after the last burst query, for its reply.
    pub burst_margin: Duration,
    /// How long a user command or remote key waits for its reply.
    pub command_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            host: "192.168.1.56".to_string(),
            port: DEFAULT_PORT,
            set_id: 0,
            poll_interval: Duration::from_secs(5),
            burst_spacing: Duration::from_secs(5),
            burst_margin: Duration::from_secs(2),
            command_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SessionSettings {
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(self.host.clone(), self.port)
    }

    /// How long polling stays off for a burst of `queries` queries.
    pub fn burst_hold(&self, queries: usize) -> Duration {
        let n = u32::try_from(queries).unwrap_or(u32::MAX);
        self.burst_spacing.saturating_mul(n) + self.burst_margin
    }
}

pub struct Session<S: StateStore> {
    settings: SessionSettings,
    catalog: Arc<Catalog>,
    store: Arc<S>,
    dispatcher: Dispatcher,
    inhibition: Inhibition,
    burst: BurstQuery,
    phase: ConnectionPhase,
    shutdown: CancellationToken,
}

impl<S: StateStore> Session<S> {
    pub fn new(settings: SessionSettings, catalog: Arc<Catalog>, store: Arc<S>) -> Self {
        let dispatcher =
            Dispatcher::new(catalog.clone(), settings.set_id, settings.command_timeout);
        let burst = BurstQuery::new(settings.burst_spacing);
        Self {
            settings,
            catalog,
            store,
            dispatcher,
            inhibition: Inhibition::new(),
            burst,
            phase: ConnectionPhase::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop on `token` instead of a private token.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Cancel this token to stop [`run`](Self::run).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until shutdown. Connection trouble is logged and retried; an
    /// error means the lifecycle state itself went inconsistent.
    pub async fn run(mut self) -> Result<(), LgtvError> {
        let mut changes = self.store.subscribe();
        self.provision().await;

        let info = self.settings.connection_info();
        while !self.shutdown.is_cancelled() {
            self.phase.begin_connect()?;

            let connecting = Connection::connect(&info, self.settings.connect_timeout);
            tokio::pin!(connecting);
            let attempt = loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break None,
                    result = &mut connecting => break Some(result),
                    Some(change) = changes.next() => drop_write(&change),
                }
            };
            let outcome = match attempt {
                None => Disconnect::Shutdown,
                Some(Ok(conn)) => {
                    self.phase.complete_connect()?;
                    info!("connected to {info}");
                    self.store.set(CONNECTION_KEY, true.into(), true).await;
                    self.serve(conn, &mut changes).await
                }
                Some(Err(e)) => Disconnect::classify(e),
            };

            self.teardown().await;
            let Some(delay) = self.settings.reconnect.delay_for(&outcome) else {
                break;
            };
            outcome.log(&info, delay);
            if !self.wait_reconnect(delay, &mut changes).await {
                break;
            }
        }

        info!("session stopped");
        Ok(())
    }

    /// Define the bridge's own objects and the remote-key buttons.
    async fn provision(&self) {
        let connection = ObjectMeta {
            name: "connection".to_string(),
            description: "TV connected".to_string(),
            value_type: ValueType::Boolean,
            role: Role::Indicator,
        };
        self.store.define_object(CONNECTION_KEY, connection).await;
        self.store.set(CONNECTION_KEY, false.into(), true).await;

        for key in self.catalog.remote_keys() {
            let id = format!("{REMOTE_GROUP}.{}", key.name());
            if self.store.get(&id).await.is_some() {
                continue;
            }
            self.store.define_object(&id, remote_meta(key.name())).await;
            self.store.set(&id, false.into(), true).await;
        }
        debug!(keys = self.catalog.remote_keys().len(), "remote keys provisioned");
    }

    async fn serve(
        &mut self,
        mut conn: Connection,
        changes: &mut BoxStream<'static, StateChange>,
    ) -> Disconnect {
        let query = match self.catalog.power_query(self.settings.set_id) {
            Ok(frame) => frame,
            Err(e) => {
                error!("cannot poll: {e}");
                return Disconnect::Shutdown;
            }
        };
        let mut poller = Poller::new(self.settings.poll_interval, query);

        loop {
            let burst_due = self.burst.next_due();
            tokio::select! {
                _ = self.shutdown.cancelled() => return Disconnect::Shutdown,
                event = conn.recv() => match event {
                    Some(LinkEvent::Frame(frame)) => self.on_frame(&frame).await,
                    Some(LinkEvent::Closed) | None => return Disconnect::Closed,
                    Some(LinkEvent::Failed(e)) => return Disconnect::classify(e),
                },
                Some(change) = changes.next() => self.on_change(change, &conn).await,
                _ = poller.tick() => {
                    let inhibited = self.inhibition.is_active(Instant::now());
                    match poller.poll_frame(self.phase.is_connected(), inhibited) {
                        Some(frame) => self.send(&conn, frame).await,
                        None => trace!("poll skipped"),
                    }
                }
                _ = sleep_until(burst_due.unwrap_or_else(Instant::now)), if burst_due.is_some() => {
                    if let Some(frame) = self.burst.pop_due(Instant::now()) {
                        self.send(&conn, frame).await;
                    }
                }
            }
        }
    }

    async fn on_frame(&mut self, frame: &StatusFrame) {
        trace!(%frame, "received");
        for effect in self.dispatcher.handle_frame(frame, Instant::now()) {
            match effect {
                Effect::Publish { key, value, meta } => self.publish(&key, value, meta).await,
                Effect::StartBurst => self.start_burst(),
                Effect::Release(hold) => self.inhibition.release(hold),
            }
        }
    }

    async fn on_change(&mut self, change: StateChange, conn: &Connection) {
        if change.ack {
            return;
        }
        match self.dispatcher.handle_user_write(&change, Instant::now()) {
            Ok(Some(out)) => {
                self.inhibition.hold(out.hold, out.until);
                self.send(conn, out.frame).await;
            }
            Ok(None) => {}
            Err(e) => error!(key = %change.key, "dropping write: {e}"),
        }
    }

    async fn publish(&self, key: &str, value: StateValue, meta: ObjectMeta) {
        if self.store.get(key).await.is_none() {
            self.store.define_object(key, meta).await;
        }
        self.store.set(key, value, true).await;
    }

    fn start_burst(&mut self) {
        if self.burst.is_running() {
            debug!("status burst already running");
            return;
        }
        let frames = self.catalog.queries(self.settings.set_id);
        if frames.is_empty() {
            return;
        }
        let now = Instant::now();
        let queries = frames.len();
        self.burst.start(frames, now);
        self.inhibition
            .hold(Hold::Burst, now + self.settings.burst_hold(queries));
        info!(queries, "TV powered on; querying full status");
    }

    async fn send(&self, conn: &Connection, frame: CommandFrame) {
        if !self.phase.is_connected() {
            debug!(%frame, "not connected; dropping");
            return;
        }
        debug!(%frame, "sending");
        if let Err(e) = conn.send(frame).await {
            warn!("send failed: {e}");
        }
    }

    async fn teardown(&mut self) {
        let was_connected = self.phase.is_connected();
        if let Some(up) = self.phase.connected_duration() {
            debug!("connection was up for {up:?}");
        }
        self.phase.force_disconnect();
        self.burst.cancel();
        self.inhibition.clear();
        self.dispatcher.on_disconnect();
        if was_connected {
            self.store.set(CONNECTION_KEY, false.into(), true).await;
        }
    }

    /// Sleep out the reconnect delay. User writes arriving meanwhile are
    /// dropped. Returns `false` on shutdown.
    async fn wait_reconnect(
        &mut self,
        delay: Duration,
        changes: &mut BoxStream<'static, StateChange>,
    ) -> bool {
        let deadline = sleep(delay);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = &mut deadline => return true,
                Some(change) = changes.next() => drop_write(&change),
            }
        }
    }
}

fn drop_write(change: &StateChange) {
    if !change.ack {
        warn!(key = %change.key, "TV not connected; dropping write");
    }
}
