//! Translation between decoded frames and store state.
//!
//! Inbound, a [`StatusFrame`] becomes zero or more [`Effect`]s for the
//! session to carry out: publish a changed value, start the post power-on
//! query burst, release a hold. Outbound, an unacknowledged store change
//! becomes a [`CommandFrame`].
//!
//! The dispatcher does no I/O, which keeps the protocol rules testable
//! without sockets or timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, CommandSpec, POWER, ValueKind, parse_hex};
use crate::error::LgtvError;
use crate::frame::{CommandFrame, StatusFrame};
use crate::inhibit::Hold;
use crate::state::{Change, DeviceState};
use crate::store::{ObjectMeta, Role, StateChange, StateValue, ValueType};

/// Store group whose writes are remote-key presses.
pub const REMOTE_GROUP: &str = "remote";

/// Store group owned by the bridge itself; user writes are ignored.
pub const INFO_GROUP: &str = "info";

/// Something the session must do in response to a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write an acknowledged value, defining the object on first use.
    Publish {
        key: String,
        value: StateValue,
        meta: ObjectMeta,
    },
    /// Power just came on: re-query every queryable command.
    StartBurst,
    /// A reply arrived for an outstanding command.
    Release(Hold),
}

/// A command ready to be written, with the hold that covers it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub frame: CommandFrame,
    pub hold: Hold,
    pub until: Instant,
}

/// A pending reply: which character it will carry and when to give up.
#[derive(Debug, Clone, Copy)]
struct Pending {
    wire: char,
    deadline: Instant,
}

impl Pending {
    fn is_live(&self, now: Instant) -> bool {
        self.deadline > now
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    state: DeviceState,
    set_id: u8,
    command_timeout: Duration,
    /// One-shot redirect: the next remote-wire frame is a key ack.
    remote: Option<Pending>,
    command: Option<Pending>,
}

impl Dispatcher {
    pub fn new(catalog: Arc<Catalog>, set_id: u8, command_timeout: Duration) -> Self {
        Self {
            catalog,
            state: DeviceState::new(),
            set_id,
            command_timeout,
            remote: None,
            command: None,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Whether a remote-key press is still waiting for its ack.
    pub fn remote_pending(&self, now: Instant) -> bool {
        self.remote.is_some_and(|p| p.is_live(now))
    }

    /// Forget outstanding replies and the power state.
    ///
    /// After a reconnect the TV's power state is unknown again, so the
    /// next power-on report counts as a transition.
    pub fn on_disconnect(&mut self) {
        self.remote = None;
        self.command = None;
        self.state.forget(POWER);
    }

    // ── Inbound ──────────────────────────────────────────────────

    pub fn handle_frame(&mut self, frame: &StatusFrame, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        if let Some(pending) = self.remote.take() {
            if !pending.is_live(now) {
                debug!("remote key ack timed out");
            } else if frame.command() == pending.wire {
                self.remote_ack(frame, &mut effects);
                return effects;
            } else {
                self.remote = Some(pending);
            }
        }

        if let Some(pending) = self.command {
            if !pending.is_live(now) || frame.command() == pending.wire {
                self.command = None;
                effects.push(Effect::Release(Hold::Command));
            }
        }

        if !frame.ack() {
            if frame.is_illegal_code() {
                error!(%frame, "TV reported an illegal code");
            } else {
                warn!(%frame, "TV rejected command");
            }
            return effects;
        }

        match Self::resolve(&self.catalog, frame) {
            Ok((spec, value)) => {
                if let Some(change) = self.state.apply(spec.name(), value) {
                    debug!(name = %change.name, value = %change.new, "state changed");
                    let power_on = is_power_on(&change);
                    effects.push(Effect::Publish {
                        key: change.name,
                        value: change.new,
                        meta: object_meta(spec),
                    });
                    if power_on {
                        info!("TV powered on");
                        effects.push(Effect::StartBurst);
                    }
                }
            }
            Err(e) => error!(%frame, "cannot map frame: {e}"),
        }
        effects
    }

    fn resolve<'c>(
        catalog: &'c Catalog,
        frame: &StatusFrame,
    ) -> Result<(&'c CommandSpec, StateValue), LgtvError> {
        let spec = catalog.lookup_by_wire(frame.command())?;
        let value_spec = spec.label_for_value(frame.value())?;
        let value = match value_spec.kind() {
            ValueKind::Ranged { .. } => {
                let n = parse_hex(frame.value()).ok_or_else(|| LgtvError::UnknownValue {
                    command: spec.name().to_string(),
                    value: frame.value().to_string(),
                })?;
                StateValue::Number(i64::from(n))
            }
            ValueKind::Enumerated { label } => match label.as_str() {
                "on" => StateValue::Bool(true),
                "off" => StateValue::Bool(false),
                other => StateValue::Text(other.to_string()),
            },
        };
        Ok((spec, value))
    }

    fn remote_ack(&mut self, frame: &StatusFrame, effects: &mut Vec<Effect>) {
        effects.push(Effect::Release(Hold::Remote));
        if !frame.ack() {
            warn!(%frame, "TV rejected remote key");
            return;
        }
        match self.catalog.remote_key_for_code(frame.value()) {
            Ok(key) => {
                debug!(key = key.name(), "remote key acknowledged");
                effects.push(Effect::Publish {
                    key: format!("{REMOTE_GROUP}.{}", key.name()),
                    value: StateValue::Bool(false),
                    meta: remote_meta(key.name()),
                });
            }
            Err(e) => warn!(%frame, "remote ack for unknown key: {e}"),
        }
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Turn a user write into a frame.
    ///
    /// Returns `Ok(None)` for changes that are not requests: acknowledged
    /// values and keys the bridge owns.
    pub fn handle_user_write(
        &mut self,
        change: &StateChange,
        now: Instant,
    ) -> Result<Option<Outbound>, LgtvError> {
        if change.ack {
            return Ok(None);
        }
        let mut segments = change.key.rsplit('.');
        let command = segments.next().unwrap_or_default();
        let group = segments.next().unwrap_or_default();

        let until = now + self.command_timeout;
        match group {
            INFO_GROUP => Ok(None),
            // releasing a button is not a press
            REMOTE_GROUP if change.value.as_bool() == Some(false) => Ok(None),
            REMOTE_GROUP => {
                let key = self.catalog.remote_key(command)?;
                let frame =
                    CommandFrame::new(self.catalog.remote_command(), self.set_id, key.code());
                self.remote = Some(Pending {
                    wire: self.catalog.remote_wire(),
                    deadline: until,
                });
                Ok(Some(Outbound {
                    frame,
                    hold: Hold::Remote,
                    until,
                }))
            }
            _ => {
                let spec = self.catalog.lookup_by_name(command)?;
                let label = user_label(&change.value);
                let code = spec.encode_label(&label)?;
                self.command = Some(Pending {
                    wire: spec.wire(),
                    deadline: until,
                });
                Ok(Some(Outbound {
                    frame: CommandFrame::new(spec.code(), self.set_id, code),
                    hold: Hold::Command,
                    until,
                }))
            }
        }
    }
}

/// Map a store value to a catalog label: booleans become `on`/`off`.
fn user_label(value: &StateValue) -> String {
    match value.as_bool() {
        Some(true) => "on".to_string(),
        Some(false) => "off".to_string(),
        None => value.to_string(),
    }
}

fn is_power_on(change: &Change) -> bool {
    change.name == POWER && change.new == StateValue::Bool(true)
}

/// Store metadata for a catalog command.
pub fn object_meta(spec: &CommandSpec) -> ObjectMeta {
    let (value_type, role) = if spec.is_boolean() {
        (ValueType::Boolean, Role::Media)
    } else if spec.range().is_some() {
        (ValueType::Number, Role::Media)
    } else {
        (ValueType::String, Role::Indicator)
    };
    ObjectMeta {
        name: spec.description().to_string(),
        description: spec.description().to_string(),
        value_type,
        role,
    }
}

/// Store metadata for a remote-key button.
pub fn remote_meta(key: &str) -> ObjectMeta {
    ObjectMeta {
        name: key.to_string(),
        description: format!("remote key {key}"),
        value_type: ValueType::Boolean,
        role: Role::Button,
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(3);

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(Catalog::builtin().unwrap()), 0, TIMEOUT)
    }

    fn frame(bytes: &[u8]) -> StatusFrame {
        StatusFrame::parse(bytes).unwrap()
    }

    fn user(key: &str, value: StateValue) -> StateChange {
        StateChange {
            key: key.to_string(),
            value,
            ack: false,
        }
    }

    fn published(effects: &[Effect]) -> Vec<(String, StateValue)> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Publish { key, value, .. } => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn power_on_publishes_and_starts_burst() {
        let mut d = dispatcher();
        let effects = d.handle_frame(&frame(b"a 00 OK01x"), Instant::now());
        assert_eq!(
            published(&effects),
            vec![("power".to_string(), StateValue::Bool(true))]
        );
        assert!(effects.contains(&Effect::StartBurst));
        match &effects[0] {
            Effect::Publish { meta, .. } => {
                assert_eq!(meta.value_type, ValueType::Boolean);
                assert_eq!(meta.role, Role::Media);
            }
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn repeated_state_publishes_once() {
        let mut d = dispatcher();
        let now = Instant::now();
        let first = d.handle_frame(&frame(b"f 01 OK14x"), now);
        let second = d.handle_frame(&frame(b"f 01 OK14x"), now);
        assert_eq!(
            published(&first),
            vec![("volume".to_string(), StateValue::Number(20))]
        );
        assert!(second.is_empty());
    }

    #[test]
    fn power_on_only_on_transition() {
        let mut d = dispatcher();
        let now = Instant::now();
        d.handle_frame(&frame(b"a 01 OK01x"), now);
        let again = d.handle_frame(&frame(b"a 01 OK01x"), now);
        assert!(!again.contains(&Effect::StartBurst));

        d.handle_frame(&frame(b"a 01 OK00x"), now);
        let back_on = d.handle_frame(&frame(b"a 01 OK01x"), now);
        assert!(back_on.contains(&Effect::StartBurst));
    }

    #[test]
    fn disconnect_forgets_power() {
        let mut d = dispatcher();
        let now = Instant::now();
        d.handle_frame(&frame(b"a 01 OK01x"), now);
        d.on_disconnect();
        let effects = d.handle_frame(&frame(b"a 01 OK01x"), now);
        assert!(effects.contains(&Effect::StartBurst));
    }

    #[test]
    fn enumerated_labels_pass_through() {
        let mut d = dispatcher();
        let effects = d.handle_frame(&frame(b"b 01 OK91x"), Instant::now());
        assert_eq!(
            published(&effects),
            vec![("input".to_string(), StateValue::from("hdmi2"))]
        );
        match &effects[0] {
            Effect::Publish { meta, .. } => assert_eq!(meta.role, Role::Indicator),
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn mixed_switch_is_typed_as_string() {
        let mut d = dispatcher();
        let now = Instant::now();
        let on = d.handle_frame(&frame(b"d 01 OK01x"), now);
        let video = d.handle_frame(&frame(b"d 01 OK10x"), now);
        assert_eq!(
            published(&on),
            vec![("screen_mute".to_string(), StateValue::Bool(true))]
        );
        assert_eq!(
            published(&video),
            vec![("screen_mute".to_string(), StateValue::from("video_only"))]
        );
        for effects in [&on, &video] {
            match &effects[0] {
                Effect::Publish { meta, .. } => {
                    assert_eq!(meta.value_type, ValueType::String);
                    assert_eq!(meta.role, Role::Indicator);
                }
                other => panic!("unexpected effect {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_mappings_leave_state_unchanged() {
        let mut d = dispatcher();
        let now = Instant::now();
        assert!(d.handle_frame(&frame(b"z 01 OK01x"), now).is_empty());
        assert!(d.handle_frame(&frame(b"a 01 OK7fx"), now).is_empty());
        assert!(d.state().is_empty());
    }

    #[test]
    fn negative_ack_changes_nothing() {
        let mut d = dispatcher();
        let now = Instant::now();
        assert!(d.handle_frame(&frame(b"a 01 NG00x"), now).is_empty());
        assert!(d.handle_frame(&frame(b"f 01 NG65x"), now).is_empty());
        assert!(d.state().is_empty());
    }

    #[test]
    fn user_power_write() {
        let mut d = dispatcher();
        let now = Instant::now();
        let out = d
            .handle_user_write(&user("lgtv.0.power", false.into()), now)
            .unwrap()
            .unwrap();
        assert_eq!(out.frame.to_bytes(), b"ka 00 00\r\n");
        assert_eq!(out.hold, Hold::Command);
        assert_eq!(out.until, now + TIMEOUT);
    }

    #[test]
    fn user_ranged_write() {
        let mut d = dispatcher();
        let out = d
            .handle_user_write(&user("volume", StateValue::Number(20)), Instant::now())
            .unwrap()
            .unwrap();
        assert_eq!(out.frame.to_bytes(), b"kf 00 14\r\n");

        let err = d
            .handle_user_write(&user("volume", StateValue::Number(200)), Instant::now())
            .unwrap_err();
        assert!(matches!(err, LgtvError::UnknownValue { .. }));
    }

    #[test]
    fn user_label_write() {
        let mut d = dispatcher();
        let out = d
            .handle_user_write(&user("input", "hdmi1".into()), Instant::now())
            .unwrap()
            .unwrap();
        assert_eq!(out.frame.to_bytes(), b"xb 00 90\r\n");
    }

    #[test]
    fn unresolvable_writes_are_errors() {
        let mut d = dispatcher();
        let now = Instant::now();
        assert!(matches!(
            d.handle_user_write(&user("teleport", true.into()), now),
            Err(LgtvError::UnknownCommand(_))
        ));
        assert!(matches!(
            d.handle_user_write(&user("remote.jump", true.into()), now),
            Err(LgtvError::UnknownRemoteKey(_))
        ));
    }

    #[test]
    fn acknowledged_and_info_changes_are_ignored() {
        let mut d = dispatcher();
        let now = Instant::now();
        let mut acked = user("power", true.into());
        acked.ack = true;
        assert!(d.handle_user_write(&acked, now).unwrap().is_none());
        assert!(
            d.handle_user_write(&user("info.connection", true.into()), now)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn remote_ack_is_redirected_once() {
        let mut d = dispatcher();
        let now = Instant::now();
        let out = d
            .handle_user_write(&user("remote.mute", true.into()), now)
            .unwrap()
            .unwrap();
        assert_eq!(out.frame.to_bytes(), b"mc 00 09\r\n");
        assert_eq!(out.hold, Hold::Remote);
        assert!(d.remote_pending(now));

        // 'c' is shared with aspect_ratio; the pending press wins
        let effects = d.handle_frame(&frame(b"c 01 OK09x"), now);
        assert_eq!(effects[0], Effect::Release(Hold::Remote));
        assert_eq!(
            published(&effects),
            vec![("remote.mute".to_string(), StateValue::Bool(false))]
        );
        assert!(!d.remote_pending(now));
        assert!(d.state().get("aspect_ratio").is_none());

        // the next 'c' frame is ordinary status again
        let effects = d.handle_frame(&frame(b"c 01 OK02x"), now);
        assert_eq!(
            published(&effects),
            vec![("aspect_ratio".to_string(), StateValue::from("16:9"))]
        );
    }

    #[test]
    fn releasing_a_button_sends_nothing() {
        let mut d = dispatcher();
        let out = d
            .handle_user_write(&user("remote.mute", false.into()), Instant::now())
            .unwrap();
        assert!(out.is_none());
        assert!(!d.remote_pending(Instant::now()));
    }

    #[test]
    fn other_frames_do_not_consume_the_redirect() {
        let mut d = dispatcher();
        let now = Instant::now();
        d.handle_user_write(&user("remote.ok", true.into()), now)
            .unwrap();
        d.handle_frame(&frame(b"a 01 OK01x"), now);
        assert!(d.remote_pending(now));
    }

    #[test]
    fn expired_redirect_falls_back_to_status() {
        let mut d = dispatcher();
        let now = Instant::now();
        d.handle_user_write(&user("remote.mute", true.into()), now)
            .unwrap();
        let later = now + TIMEOUT + Duration::from_millis(1);
        let effects = d.handle_frame(&frame(b"c 01 OK02x"), later);
        assert_eq!(published(&effects).len(), 1);
        assert!(!d.remote_pending(later));
    }

    #[test]
    fn reply_releases_command_hold() {
        let mut d = dispatcher();
        let now = Instant::now();
        d.handle_user_write(&user("volume", StateValue::Number(5)), now)
            .unwrap();
        let unrelated = d.handle_frame(&frame(b"a 01 OK01x"), now);
        assert!(!unrelated.contains(&Effect::Release(Hold::Command)));
        let reply = d.handle_frame(&frame(b"f 01 OK05x"), now);
        assert!(reply.contains(&Effect::Release(Hold::Command)));
    }

    #[test]
    fn every_label_round_trips_through_a_reply() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        for spec in catalog.commands() {
            for value in spec.values() {
                let (label, expected) = match value.label() {
                    Some("query") => continue,
                    Some("on") => ("on", StateValue::Bool(true)),
                    Some("off") => ("off", StateValue::Bool(false)),
                    Some(other) => (other, StateValue::from(other)),
                    None => ("20", StateValue::Number(20)),
                };
                let mut d = Dispatcher::new(catalog.clone(), 0, TIMEOUT);
                let code = spec.encode_label(label).unwrap();
                let reply = StatusFrame::new(spec.wire(), "01", true, code);
                let effects = d.handle_frame(&reply, Instant::now());
                assert_eq!(
                    published(&effects),
                    vec![(spec.name().to_string(), expected)],
                    "{} {label}",
                    spec.name()
                );
            }
        }
    }
}
