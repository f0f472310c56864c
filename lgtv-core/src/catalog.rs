//! Command catalog: the table that maps feature names to the TV's
//! two-character command and value codes.
//!
//! The catalog is loaded once from a JSON document and is read-only
//! afterwards. A default LG table is embedded in the crate; a custom table
//! can be supplied with [`Catalog::from_path`].
//!
//! ```text
//!  name "power" ──► code "ka" ──► wire 'a'   (replies: "a 01 OK01x")
//!  label "on"   ──► value "01"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::LgtvError;
use crate::frame::CommandFrame;

/// The wildcard value that asks the TV to report a setting.
pub const QUERY_CODE: &str = "ff";

/// Name of the power command; polled and excluded from the burst query.
pub const POWER: &str = "power";

/// The LG command table shipped with the crate.
pub const BUILTIN_CATALOG: &str = include_str!("../data/commands.json");

// ── ValueSpec ────────────────────────────────────────────────────

/// How a value of a command is encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// A fixed code with a human label, e.g. `01` ↔ `on`.
    Enumerated { label: String },
    /// A linear integer sent as two hex digits, e.g. volume `0x14` ↔ 20.
    Ranged { min: u8, max: u8 },
}

/// One accepted value of a [`CommandSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSpec {
    code: String,
    kind: ValueKind,
}

impl ValueSpec {
    /// The two-digit hex code, or `min-max` for a range marker.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// The human label of an enumerated value.
    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::Enumerated { label } => Some(label),
            ValueKind::Ranged { .. } => None,
        }
    }

    pub fn is_ranged(&self) -> bool {
        matches!(self.kind, ValueKind::Ranged { .. })
    }

    fn accepts_number(&self, n: i64) -> bool {
        match self.kind {
            ValueKind::Ranged { min, max } => (i64::from(min)..=i64::from(max)).contains(&n),
            ValueKind::Enumerated { .. } => false,
        }
    }
}

// ── CommandSpec ──────────────────────────────────────────────────

/// A TV feature addressable through the serial protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    code: String,
    wire: char,
    name: String,
    description: String,
    values: Vec<ValueSpec>,
}

impl CommandSpec {
    /// Two-character command code, e.g. `ka`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The single character the TV uses for this command in its replies.
    pub fn wire(&self) -> char {
        self.wire
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn values(&self) -> &[ValueSpec] {
        &self.values
    }

    /// Whether the command accepts the wildcard read value.
    pub fn is_queryable(&self) -> bool {
        self.values.iter().any(|v| v.code == QUERY_CODE)
    }

    /// The range spec, if the command carries a linear integer value.
    pub fn range(&self) -> Option<&ValueSpec> {
        self.values.iter().find(|v| v.is_ranged())
    }

    /// Whether the command reads as a switch: `on` and `off` are its only
    /// labels apart from `query`.
    pub fn is_boolean(&self) -> bool {
        let has = |l: &str| self.values.iter().any(|v| v.label() == Some(l));
        let only_switch = self
            .values
            .iter()
            .all(|v| v.code == QUERY_CODE || matches!(v.label(), Some("on" | "off")));
        has("on") && has("off") && only_switch
    }

    /// Resolve a human label (or a decimal number for ranged commands)
    /// to its value spec.
    pub fn value_for_label(&self, label: &str) -> Result<&ValueSpec, LgtvError> {
        let label = label.trim();
        if let Some(spec) = self
            .values
            .iter()
            .find(|v| v.label().is_some_and(|l| l.eq_ignore_ascii_case(label)))
        {
            return Ok(spec);
        }
        label
            .parse::<i64>()
            .ok()
            .and_then(|n| self.values.iter().find(|v| v.accepts_number(n)))
            .ok_or_else(|| self.unknown_value(label))
    }

    /// Resolve a two-digit code reported by the TV to its value spec.
    ///
    /// Enumerated codes win over a range that happens to contain them.
    pub fn label_for_value(&self, code: &str) -> Result<&ValueSpec, LgtvError> {
        let code = code.to_ascii_lowercase();
        if let Some(spec) = self
            .values
            .iter()
            .find(|v| !v.is_ranged() && v.code == code)
        {
            return Ok(spec);
        }
        parse_hex(&code)
            .and_then(|n| self.values.iter().find(|v| v.accepts_number(i64::from(n))))
            .ok_or_else(|| self.unknown_value(&code))
    }

    /// The wire code to send for a label or number.
    pub fn encode_label(&self, label: &str) -> Result<String, LgtvError> {
        let spec = self.value_for_label(label)?;
        if spec.is_ranged() {
            let n: u8 = label
                .trim()
                .parse()
                .map_err(|_| self.unknown_value(label))?;
            Ok(format!("{n:02x}"))
        } else {
            Ok(spec.code.clone())
        }
    }

    fn unknown_value(&self, value: &str) -> LgtvError {
        LgtvError::UnknownValue {
            command: self.name.clone(),
            value: value.to_string(),
        }
    }
}

/// Parse a two-digit hex value code.
pub fn parse_hex(code: &str) -> Option<u8> {
    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_hexdigit()) {
        u8::from_str_radix(code, 16).ok()
    } else {
        None
    }
}

// ── RemoteKeySpec ────────────────────────────────────────────────

/// A remote-control button that can be emulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteKeySpec {
    name: String,
    code: String,
}

impl RemoteKeySpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

// ── Catalog ──────────────────────────────────────────────────────

/// The immutable command table with lookup indices.
#[derive(Debug, Clone)]
pub struct Catalog {
    commands: Vec<CommandSpec>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    by_wire: HashMap<char, usize>,
    remote_command: String,
    remote_keys: Vec<RemoteKeySpec>,
    remote_by_name: HashMap<String, usize>,
    remote_by_code: HashMap<String, usize>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    remote_command: String,
    commands: Vec<RawCommand>,
    #[serde(default, deserialize_with = "remote_entries")]
    remote: Vec<(String, String)>,
}

/// Read the `remote` object as ordered pairs so repeated names survive
/// parsing and can be rejected.
fn remote_entries<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Entries;

    impl<'de> Visitor<'de> for Entries {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of remote key names to codes")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(Entries)
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    code: String,
    wire: char,
    name: String,
    description: String,
    #[serde(default)]
    values: Vec<RawValue>,
    range: Option<RawRange>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    code: String,
    label: String,
}

#[derive(Debug, Deserialize)]
struct RawRange {
    min: u8,
    max: u8,
}

impl Catalog {
    /// Load the embedded LG catalog.
    pub fn builtin() -> Result<Self, LgtvError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load a catalog from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, LgtvError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a catalog document.
    pub fn from_json(text: &str) -> Result<Self, LgtvError> {
        let raw: RawCatalog = serde_json::from_str(text)?;
        Self::build(raw)
    }

    fn build(raw: RawCatalog) -> Result<Self, LgtvError> {
        let mut commands = Vec::with_capacity(raw.commands.len());
        let mut by_code = HashMap::new();
        let mut by_name = HashMap::new();
        let mut by_wire = HashMap::new();

        for cmd in raw.commands {
            let spec = build_command(cmd)?;
            let idx = commands.len();
            if by_code.insert(spec.code.clone(), idx).is_some() {
                return Err(invalid(format!("duplicate command code {}", spec.code)));
            }
            if by_name.insert(spec.name.clone(), idx).is_some() {
                return Err(invalid(format!("duplicate command name {}", spec.name)));
            }
            if by_wire.insert(spec.wire, idx).is_some() {
                return Err(invalid(format!("duplicate wire character {:?}", spec.wire)));
            }
            commands.push(spec);
        }

        let remote_command = raw.remote_command.to_ascii_lowercase();
        check_command_code(&remote_command)?;
        if by_code.contains_key(&remote_command) {
            return Err(invalid(format!(
                "remote command {remote_command} is also a regular command"
            )));
        }

        let mut remote_keys = Vec::with_capacity(raw.remote.len());
        let mut remote_by_name = HashMap::new();
        let mut remote_by_code = HashMap::new();
        for (name, code) in raw.remote {
            let code = code.to_ascii_lowercase();
            if name.trim().is_empty() {
                return Err(invalid("remote key with empty name".into()));
            }
            if parse_hex(&code).is_none() {
                return Err(invalid(format!("remote key {name}: bad code {code:?}")));
            }
            let idx = remote_keys.len();
            if remote_by_code.insert(code.clone(), idx).is_some() {
                return Err(invalid(format!("duplicate remote code {code}")));
            }
            if remote_by_name.insert(name.clone(), idx).is_some() {
                return Err(invalid(format!("duplicate remote key {name}")));
            }
            remote_keys.push(RemoteKeySpec { name, code });
        }

        if !by_name.contains_key(POWER) {
            return Err(invalid(format!("missing {POWER} command")));
        }

        Ok(Self {
            commands,
            by_code,
            by_name,
            by_wire,
            remote_command,
            remote_keys,
            remote_by_name,
            remote_by_code,
        })
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn lookup_by_name(&self, name: &str) -> Result<&CommandSpec, LgtvError> {
        self.by_name
            .get(name)
            .map(|&i| &self.commands[i])
            .ok_or_else(|| LgtvError::UnknownCommand(name.to_string()))
    }

    pub fn lookup_by_code(&self, code: &str) -> Result<&CommandSpec, LgtvError> {
        self.by_code
            .get(&code.to_ascii_lowercase())
            .map(|&i| &self.commands[i])
            .ok_or_else(|| LgtvError::UnknownCommand(code.to_string()))
    }

    /// Resolve the command a reply frame belongs to.
    pub fn lookup_by_wire(&self, wire: char) -> Result<&CommandSpec, LgtvError> {
        self.by_wire
            .get(&wire)
            .map(|&i| &self.commands[i])
            .ok_or_else(|| LgtvError::UnknownCommand(wire.to_string()))
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// The power command used by the poller.
    pub fn power(&self) -> Result<&CommandSpec, LgtvError> {
        self.lookup_by_name(POWER)
    }

    /// Commands re-queried after a power-on, in catalog order.
    pub fn burst_commands(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands
            .iter()
            .filter(|c| c.is_queryable() && c.name != POWER)
    }

    /// Query frames for the burst, addressed to `set_id`.
    pub fn queries(&self, set_id: u8) -> Vec<CommandFrame> {
        self.burst_commands()
            .map(|c| CommandFrame::new(c.code(), set_id, QUERY_CODE))
            .collect()
    }

    /// The poll frame, `ka <set_id> ff`.
    pub fn power_query(&self, set_id: u8) -> Result<CommandFrame, LgtvError> {
        Ok(CommandFrame::new(self.power()?.code(), set_id, QUERY_CODE))
    }

    // ── Remote keys ──────────────────────────────────────────────

    /// Command code used for remote key presses (`mc`).
    pub fn remote_command(&self) -> &str {
        &self.remote_command
    }

    /// The reply character of the remote command.
    pub fn remote_wire(&self) -> char {
        // validated by check_command_code at load time
        self.remote_command.chars().nth(1).unwrap_or_default()
    }

    pub fn remote_key(&self, name: &str) -> Result<&RemoteKeySpec, LgtvError> {
        self.remote_by_name
            .get(name)
            .map(|&i| &self.remote_keys[i])
            .ok_or_else(|| LgtvError::UnknownRemoteKey(name.to_string()))
    }

    pub fn remote_key_for_code(&self, code: &str) -> Result<&RemoteKeySpec, LgtvError> {
        self.remote_by_code
            .get(&code.to_ascii_lowercase())
            .map(|&i| &self.remote_keys[i])
            .ok_or_else(|| LgtvError::UnknownRemoteKey(code.to_string()))
    }

    pub fn remote_keys(&self) -> &[RemoteKeySpec] {
        &self.remote_keys
    }
}

// ── Validation ───────────────────────────────────────────────────

fn invalid(msg: String) -> LgtvError {
    LgtvError::Catalog(msg)
}

fn check_command_code(code: &str) -> Result<(), LgtvError> {
    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(invalid(format!("bad command code {code:?}")))
    }
}

fn build_command(raw: RawCommand) -> Result<CommandSpec, LgtvError> {
    let code = raw.code.to_ascii_lowercase();
    check_command_code(&code)?;
    if code.chars().nth(1) != Some(raw.wire) {
        return Err(invalid(format!(
            "command {code}: wire character {:?} does not match code",
            raw.wire
        )));
    }
    if raw.name.trim().is_empty() {
        return Err(invalid(format!("command {code}: empty name")));
    }

    let mut values = Vec::with_capacity(raw.values.len() + 1);
    for v in raw.values {
        let vcode = v.code.to_ascii_lowercase();
        if parse_hex(&vcode).is_none() {
            return Err(invalid(format!("command {code}: bad value code {vcode:?}")));
        }
        if v.label.trim().is_empty() {
            return Err(invalid(format!("command {code}: value {vcode} has no label")));
        }
        if values.iter().any(|s: &ValueSpec| s.code == vcode) {
            return Err(invalid(format!("command {code}: duplicate value {vcode}")));
        }
        values.push(ValueSpec {
            code: vcode,
            kind: ValueKind::Enumerated { label: v.label },
        });
    }
    if let Some(RawRange { min, max }) = raw.range {
        if min > max {
            return Err(invalid(format!("command {code}: range {min} > {max}")));
        }
        values.push(ValueSpec {
            code: format!("{min:02x}-{max:02x}"),
            kind: ValueKind::Ranged { min, max },
        });
    }
    if values.is_empty() {
        return Err(invalid(format!("command {code}: no values")));
    }

    Ok(CommandSpec {
        code,
        wire: raw.wire,
        name: raw.name,
        description: raw.description,
        values,
    })
}

// ── Tests ────────────────────────────────────────────────────────
