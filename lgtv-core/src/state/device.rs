//! Last-known TV state, used to publish only real changes.

use std::collections::HashMap;

use crate::store::StateValue;

/// A value that differs from the last published one.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub name: String,
    pub old: Option<StateValue>,
    pub new: StateValue,
}

/// Current and previously published values per feature name.
#[derive(Debug, Default)]
pub struct DeviceState {
    current: HashMap<String, StateValue>,
    previous: HashMap<String, StateValue>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reported value. Returns the change when it differs from
    /// what was last published, `None` for a repeat.
    pub fn apply(&mut self, name: &str, value: StateValue) -> Option<Change> {
        self.current.insert(name.to_string(), value.clone());
        if self.previous.get(name) == Some(&value) {
            return None;
        }
        let old = self.previous.insert(name.to_string(), value.clone());
        Some(Change {
            name: name.to_string(),
            old,
            new: value,
        })
    }

    /// Drop a feature so its next report is published again.
    pub fn forget(&mut self, name: &str) {
        self.current.remove(name);
        self.previous.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&StateValue> {
        self.current.get(name)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_report_is_a_change() {
        let mut state = DeviceState::new();
        let change = state.apply("power", true.into()).unwrap();
        assert_eq!(change.old, None);
        assert_eq!(change.new, StateValue::Bool(true));
        assert_eq!(state.get("power"), Some(&StateValue::Bool(true)));
    }

    #[test]
    fn repeat_is_not_a_change() {
        let mut state = DeviceState::new();
        assert!(state.apply("volume", StateValue::Number(10)).is_some());
        assert!(state.apply("volume", StateValue::Number(10)).is_none());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn change_carries_old_value() {
        let mut state = DeviceState::new();
        state.apply("input", "hdmi1".into());
        let change = state.apply("input", "hdmi2".into()).unwrap();
        assert_eq!(change.old, Some(StateValue::from("hdmi1")));
    }

    #[test]
    fn forgotten_value_is_republished() {
        let mut state = DeviceState::new();
        state.apply("power", true.into());
        state.forget("power");
        assert!(state.get("power").is_none());
        assert!(state.apply("power", true.into()).is_some());
    }
}
