//! Scenarios: a name, an optional device, a frame script and a role.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uhid_protocol::{EventType, UhidEvent};

use crate::descriptor::DeviceDescriptor;
use crate::error::{HarnessError, HarnessResult};
use crate::frame::Frame;

/// Device-session command an Active scenario exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Create,
    Destroy,
    FeatureAnswer,
    Input,
}

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Command::Create => "create",
            Command::Destroy => "destroy",
            Command::FeatureAnswer => "feature_answer",
            Command::Input => "input",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handlers a Passive scenario installs and the dispatch it waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassiveSpec {
    handlers: Vec<EventType>,
    expect: Option<EventType>,
}

impl PassiveSpec {
    /// Default handlers, completing when `kind` is dispatched.
    pub fn expecting(kind: EventType) -> Self {
        Self {
            expect: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_handlers(mut self, handlers: impl IntoIterator<Item = EventType>) -> Self {
        self.handlers.clear();
        for kind in handlers {
            if !self.handlers.contains(&kind) {
                self.handlers.push(kind);
            }
        }
        self
    }

    pub fn handlers(&self) -> &[EventType] {
        &self.handlers
    }

    pub fn expected(&self) -> Option<EventType> {
        self.expect
    }
}

impl Default for PassiveSpec {
    fn default() -> Self {
        Self {
            handlers: vec![EventType::Output, EventType::FEATURE],
            expect: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// The harness invokes a command and observes the frames it produces.
    Active(Command),
    /// The harness injects frames and observes handler dispatch.
    Passive(PassiveSpec),
}

/// Ordered frames, always closed by exactly one terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    frames: Vec<Frame>,
}

impl Script {
    fn from_payloads(payloads: Vec<Vec<u8>>) -> Self {
        let mut frames: Vec<Frame> = payloads.into_iter().map(Frame::event).collect();
        frames.push(Frame::terminator());
        Self { frames }
    }

    /// Frame at `cursor`.
    ///
    /// # Errors
    ///
    /// Reading beyond the terminator is a [`HarnessError::Script`].
    pub fn frame(&self, cursor: usize) -> HarnessResult<&Frame> {
        self.frames.get(cursor).ok_or_else(|| {
            HarnessError::Script(format!(
                "cursor {cursor} is past the terminator at {}",
                self.terminator_index()
            ))
        })
    }

    /// Number of event frames, excluding the terminator.
    pub fn event_count(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn terminator_index(&self) -> usize {
        self.event_count()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Length of the longest scripted frame.
    pub fn longest_frame(&self) -> usize {
        self.frames.iter().map(Frame::len).max().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    device: Option<Arc<DeviceDescriptor>>,
    script: Script,
    role: Role,
}

impl Scenario {
    pub fn active(name: impl Into<String>, command: Command) -> ScenarioBuilder {
        ScenarioBuilder::new(name, Role::Active(command))
    }

    pub fn passive(name: impl Into<String>, spec: PassiveSpec) -> ScenarioBuilder {
        ScenarioBuilder::new(name, Role::Passive(spec))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_deref()
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn role(&self) -> &Role {
        &self.role
    }
}

/// Collects a scenario's payloads in order.
#[derive(Debug)]
pub struct ScenarioBuilder {
    name: String,
    device: Option<Arc<DeviceDescriptor>>,
    payloads: Vec<Vec<u8>>,
    role: Role,
}

impl ScenarioBuilder {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            device: None,
            payloads: Vec::new(),
            role,
        }
    }

    pub fn device(mut self, device: Arc<DeviceDescriptor>) -> Self {
        self.device = Some(device);
        self
    }

    /// Appends a copy of `payload` as the next frame.
    pub fn frame(mut self, payload: &[u8]) -> Self {
        self.payloads.push(payload.to_vec());
        self
    }

    /// Appends the encoding of `event` as the next frame.
    ///
    /// # Errors
    ///
    /// Fails if the event cannot be encoded.
    pub fn event(mut self, event: &UhidEvent) -> HarnessResult<Self> {
        let payload = event
            .encode()
            .map_err(|e| HarnessError::Script(format!("{}: {e}", self.name)))?;
        self.payloads.push(payload);
        Ok(self)
    }

    pub fn build(self) -> Scenario {
        Scenario {
            name: self.name,
            device: self.device,
            script: Script::from_payloads(self.payloads),
            role: self.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_ends_with_single_terminator() -> HarnessResult<()> {
        let scenario = Scenario::active("/uhid/test/a", Command::Create)
            .frame(&[1, 2])
            .frame(&[3])
            .build();
        let script = scenario.script();
        assert_eq!(script.event_count(), 2);
        assert_eq!(script.frame(0)?.payload(), &[1, 2]);
        assert_eq!(script.frame(1)?.len(), 1);
        assert!(script.frame(2)?.is_terminator());
        assert_eq!(
            script.frames().iter().filter(|f| f.is_terminator()).count(),
            1
        );
        Ok(())
    }

    #[test]
    fn test_reading_past_terminator_is_script_error() {
        let scenario = Scenario::active("/uhid/test/b", Command::Create).build();
        assert!(matches!(
            scenario.script().frame(1),
            Err(HarnessError::Script(_))
        ));
    }

    #[test]
    fn test_passive_defaults() {
        let spec = PassiveSpec::expecting(EventType::Output);
        assert_eq!(spec.handlers(), &[EventType::Output, EventType::FEATURE]);
        assert_eq!(spec.expected(), Some(EventType::Output));
        assert_eq!(PassiveSpec::default().expected(), None);
    }

    #[test]
    fn test_device_is_shared() {
        let device = Arc::new(DeviceDescriptor::new("shared"));
        let a = Scenario::active("/uhid/a", Command::Create)
            .device(Arc::clone(&device))
            .build();
        let b = Scenario::active("/uhid/b", Command::Destroy)
            .device(Arc::clone(&device))
            .build();
        assert_eq!(Arc::strong_count(&device), 3);
        assert_eq!(a.device(), b.device());
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Command::FeatureAnswer.to_string(), "feature_answer");
        assert_eq!(Command::Input.name(), "input");
    }
}
