//! Built-in UHID scenarios.

use std::sync::Arc;

use uhid_protocol::{EventType, Input2Request, UhidEvent};
use uhid_session::DeviceType;

use crate::descriptor::DeviceDescriptor;
use crate::error::HarnessResult;
use crate::registry::Registry;
use crate::scenario::{Command, PassiveSpec, Scenario};

/// HID report map of the Logitech MX Anywhere 3 mouse.
pub const MX_ANYWHERE_3_REPORT_MAP: [u8; 97] = [
    0x05, 0x01, 0x09, 0x02, 0xa1, 0x01, 0x85, 0x02, 0x09, 0x01, 0xa1, 0x00, 0x95, 0x10, 0x75, 0x01,
    0x15, 0x00, 0x25, 0x01, 0x05, 0x09, 0x19, 0x01, 0x29, 0x10, 0x81, 0x02, 0x05, 0x01, 0x16, 0x01,
    0xf8, 0x26, 0xff, 0x07, 0x75, 0x0c, 0x95, 0x02, 0x09, 0x30, 0x09, 0x31, 0x81, 0x06, 0x15, 0x81,
    0x25, 0x7f, 0x75, 0x08, 0x95, 0x01, 0x09, 0x38, 0x81, 0x06, 0x95, 0x01, 0x05, 0x0c, 0x0a, 0x38,
    0x02, 0x81, 0x06, 0xc0, 0xc0, 0x06, 0x43, 0xff, 0x0a, 0x02, 0x02, 0xa1, 0x01, 0x85, 0x11, 0x75,
    0x08, 0x95, 0x13, 0x15, 0x00, 0x26, 0xff, 0x00, 0x09, 0x02, 0x81, 0x00, 0x09, 0x02, 0x91, 0x00,
    0xc0,
];

pub fn mx_anywhere_3() -> DeviceDescriptor {
    DeviceDescriptor {
        name: "MX Anywhere 3".to_owned(),
        vendor: 0x046d,
        product: 0xb025,
        version: 0x0014,
        country: 0x00,
        device_type: DeviceType::Mouse,
        report_map: MX_ANYWHERE_3_REPORT_MAP.to_vec(),
    }
}

/// The built-in scenarios in registration order.
///
/// # Errors
///
/// Fails only if an expected event cannot be encoded.
pub fn builtin_scenarios() -> HarnessResult<Vec<Scenario>> {
    let create = DeviceDescriptor::minimal().create_event();
    let mx = Arc::new(mx_anywhere_3());

    Ok(vec![
        Scenario::active("/uhid/command/create", Command::Create)
            .event(&create)?
            .build(),
        Scenario::active("/uhid/command/destroy", Command::Destroy)
            .event(&create)?
            .event(&UhidEvent::Destroy)?
            .build(),
        Scenario::active("/uhid/command/feature_answer", Command::FeatureAnswer)
            .event(&create)?
            .event(&UhidEvent::zeroed(EventType::FEATURE_ANSWER))?
            .build(),
        Scenario::active("/uhid/command/input", Command::Input)
            .event(&create)?
            .event(&UhidEvent::Input2(Input2Request::default()))?
            .build(),
        Scenario::passive("/uhid/event/output", PassiveSpec::expecting(EventType::Output))
            .event(&UhidEvent::zeroed(EventType::Output))?
            .build(),
        Scenario::passive("/uhid/event/feature", PassiveSpec::expecting(EventType::FEATURE))
            .event(&UhidEvent::zeroed(EventType::FEATURE))?
            .build(),
        Scenario::active("/uhid/device/mx_anywhere_3", Command::Create)
            .event(&mx.create_event())?
            .device(mx)
            .build(),
    ])
}

/// # Errors
///
/// Fails on a name clash with an already registered scenario.
pub fn register_builtin(registry: &mut Registry) -> HarnessResult<()> {
    for scenario in builtin_scenarios()? {
        registry.register(scenario)?;
    }
    Ok(())
}

/// # Errors
///
/// See [`register_builtin`].
pub fn builtin_registry() -> HarnessResult<Registry> {
    let mut registry = Registry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Role;
    use uhid_protocol::DESCRIPTOR_MAX;

    #[test]
    fn test_mx_anywhere_3_descriptor() -> HarnessResult<()> {
        let desc = mx_anywhere_3();
        assert_eq!(desc.vendor, 0x046d);
        assert_eq!(desc.product, 0xb025);
        assert_eq!(desc.device_type, DeviceType::Mouse);
        assert_eq!(desc.report_map.len(), 97);
        assert!(desc.report_map.len() <= DESCRIPTOR_MAX);
        desc.validate()
    }

    #[test]
    fn test_builtin_names() -> HarnessResult<()> {
        let registry = builtin_registry()?;
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            [
                "/uhid/command/create",
                "/uhid/command/destroy",
                "/uhid/command/feature_answer",
                "/uhid/command/input",
                "/uhid/event/output",
                "/uhid/event/feature",
                "/uhid/device/mx_anywhere_3",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_mx_anywhere_3_single_create_frame() -> HarnessResult<()> {
        let registry = builtin_registry()?;
        let scenario = registry
            .get("/uhid/device/mx_anywhere_3")
            .ok_or_else(|| crate::HarnessError::Script("missing".into()))?;
        assert_eq!(scenario.script().event_count(), 1);
        assert_eq!(scenario.role(), &Role::Active(Command::Create));
        assert!(scenario.device().is_some());
        Ok(())
    }

    #[test]
    fn test_registering_twice_fails() -> HarnessResult<()> {
        let mut registry = builtin_registry()?;
        assert!(register_builtin(&mut registry).is_err());
        Ok(())
    }
}
