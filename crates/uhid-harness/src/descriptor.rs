//! Emulated device identity.

use serde::{Deserialize, Serialize};
use uhid_protocol::{Create2Request, DESCRIPTOR_MAX, UhidEvent, bus};
use uhid_session::{CreateParams, DeviceType};

use crate::error::{HarnessError, HarnessResult};

/// Identity and report map of the device a scenario creates.
///
/// The default value is the minimal descriptor used when a scenario names
/// none: empty name, zero identifiers, no type and an empty report map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDescriptor {
    pub name: String,
    pub vendor: u32,
    pub product: u32,
    pub version: u32,
    pub country: u32,
    pub device_type: DeviceType,
    pub report_map: Vec<u8>,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn with_vendor(mut self, vendor: u32) -> Self {
        self.vendor = vendor;
        self
    }

    pub fn with_product(mut self, product: u32) -> Self {
        self.product = product;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_country(mut self, country: u32) -> Self {
        self.country = country;
        self
    }

    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Sets the HID report map.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidDescriptor`] if the map exceeds the
    /// UHID descriptor limit.
    pub fn with_report_map(mut self, report_map: impl Into<Vec<u8>>) -> HarnessResult<Self> {
        self.report_map = report_map.into();
        self.validate()?;
        Ok(self)
    }

    /// Checks limits a deserialized descriptor may violate.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidDescriptor`] on an oversized report map.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.report_map.len() > DESCRIPTOR_MAX {
            return Err(HarnessError::InvalidDescriptor(format!(
                "{}: report map is {} bytes, limit is {DESCRIPTOR_MAX}",
                self.name,
                self.report_map.len()
            )));
        }
        Ok(())
    }

    pub fn to_create_params(&self) -> CreateParams {
        CreateParams {
            name: self.name.clone(),
            source: None,
            destination: None,
            vendor: self.vendor,
            product: self.product,
            version: self.version,
            country: self.country,
            device_type: self.device_type,
            report_map: self.report_map.clone(),
        }
    }

    /// The CREATE2 event a conforming session emits for this descriptor.
    pub fn create_event(&self) -> UhidEvent {
        UhidEvent::Create2(Create2Request {
            name: self.name.clone(),
            phys: String::new(),
            uniq: String::new(),
            bus: bus::BLUETOOTH,
            vendor: self.vendor,
            product: self.product,
            version: self.version,
            country: self.country,
            rd_data: self.report_map.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_matches_default_params() {
        assert_eq!(
            DeviceDescriptor::minimal().to_create_params(),
            CreateParams::default()
        );
    }

    #[test]
    fn test_builder() -> HarnessResult<()> {
        let desc = DeviceDescriptor::new("pad")
            .with_vendor(0x1234)
            .with_product(0x5678)
            .with_version(2)
            .with_device_type(DeviceType::Gaming)
            .with_report_map([0x05, 0x01])?;
        let params = desc.to_create_params();
        assert_eq!(params.name, "pad");
        assert_eq!(params.vendor, 0x1234);
        assert_eq!(params.product, 0x5678);
        assert_eq!(params.device_type, DeviceType::Gaming);
        assert_eq!(params.report_map, vec![0x05, 0x01]);
        Ok(())
    }

    #[test]
    fn test_oversized_report_map_rejected() {
        let result = DeviceDescriptor::new("big").with_report_map(vec![0u8; DESCRIPTOR_MAX + 1]);
        assert!(matches!(result, Err(HarnessError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_deserialize_partial() -> Result<(), serde_json::Error> {
        let desc: DeviceDescriptor =
            serde_json::from_str(r#"{"name":"kbd","vendor":1,"device_type":"keyboard"}"#)?;
        assert_eq!(desc.device_type, DeviceType::Keyboard);
        assert_eq!(desc.product, 0);
        assert!(desc.report_map.is_empty());
        Ok(())
    }
}
