//! Device snapshots produced by one enumeration pass.

use serde::{Deserialize, Serialize};

/// One named port exposed by a device in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stream {
    pub name: String,
}

impl Stream {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Direction summary of a [`DeviceInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Input,
    Output,
    Duplex,
    /// No usable ports.
    None,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeviceType::Input => "input",
            DeviceType::Output => "output",
            DeviceType::Duplex => "duplex",
            DeviceType::None => "none",
        };
        f.write_str(s)
    }
}

/// A sequencer client and its classified MIDI ports.
///
/// `id` is `hw:<card>` when the client is backed by a sound card and empty
/// otherwise. A duplex port is listed in both `inputs` and `outputs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub inputs: Vec<Stream>,
    pub outputs: Vec<Stream>,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn device_type(&self) -> DeviceType {
        match (self.inputs.is_empty(), self.outputs.is_empty()) {
            (false, false) => DeviceType::Duplex,
            (false, true) => DeviceType::Input,
            (true, false) => DeviceType::Output,
            (true, true) => DeviceType::None,
        }
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|s| s.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth() -> DeviceInfo {
        DeviceInfo {
            id: "hw:2".to_string(),
            name: "TestSynth".to_string(),
            inputs: vec![Stream::new("Port A")],
            outputs: vec![Stream::new("Port A")],
        }
    }

    #[test]
    fn test_device_type() {
        assert_eq!(synth().device_type(), DeviceType::Duplex);

        let mut keys = DeviceInfo::new("Keys");
        assert_eq!(keys.device_type(), DeviceType::None);
        keys.inputs.push(Stream::new("Keys MIDI 1"));
        assert_eq!(keys.device_type(), DeviceType::Input);

        let mut out = DeviceInfo::new("Out");
        out.outputs.push(Stream::new("Out 1"));
        assert_eq!(out.device_type(), DeviceType::Output);
    }

    #[test]
    fn test_stream_lookup() {
        let info = synth();
        assert!(info.has_input("Port A"));
        assert!(info.has_output("Port A"));
        assert!(!info.has_input("Port B"));
    }

    #[test]
    fn test_serialization_preserves_port_order() {
        let info = DeviceInfo {
            id: String::new(),
            name: "Multi".to_string(),
            inputs: vec![Stream::new("In 2"), Stream::new("In 1")],
            outputs: vec![],
        };
        let bytes = bincode::serialize(&info).unwrap();
        let decoded: DeviceInfo = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(decoded.inputs[0].name, "In 2");
    }

    #[test]
    fn test_device_type_display() {
        assert_eq!(DeviceType::Duplex.to_string(), "duplex");
        assert_eq!(DeviceType::None.to_string(), "none");
    }
}
