//! Device and quirk model.
//!
//! A [`Device`] is plain composition: a [`DeviceKind`] tag plus the raw DMI
//! strings and the fixed quirk list for that kind. Quirks are data only; the
//! actions behind Auto quirks live in [`quirks::QuirkRegistry`].

pub mod detect;
pub mod quirks;

pub use detect::{detect_device, detect_ram_gb};
pub use quirks::{apply_device_quirks, QuirkHandler, QuirkRegistry, QuirkReport};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Display label used when neither a known vendor nor a product name is available.
pub const GENERIC_DEVICE_NAME: &str = "Generic Strix Halo Device";

/// Known Strix Halo machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    BeelinkGtr9,
    FrameworkDesktop,
    MinisforumS1Max,
    Generic,
}

/// Resolution table: lower-cased manufacturer substring -> kind. First match wins.
const VENDOR_PATTERNS: &[(&str, DeviceKind)] = &[
    ("beelink", DeviceKind::BeelinkGtr9),
    ("framework", DeviceKind::FrameworkDesktop),
    ("minisforum", DeviceKind::MinisforumS1Max),
];

impl DeviceKind {
    /// Resolve a manufacturer string against the vendor table.
    pub fn from_manufacturer(manufacturer: &str) -> Self {
        let lowered = manufacturer.to_lowercase();
        VENDOR_PATTERNS
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern))
            .map(|(_, kind)| *kind)
            .unwrap_or(DeviceKind::Generic)
    }

    /// Fixed display name, `None` for the generic kind.
    pub fn display_name(&self) -> Option<&'static str> {
        match self {
            DeviceKind::BeelinkGtr9 => Some("Beelink GTR9 Pro"),
            DeviceKind::FrameworkDesktop => Some("Framework Desktop"),
            DeviceKind::MinisforumS1Max => Some("Minisforum MS-S1 Max"),
            DeviceKind::Generic => None,
        }
    }

    /// The quirk list every device of this kind carries.
    pub fn quirks(&self) -> Vec<Quirk> {
        match self {
            DeviceKind::BeelinkGtr9 => vec![
                Quirk::auto(
                    "e610-blacklist",
                    "Blacklist Intel E610 Ethernet driver (crashes under GPU load)",
                ),
                Quirk::auto("tdp-tool", "Install RyzenAdj for TDP control"),
            ],
            DeviceKind::FrameworkDesktop => vec![Quirk::advisory(
                "fan-noise-advisory",
                "At 140W TDP, fan noise is louder. Consider setting TDP to 110-120W in BIOS.",
            )],
            DeviceKind::MinisforumS1Max => vec![
                Quirk::advisory(
                    "ethernet-unreliable",
                    "Onboard Ethernet may be unreliable. Consider using a USB Ethernet adapter.",
                ),
                Quirk::advisory(
                    "usb4-display-issues",
                    "USB4 display output may not work. Use HDMI instead.",
                ),
                Quirk::advisory(
                    "fan-sleep-issues",
                    "Fan may run loud during sleep. Check BIOS for sleep settings.",
                ),
            ],
            DeviceKind::Generic => Vec::new(),
        }
    }
}

/// Whether a quirk is executed automatically or only surfaced as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuirkKind {
    Auto,
    Advisory,
}

/// A hardware-specific remediation. Pure data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quirk {
    pub id: String,
    pub description: String,
    pub kind: QuirkKind,
}

impl Quirk {
    pub fn auto(id: &str, description: &str) -> Self {
        Quirk {
            id: id.to_string(),
            description: description.to_string(),
            kind: QuirkKind::Auto,
        }
    }

    pub fn advisory(id: &str, description: &str) -> Self {
        Quirk {
            id: id.to_string(),
            description: description.to_string(),
            kind: QuirkKind::Advisory,
        }
    }

    pub fn is_auto(&self) -> bool {
        self.kind == QuirkKind::Auto
    }
}

/// Detected hardware. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    kind: DeviceKind,
    manufacturer: String,
    model: String,
    quirks: Vec<Quirk>,
}

impl Device {
    /// Build a device of a known kind; the quirk list is fixed at construction.
    pub fn new(kind: DeviceKind, manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        Device {
            kind,
            manufacturer: manufacturer.into(),
            model: model.into(),
            quirks: kind.quirks(),
        }
    }

    /// Map raw DMI strings to a device via the ordered vendor table.
    pub fn resolve(manufacturer: &str, product: &str) -> Self {
        Device::new(DeviceKind::from_manufacturer(manufacturer), manufacturer, product)
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn name(&self) -> String {
        match self.kind.display_name() {
            Some(name) => name.to_string(),
            None if !self.model.trim().is_empty() => self.model.clone(),
            None => GENERIC_DEVICE_NAME.to_string(),
        }
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn quirks(&self) -> &[Quirk] {
        &self.quirks
    }

    pub fn advisories(&self) -> impl Iterator<Item = &Quirk> {
        self.quirks.iter().filter(|q| !q.is_auto())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name(), self.manufacturer, self.model)
    }
}
