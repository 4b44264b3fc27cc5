//! Device Resolution Tests
//!
//! DMI manufacturer/product strings to device kind, display name and quirk
//! list, through the public detection entry points.

use strixforge::device::detect::device_from_dmi;
use strixforge::device::{DeviceKind, GENERIC_DEVICE_NAME};
use strixforge::{Device, QuirkKind, QuirkRegistry};

#[test]
fn test_vendor_match_ignores_case() {
    for manufacturer in ["BEELINK", "beelink", "Shenzhen Beelink Technology Co., Ltd."] {
        let device = Device::resolve(manufacturer, "GTR9 Pro");
        assert_eq!(device.kind(), DeviceKind::BeelinkGtr9, "{}", manufacturer);
        assert_eq!(device.name(), "Beelink GTR9 Pro");
    }
}

#[test]
fn test_known_vendors() {
    let framework = Device::resolve("Framework", "Desktop (AMD Ryzen AI Max 300 Series)");
    assert_eq!(framework.kind(), DeviceKind::FrameworkDesktop);
    assert_eq!(framework.name(), "Framework Desktop");

    let minisforum = Device::resolve("MINISFORUM", "MS-S1 MAX");
    assert_eq!(minisforum.kind(), DeviceKind::MinisforumS1Max);
    assert_eq!(minisforum.name(), "Minisforum MS-S1 Max");
}

#[test]
fn test_unknown_vendor_uses_product_name() {
    let device = Device::resolve("Acme", "Box 9000");
    assert_eq!(device.kind(), DeviceKind::Generic);
    assert_eq!(device.name(), "Box 9000");
    assert!(device.quirks().is_empty());
    assert_eq!(device.to_string(), "Box 9000 (Acme Box 9000)");
}

#[test]
fn test_unknown_vendor_without_product_gets_generic_label() {
    let device = Device::resolve("Acme", "");
    assert_eq!(device.name(), GENERIC_DEVICE_NAME);

    let from_dmi = device_from_dmi(Some("Acme".to_string()), None).unwrap();
    assert_eq!(from_dmi.name(), GENERIC_DEVICE_NAME);
}

#[test]
fn test_detection_without_manufacturer_fails() {
    assert!(device_from_dmi(None, None).is_err());
}

#[test]
fn test_quirk_lists_per_device() {
    let beelink = Device::resolve("Beelink", "GTR9 Pro");
    let kinds: Vec<(&str, QuirkKind)> = beelink.quirks().iter().map(|q| (q.id.as_str(), q.kind)).collect();
    assert_eq!(
        kinds,
        vec![("e610-blacklist", QuirkKind::Auto), ("tdp-tool", QuirkKind::Auto)]
    );
    assert_eq!(beelink.advisories().count(), 0);

    let framework = Device::resolve("Framework", "Desktop");
    let ids: Vec<&str> = framework.quirks().iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["fan-noise-advisory"]);
    assert!(framework.quirks().iter().all(|q| q.kind == QuirkKind::Advisory));

    let minisforum = Device::resolve("Minisforum", "MS-S1 Max");
    let ids: Vec<&str> = minisforum.quirks().iter().map(|q| q.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["ethernet-unreliable", "usb4-display-issues", "fan-sleep-issues"]
    );
}

#[test]
fn test_builtin_registry_handles_every_auto_quirk() {
    let registry = QuirkRegistry::builtin();
    assert_eq!(registry.len(), 2);
    let beelink = Device::resolve("Beelink", "GTR9 Pro");
    for quirk in beelink.quirks() {
        assert!(registry.contains(&quirk.id));
    }
}

#[test]
fn test_device_serializes() {
    let device = Device::resolve("Beelink", "GTR9 Pro");
    let json = serde_json::to_string(&device).unwrap();
    let back: Device = serde_json::from_str(&json).unwrap();
    assert_eq!(back, device);
}
