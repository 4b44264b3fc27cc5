//! Hardware probing: DMI identity and installed memory.
//!
//! sysfs is tried first because it needs no privileges; `dmidecode` is the
//! fallback for kernels that do not expose `/sys/class/dmi/id`.

use std::path::Path;

use super::Device;
use crate::error::HardwareError;
use crate::system;

const DMI_SYSFS_ROOT: &str = "/sys/class/dmi/id";

/// Probe the machine's manufacturer and product name and resolve a [`Device`].
///
/// Fails only if no manufacturer string can be obtained from either source.
pub async fn detect_device() -> Result<Device, HardwareError> {
    let manufacturer = match read_dmi_field(Path::new(DMI_SYSFS_ROOT), "sys_vendor").await {
        Some(value) => Some(value),
        None => dmidecode_field("system-manufacturer").await,
    };
    let product = match read_dmi_field(Path::new(DMI_SYSFS_ROOT), "product_name").await {
        Some(value) => Some(value),
        None => dmidecode_field("system-product-name").await,
    };

    let device = device_from_dmi(manufacturer, product)?;
    log::info!(
        "[Hardware] detected {} (manufacturer='{}', product='{}')",
        device.name(),
        device.manufacturer(),
        device.model()
    );
    Ok(device)
}

/// Resolve probed DMI strings. A missing manufacturer means detection failed.
pub fn device_from_dmi(
    manufacturer: Option<String>,
    product: Option<String>,
) -> Result<Device, HardwareError> {
    let manufacturer = manufacturer.filter(|m| !m.is_empty()).ok_or_else(|| {
        HardwareError::DmiUnavailable("no system manufacturer in sysfs or dmidecode".to_string())
    })?;
    Ok(Device::resolve(&manufacturer, product.as_deref().unwrap_or_default()))
}

async fn read_dmi_field(root: &Path, field: &str) -> Option<String> {
    match tokio::fs::read_to_string(root.join(field)).await {
        Ok(raw) => Some(raw.trim().to_string()).filter(|v| !v.is_empty()),
        Err(e) => {
            log::debug!("[Hardware] sysfs DMI field {} unavailable: {}", field, e);
            None
        }
    }
}

async fn dmidecode_field(keyword: &str) -> Option<String> {
    match system::exec_sudo("dmidecode", &["-s", keyword]).await {
        Ok(output) => Some(output.stdout_trimmed().to_string()).filter(|v| !v.is_empty()),
        Err(e) => {
            log::debug!("[Hardware] dmidecode -s {} failed: {}", keyword, e);
            None
        }
    }
}

/// Total RAM in GB from `/proc/meminfo`, 0 if it cannot be determined.
pub fn detect_ram_gb() -> u32 {
    match std::fs::read_to_string("/proc/meminfo") {
        Ok(content) => parse_meminfo_gb(&content).unwrap_or(0),
        Err(_) => 0,
    }
}

/// `MemTotal` converted from kB to whole GB.
pub fn parse_meminfo_gb(content: &str) -> Option<u32> {
    content
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| (kb / (1024 * 1024)) as u32)
}
