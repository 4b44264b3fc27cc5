//! Loose package-version comparison for pacman-style version strings.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static NUMERIC_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Numeric components of a version string, ignoring the pkgrel and any build suffix.
///
/// `"25.3.1-2"` -> `[25, 3, 1]`, `"6.18.2-1-cachyos"` -> `[6, 18, 2]`.
pub fn parse_version(version: &str) -> Vec<u64> {
    let core = version
        .split(['-', '+', '_'])
        .next()
        .unwrap_or_default();
    NUMERIC_RUN
        .find_iter(core)
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .collect()
}

/// Compare component-wise, padding the shorter side with zeros.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = parse_version(a);
    let right = parse_version(b);
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn version_at_least(installed: &str, minimum: &str) -> bool {
    compare_versions(installed, minimum) != Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_release_suffix() {
        assert_eq!(parse_version("6.18.2-1-cachyos"), vec![6, 18, 2]);
        assert_eq!(parse_version("25.3.0+git"), vec![25, 3, 0]);
        assert!(parse_version("").is_empty());
    }

    #[test]
    fn test_compare_pads_short_versions() {
        assert_eq!(compare_versions("21", "21.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("6.17.9", "6.18"), Ordering::Less);
        assert_eq!(compare_versions("25.10.1", "25.3"), Ordering::Greater);
    }

    #[test]
    fn test_version_at_least() {
        assert!(version_at_least("6.18.0-2-cachyos", "6.18"));
        assert!(!version_at_least("20.1.8", "21"));
    }
}
