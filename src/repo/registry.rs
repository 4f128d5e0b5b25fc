//! Region registry file (JSON array of region entries)

use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::{RegionEntry, RegionRegistry};

pub fn load_registry(path: &Path) -> Result<RegionRegistry> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read registry {}", path.display()))?;
    let entries: Vec<RegionEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse registry {}", path.display()))?;
    Ok(RegionRegistry::new(entries))
}

/// Write the registry back, keeping every field each entry carries
pub fn save_registry(registry: &RegionRegistry, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let entries: Vec<&RegionEntry> = registry.iter().collect();
    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(path, json).with_context(|| format!("failed to write registry {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_round_trip_keeps_extras() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.json");
        std::fs::write(
            &path,
            r#"[
                {"region": "north", "lat": 55.0, "lon": 9.5, "elevation": 40, "name": "North"},
                {"region": "south", "lat": 47.5, "lon": 11.0, "pvgis_ghi_mean": null}
            ]"#,
        )
        .unwrap();

        let mut registry = load_registry(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("north").unwrap().elevation, Some(40.0));
        assert_eq!(registry.static_feature("south", "pvgis_ghi_mean"), None);

        for entry in registry.iter_mut() {
            entry.set_static("gwa_mean_speed_100m", Some(7.0));
        }
        save_registry(&registry, &path).unwrap();

        let reloaded = load_registry(&path).unwrap();
        assert_eq!(reloaded, registry);
        assert_eq!(
            reloaded.get("north").unwrap().extra["name"],
            serde_json::Value::String("North".into())
        );
    }

    #[test]
    fn test_missing_registry_is_error() {
        assert!(load_registry(Path::new("/nonexistent/regions.json")).is_err());
    }
}
