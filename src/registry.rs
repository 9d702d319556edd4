//! Module registry.
//!
//! Static description of the measurement modules and their markers,
//! loaded once at startup. Markers may carry default zone boundaries used
//! when a request does not supply its own.

use crate::models::ZoneBoundaries;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Root of `module_registry.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleRegistry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_version: Option<String>,

    #[serde(default)]
    pub modules: Vec<ModuleEntry>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One measurement module (e.g. a stress test protocol).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub module_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub markers: Vec<MarkerEntry>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One marker recorded by a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerEntry {
    pub marker_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Default boundaries for this marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_boundaries: Option<ZoneBoundaries>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModuleRegistry {
    /// Load the registry from disk.
    ///
    /// A missing or unparsable registry is an error so that a broken
    /// deployment fails loudly instead of running without defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "Module registry file not found at: {}. Ensure the registry exists before running.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read module registry: {}", path.display()))?;

        let registry: ModuleRegistry = serde_json::from_str(&content).with_context(|| {
            format!("Module registry at {} is not valid JSON", path.display())
        })?;

        for module in &registry.modules {
            for marker in &module.markers {
                if let Some(boundaries) = &marker.zone_boundaries {
                    boundaries.validate().with_context(|| {
                        format!(
                            "Invalid zone boundaries for {}/{} in {}",
                            module.module_id,
                            marker.marker_id,
                            path.display()
                        )
                    })?;
                }
            }
        }

        Ok(registry)
    }

    pub fn marker(&self, module_id: &str, marker_id: &str) -> Option<&MarkerEntry> {
        self.modules
            .iter()
            .find(|m| m.module_id == module_id)?
            .markers
            .iter()
            .find(|k| k.marker_id == marker_id)
    }

    /// Default boundaries registered for a marker, if any.
    pub fn default_boundaries(&self, module_id: &str, marker_id: &str) -> Option<ZoneBoundaries> {
        self.marker(module_id, marker_id)
            .and_then(|marker| marker.zone_boundaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REGISTRY: &str = r#"{
        "registry_version": "1.0",
        "modules": [
            {
                "module_id": "vtf_stress_test",
                "name": "VTF Stress Test",
                "owner": "lab-a",
                "markers": [
                    {
                        "marker_id": "vo2max",
                        "unit": "ml/kg/min",
                        "zone_boundaries": {"healthy_min": 35.0, "healthy_max": 60.0, "vulnerability_margin": 5.0}
                    },
                    {"marker_id": "hr_peak"}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_load_and_lookup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("module_registry.json");
        std::fs::write(&path, REGISTRY).unwrap();

        let registry = ModuleRegistry::load(&path).unwrap();
        assert_eq!(registry.registry_version.as_deref(), Some("1.0"));

        let b = registry.default_boundaries("vtf_stress_test", "vo2max").unwrap();
        assert_eq!(b.healthy_min, 35.0);
        assert!(registry.default_boundaries("vtf_stress_test", "hr_peak").is_none());
        assert!(registry.default_boundaries("other", "vo2max").is_none());
        assert_eq!(
            registry.marker("vtf_stress_test", "vo2max").unwrap().unit.as_deref(),
            Some("ml/kg/min")
        );
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let registry: ModuleRegistry = serde_json::from_str(REGISTRY).unwrap();
        let json = serde_json::to_value(&registry).unwrap();
        assert_eq!(json["modules"][0]["owner"], "lab-a");
    }

    #[test]
    fn test_missing_registry_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = ModuleRegistry::load(&tmp.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_registry_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("module_registry.json");
        std::fs::write(&path, "{ broken").unwrap();
        assert!(ModuleRegistry::load(&path).is_err());

        std::fs::write(
            &path,
            r#"{"modules": [{"module_id": "m", "markers": [{"marker_id": "k", "zone_boundaries": {"healthy_min": 5, "healthy_max": 1, "vulnerability_margin": 0}}]}]}"#,
        )
        .unwrap();
        assert!(ModuleRegistry::load(&path).is_err());
    }
}
