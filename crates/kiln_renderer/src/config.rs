//! Device configuration.

use kiln_core::{KilnError, KilnResult};
use kiln_math::Vec4;
use serde::{Deserialize, Serialize};

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 32;

/// Settings fixed at device creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Worker threads in the device pool; 0 uses one per logical core.
    pub num_threads: usize,
    /// Edge length of the square tiles a frame is split into.
    pub tile_size: u32,
    /// Render surfaces whose material is missing or invalid.
    pub allow_invalid_materials: bool,
    /// Color used for those surfaces.
    pub invalid_material_color: [f32; 4],
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            tile_size: DEFAULT_TILE_SIZE,
            allow_invalid_materials: true,
            invalid_material_color: [1.0, 0.0, 1.0, 1.0],
        }
    }
}

impl DeviceConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> KilnResult<Self> {
        let config: DeviceConfig = serde_json::from_str(json).map_err(|e| KilnError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> KilnResult<()> {
        if self.tile_size == 0 {
            return Err(KilnError::Config("tile_size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_invalid_materials(mut self, allow: bool, color: Vec4) -> Self {
        self.allow_invalid_materials = allow;
        self.invalid_material_color = color.to_array();
        self
    }

    pub fn invalid_material_color(&self) -> Vec4 {
        Vec4::from_array(self.invalid_material_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.tile_size, 32);
        assert!(config.allow_invalid_materials);
        assert_eq!(config.invalid_material_color(), Vec4::new(1.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_from_json_partial() {
        let config = DeviceConfig::from_json(r#"{ "num_threads": 2, "tile_size": 8 }"#).unwrap();
        assert_eq!(config.num_threads, 2);
        assert_eq!(config.tile_size, 8);
        assert!(config.allow_invalid_materials);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(DeviceConfig::from_json("{ not json"), Err(KilnError::Config(_))));
        assert!(DeviceConfig::from_json(r#"{ "tile_size": 0 }"#).is_err());
    }

    #[test]
    fn test_builder() {
        let config = DeviceConfig::default()
            .with_num_threads(3)
            .with_tile_size(16)
            .with_invalid_materials(false, Vec4::ONE);
        assert_eq!(config.num_threads, 3);
        assert_eq!(config.tile_size, 16);
        assert!(!config.allow_invalid_materials);

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(DeviceConfig::from_json(&json).unwrap(), config);
    }
}
