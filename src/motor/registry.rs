// Motor registry: load-once mapping from motor name to its descriptor
//
// Loaded from a TOML file with one [[motor]] table per servo. After loading
// the registry is never mutated; share it behind an Arc.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rotation sense of a motor relative to the logical angular convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i8")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Direction::Forward),
            -1 => Ok(Direction::Reverse),
            other => Err(format!("direction must be 1 or -1, got {}", other)),
        }
    }
}

/// Configured calibration bounds, reported alongside live state
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Calibration {
    pub min_pulse: f64,
    pub max_pulse: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotorDescriptor {
    pub name: String,
    /// Controller channel the servo is wired to
    pub hardware_id: u8,
    /// Device number used by the Pololu protocol
    pub protocol_id: u8,
    pub direction: Direction,
    pub pulse_min: f64,
    pub pulse_max: f64,
    /// Angle covered by [pulse_min, pulse_max]
    pub range_radians: f64,
    pub calibration: Calibration,
}

/// Error types for registry loading
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to read motor config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse motor config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Motor {0} is defined more than once")]
    DuplicateName(String),

    #[error("Invalid motor {name}: {reason}")]
    Invalid { name: String, reason: String },
}

// On-disk layout. Field names follow the controller configuration files:
// `min`/`max` are the operational pulse bounds.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "motor")]
    motors: Vec<MotorEntry>,
}

#[derive(Debug, Deserialize)]
struct MotorEntry {
    name: String,
    motor_id: u8,
    #[serde(default)]
    pololu_id: u8,
    direction: Direction,
    min: f64,
    max: f64,
    #[serde(default = "default_range_radians")]
    range_radians: f64,
    calibration: Calibration,
}

fn default_range_radians() -> f64 {
    PI
}

impl MotorEntry {
    fn into_descriptor(self) -> Result<MotorDescriptor, RegistryError> {
        let invalid = |reason: String| RegistryError::Invalid {
            name: self.name.clone(),
            reason,
        };

        if self.name.is_empty() {
            return Err(invalid("name cannot be empty".to_string()));
        }
        if !(self.min.is_finite() && self.max.is_finite()) || self.min >= self.max {
            return Err(invalid(format!(
                "min ({}) must be below max ({})",
                self.min, self.max
            )));
        }
        if !(self.range_radians.is_finite() && self.range_radians > 0.0) {
            return Err(invalid(format!(
                "range_radians must be positive, got {}",
                self.range_radians
            )));
        }

        Ok(MotorDescriptor {
            name: self.name,
            hardware_id: self.motor_id,
            protocol_id: self.pololu_id,
            direction: self.direction,
            pulse_min: self.min,
            pulse_max: self.max,
            range_radians: self.range_radians,
            calibration: self.calibration,
        })
    }
}

/// Immutable name -> descriptor map, iterated in name order
#[derive(Debug, Clone, Default)]
pub struct MotorRegistry {
    motors: BTreeMap<String, MotorDescriptor>,
}

impl MotorRegistry {
    /// Build a registry from descriptors, rejecting duplicate names
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = MotorDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut motors = BTreeMap::new();
        for motor in descriptors {
            if motors.contains_key(&motor.name) {
                return Err(RegistryError::DuplicateName(motor.name));
            }
            motors.insert(motor.name.clone(), motor);
        }
        Ok(Self { motors })
    }

    /// Parse a registry from TOML text
    pub fn from_toml(text: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(text)?;
        let descriptors = file
            .motors
            .into_iter()
            .map(MotorEntry::into_descriptor)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_descriptors(descriptors)
    }

    /// Load the registry from a TOML file
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        info!("Loading motor config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_toml(&text)?;
        for motor in registry.iter() {
            debug!(
                "Loaded motor {} (channel {}, device {})",
                motor.name, motor.hardware_id, motor.protocol_id
            );
        }
        info!("Loaded {} motors", registry.len());
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&MotorDescriptor> {
        self.motors.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotorDescriptor> {
        self.motors.values()
    }

    pub fn len(&self) -> usize {
        self.motors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[[motor]]
name = "neck_yaw"
motor_id = 0
pololu_id = 12
direction = 1
min = 1000
max = 2000
[motor.calibration]
min_pulse = 1100
max_pulse = 1900

[[motor]]
name = "jaw"
motor_id = 3
direction = -1
min = 1200
max = 1800
range_radians = 1.0
[motor.calibration]
min_pulse = 1250
max_pulse = 1750
"#;

    #[test]
    fn test_parse_registry() {
        let registry = MotorRegistry::from_toml(CONFIG).unwrap();
        assert_eq!(registry.len(), 2);

        let neck = registry.get("neck_yaw").unwrap();
        assert_eq!(neck.hardware_id, 0);
        assert_eq!(neck.protocol_id, 12);
        assert_eq!(neck.direction, Direction::Forward);
        assert_eq!(neck.range_radians, PI);
        assert_eq!(neck.calibration.max_pulse, 1900.0);

        let jaw = registry.get("jaw").unwrap();
        assert_eq!(jaw.direction, Direction::Reverse);
        assert_eq!(jaw.protocol_id, 0);
        assert_eq!(jaw.range_radians, 1.0);
    }

    #[test]
    fn test_iteration_is_name_ordered() {
        let registry = MotorRegistry::from_toml(CONFIG).unwrap();
        let names: Vec<&str> = registry.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["jaw", "neck_yaw"]);
    }

    #[test]
    fn test_unknown_name() {
        let registry = MotorRegistry::from_toml(CONFIG).unwrap();
        assert!(registry.get("elbow").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let doubled = format!("{}\n{}", CONFIG, CONFIG.replace("jaw", "jaw2"));
        match MotorRegistry::from_toml(&doubled) {
            Err(RegistryError::DuplicateName(name)) => assert_eq!(name, "neck_yaw"),
            other => panic!("expected duplicate error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_direction_rejected() {
        let bad = CONFIG.replace("direction = -1", "direction = 0");
        assert!(matches!(
            MotorRegistry::from_toml(&bad),
            Err(RegistryError::Parse(_))
        ));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let bad = CONFIG.replace("min = 1200", "min = 1900");
        assert!(matches!(
            MotorRegistry::from_toml(&bad),
            Err(RegistryError::Invalid { ref name, .. }) if name == "jaw"
        ));
    }

    #[test]
    fn test_shipped_config_parses() {
        let registry = MotorRegistry::from_toml(include_str!("../../config/motors.toml")).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.iter().all(|m| m.pulse_min < m.pulse_max));
    }

    #[test]
    fn test_missing_file() {
        let err = MotorRegistry::load(Path::new("/nonexistent/motors.toml")).unwrap_err();
        assert!(matches!(err, RegistryError::Read { .. }));
    }
}
