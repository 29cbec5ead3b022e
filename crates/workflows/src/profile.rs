//! House profile model.
//!
//! The profile describes the house and its installed systems. Presence of
//! a device-type key in `systems` means the system is installed; the value
//! optionally carries details (manufacturer, model, fuel, install year).

use homeops_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Seasons for maintenance planning.
///
/// Each season has different maintenance priorities:
/// - Spring: post-winter inspection, AC prep, outdoor systems
/// - Summer: AC maintenance, pest prevention, exterior work
/// - Fall: winterization prep, heating system checks, gutters
/// - Winter: indoor focus, heating efficiency, freeze prevention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// Lowercase season name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Fall => "fall",
            Self::Winter => "winter",
        }
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Season {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spring" => Ok(Self::Spring),
            "summer" => Ok(Self::Summer),
            "fall" | "autumn" => Ok(Self::Fall),
            "winter" => Ok(Self::Winter),
            other => Err(AppError::Config(format!("Unknown season: {}", other))),
        }
    }
}

/// Simplified IECC climate zones.
///
/// These affect which maintenance tasks are relevant: freeze protection
/// in cold zones, moisture control in hot-humid ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateZone {
    Cold,
    Mixed,
    HotHumid,
    HotDry,
}

/// Types of residential buildings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseType {
    SingleFamily,
    Townhouse,
    Condo,
    Duplex,
}

/// Details about an installed system/device.
///
/// The device type is the key in `HouseProfile::systems`; this holds the
/// supplementary information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstalledSystem {
    /// Model number (e.g., "OM9GFRC")
    #[serde(default)]
    pub model: Option<String>,

    /// Brand/manufacturer (e.g., "Carrier")
    #[serde(default)]
    pub manufacturer: Option<String>,

    /// Fuel/power source (e.g., "gas", "electric", "propane")
    #[serde(default)]
    pub fuel_type: Option<String>,

    /// Year the system was installed
    #[serde(default)]
    pub install_year: Option<u32>,

    /// Any additional notes (service contracts, quirks, etc.)
    #[serde(default)]
    pub notes: Option<String>,
}

/// Profile of a house for the advisory workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseProfile {
    /// Identifier for this house (address, nickname, etc.)
    pub name: String,

    /// Year the house was built
    #[serde(default)]
    pub year_built: Option<u32>,

    /// Approximate square footage of living space
    #[serde(default)]
    pub square_footage: Option<u32>,

    /// Climate zone affecting maintenance priorities
    pub climate_zone: ClimateZone,

    /// Type of residential building
    #[serde(default = "default_house_type")]
    pub house_type: HouseType,

    /// Mapping of device_type -> optional details. Presence of a key
    /// indicates the system is installed. BTreeMap keeps iteration
    /// order deterministic for query building and rendering.
    #[serde(default)]
    pub systems: BTreeMap<String, Option<InstalledSystem>>,
}

fn default_house_type() -> HouseType {
    HouseType::SingleFamily
}

impl HouseProfile {
    /// Load a house profile from a JSON file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read house profile {:?}: {}", path, e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse house profile {:?}: {}", path, e))
        })
    }

    /// Check if a system is installed.
    pub fn has_system(&self, device_type: &str) -> bool {
        self.systems.contains_key(device_type)
    }

    /// All installed device types, in deterministic order.
    pub fn installed_device_types(&self) -> Vec<String> {
        self.systems.keys().cloned().collect()
    }

    /// Format the details of one installed device for LLM context.
    ///
    /// Returns an empty string when the device is absent or has no details.
    pub fn device_details(&self, device_type: &str) -> String {
        let Some(Some(system)) = self.systems.get(device_type) else {
            return String::new();
        };

        let mut parts = Vec::new();
        if let Some(manufacturer) = &system.manufacturer {
            parts.push(format!("Manufacturer: {}", manufacturer));
        }
        if let Some(model) = &system.model {
            parts.push(format!("Model: {}", model));
        }
        if let Some(fuel_type) = &system.fuel_type {
            parts.push(format!("Fuel: {}", fuel_type));
        }
        if let Some(install_year) = system.install_year {
            parts.push(format!("Installed: {}", install_year));
        }
        parts.join("\n")
    }
}
