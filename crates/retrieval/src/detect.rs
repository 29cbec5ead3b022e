//! Device-type detection from query text.
//!
//! Maps keyword hits in a free-text question to the device types used as
//! metadata filters during retrieval. Multiple matches are returned as a
//! union — a question touching two devices filters on both.

/// Keyword table mapping device types to the query terms that imply them.
///
/// New devices are additive rows here; detection logic never changes.
const DEVICE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "furnace",
        &[
            "furnace",
            "merv",
            "heating",
            "air filter",
            "pilot light",
            "blower",
            "burner",
        ],
    ),
    (
        "hrv",
        &[
            "hrv",
            "heat recovery",
            "ventilation",
            "air exchanger",
            "stale air",
        ],
    ),
    (
        "humidifier",
        &["humidifier", "humidity", "dry air", "humidistat"],
    ),
    (
        "water_heater",
        &["water heater", "hot water", "anode rod", "tank temperature"],
    ),
    (
        "water_softener",
        &["water softener", "softener", "salt", "hard water", "brine"],
    ),
    (
        "thermostat",
        &["thermostat", "setpoint", "temperature schedule"],
    ),
    (
        "air_conditioner",
        &["air conditioner", "a/c", "ac unit", "cooling", "condenser"],
    ),
];

/// Detect candidate device types from keyword matches in a query.
///
/// Matching is case-insensitive substring containment, the same rule the
/// hazard registry uses. Returns device types in table order; an empty
/// result means the caller should query unfiltered.
pub fn detect_device_types(query: &str) -> Vec<String> {
    let query_lower = query.to_lowercase();

    DEVICE_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| query_lower.contains(kw)))
        .map(|(device, _)| (*device).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_furnace_keywords() {
        assert!(detect_device_types("How do I change my furnace filter?")
            .contains(&"furnace".to_string()));
        assert!(detect_device_types("What MERV rating should I use?")
            .contains(&"furnace".to_string()));
        assert!(detect_device_types("My heating system isn't working")
            .contains(&"furnace".to_string()));
    }

    #[test]
    fn test_detects_hrv_keywords() {
        assert!(detect_device_types("How do I use my HRV?").contains(&"hrv".to_string()));
        assert!(detect_device_types("Ventilation settings in winter").contains(&"hrv".to_string()));
    }

    #[test]
    fn test_detects_water_heater_keywords() {
        assert!(detect_device_types("Hot water tank temperature")
            .contains(&"water_heater".to_string()));
        assert!(detect_device_types("My water heater is making noise")
            .contains(&"water_heater".to_string()));
    }

    #[test]
    fn test_detects_water_softener_keywords() {
        assert!(detect_device_types("How much salt for softener?")
            .contains(&"water_softener".to_string()));
        assert!(
            detect_device_types("Hard water problems").contains(&"water_softener".to_string())
        );
    }

    #[test]
    fn test_detects_multiple_devices() {
        // Humidity relates to both humidifier and HRV
        let result = detect_device_types("What humidity level for HRV?");
        assert!(result.contains(&"hrv".to_string()));
        assert!(result.contains(&"humidifier".to_string()));
    }

    #[test]
    fn test_returns_empty_for_generic_question() {
        assert!(detect_device_types("How do I save money?").is_empty());
        assert!(detect_device_types("General home upkeep tips").is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        assert!(detect_device_types("FURNACE filter").contains(&"furnace".to_string()));
        assert!(detect_device_types("HRV settings").contains(&"hrv".to_string()));
    }
}
