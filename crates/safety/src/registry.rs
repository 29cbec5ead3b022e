//! Static hazard-category registry.
//!
//! Each category is tagged data: direct keywords, co-occurrence groups,
//! the professional to refer to, and the safety message to show. Adding a
//! hazard category is an additive row here, never a new code path.
//!
//! Matching rules:
//! - A direct keyword fires if it appears anywhere in the text.
//! - A co-occurrence group fires if ALL of its terms appear anywhere in
//!   the text, in any order, adjacent or not. The terms are individually
//!   benign ("burning", "electrical panel") but jointly hazardous.
//! - Matching is case-insensitive.

use serde::{Deserialize, Serialize};

/// Named classes of physically dangerous issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    GasLeak,
    CarbonMonoxide,
    ElectricalHazard,
    Structural,
    PressurizedValve,
}

impl HazardKind {
    /// Stable tag used in logs and serialized assessments.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GasLeak => "gas_leak",
            Self::CarbonMonoxide => "carbon_monoxide",
            Self::ElectricalHazard => "electrical_hazard",
            Self::Structural => "structural",
            Self::PressurizedValve => "pressurized_valve",
        }
    }
}

impl std::fmt::Display for HazardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hazard category record.
#[derive(Debug)]
pub struct HazardCategory {
    pub kind: HazardKind,

    /// Direct keywords; any single hit fires the category
    pub keywords: &'static [&'static str],

    /// Co-occurrence groups; a group fires when all its terms are present
    pub cooccurrence: &'static [&'static [&'static str]],

    /// Professional to refer the user to
    pub professional: &'static str,

    /// Safety message shown on a stop
    pub message: &'static str,
}

/// The hazard registry, loaded once as static data.
pub static HAZARD_REGISTRY: &[HazardCategory] = &[
    HazardCategory {
        kind: HazardKind::GasLeak,
        keywords: &[
            "gas smell",
            "smell gas",
            "smells like gas",
            "rotten egg",
            "sulfur smell",
            "gas leak",
            "leaking gas",
            "gas odor",
            "natural gas smell",
        ],
        cooccurrence: &[
            &["hissing", "gas line"],
            &["hissing", "gas meter"],
        ],
        professional: "licensed gas technician or your gas utility company",
        message: "SAFETY ALERT: A gas smell or suspected gas leak is a serious emergency. \
                  Do NOT attempt any DIY troubleshooting. Leave the area immediately, \
                  do not operate any electrical switches, and call your gas utility's \
                  emergency line or 911 from outside your home.",
    },
    HazardCategory {
        kind: HazardKind::CarbonMonoxide,
        keywords: &[
            "co detector",
            "co alarm",
            "carbon monoxide alarm",
            "carbon monoxide detector",
            "co going off",
            "co beeping",
            "carbon monoxide beeping",
            "co poisoning",
        ],
        cooccurrence: &[&["carbon monoxide", "headache"]],
        professional: "licensed HVAC technician and your fire department",
        message: "SAFETY ALERT: A carbon monoxide alarm indicates a potentially \
                  life-threatening situation. Evacuate all people and pets immediately. \
                  Call 911 or your fire department from outside. Do NOT re-enter the \
                  home until emergency services have cleared it.",
    },
    HazardCategory {
        kind: HazardKind::ElectricalHazard,
        keywords: &[
            "sparking",
            "electrical spark",
            "melting wire",
            "exposed wire",
            "outlet sparking",
            "breaker keeps tripping",
            "electrical fire",
            "got shocked",
            "electrical shock",
            "buzzing outlet",
            "hot outlet",
            "scorched outlet",
            "burning outlet",
        ],
        cooccurrence: &[
            &["burning", "electrical panel"],
            &["burning smell", "outlet"],
            &["burning smell", "breaker"],
        ],
        professional: "licensed electrician",
        message: "SAFETY ALERT: Electrical hazards can cause fires, injury, or death. \
                  Do NOT touch any sparking or damaged electrical components. Turn off \
                  the breaker for the affected circuit if you can safely do so. \
                  Call a licensed electrician immediately.",
    },
    HazardCategory {
        kind: HazardKind::Structural,
        keywords: &[
            "foundation crack",
            "load bearing wall",
            "sagging floor",
            "ceiling collapse",
            "structural crack",
            "beam damage",
            "joist cracking",
        ],
        cooccurrence: &[
            &["crack", "load bearing"],
            &["sagging", "beam"],
        ],
        professional: "licensed structural engineer or general contractor",
        message: "SAFETY ALERT: Structural issues require professional assessment. \
                  Do NOT attempt any structural modifications or repairs yourself. \
                  Avoid the affected area if there are signs of active damage.",
    },
    HazardCategory {
        kind: HazardKind::PressurizedValve,
        keywords: &[
            "gas valve stuck",
            "main gas valve",
            "gas shutoff",
            "water main break",
            "burst pipe",
            "main water valve",
            "relief valve leaking",
        ],
        cooccurrence: &[&["stuck", "shutoff valve"]],
        professional: "licensed plumber or gas technician",
        message: "SAFETY ALERT: Main utility valve issues should be handled by \
                  a professional. If you're experiencing active flooding or can \
                  smell gas, call emergency services.",
    },
];

/// One fired hazard category, with the term(s) that fired it.
#[derive(Debug, Clone)]
pub struct HazardMatch {
    pub kind: HazardKind,

    /// The keyword or joined co-occurrence terms that matched
    pub matched: String,

    pub professional: &'static str,
    pub message: &'static str,
}

/// Scan text against the hazard registry.
///
/// Returns every fired category in registry order. Each detection is
/// logged with the category tag for auditability; the scanned text itself
/// is never logged or persisted.
pub fn scan_hazards(text: &str) -> Vec<HazardMatch> {
    let text_lower = text.to_lowercase();
    let mut matches = Vec::new();

    for category in HAZARD_REGISTRY {
        if let Some(matched) = match_category(category, &text_lower) {
            tracing::warn!(
                category = category.kind.as_str(),
                matched = matched.as_str(),
                "Hazard category fired"
            );
            matches.push(HazardMatch {
                kind: category.kind,
                matched,
                professional: category.professional,
                message: category.message,
            });
        }
    }

    matches
}

fn match_category(category: &HazardCategory, text_lower: &str) -> Option<String> {
    for keyword in category.keywords {
        if text_lower.contains(keyword) {
            return Some((*keyword).to_string());
        }
    }

    for group in category.cooccurrence {
        if group.iter().all(|term| text_lower.contains(term)) {
            return Some(group.join(" + "));
        }
    }

    None
}
