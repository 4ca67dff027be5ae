use std::borrow::Cow;

const STANDARD_CLASSIFICATIONS: [&str; 23] = [
    "Created, never classified",
    "Unassigned",
    "Ground",
    "Low Vegetation",
    "Medium Vegetation",
    "High Vegetation",
    "Building",
    "Low Point (noise)",
    "Model Key-point",
    "Water",
    "Rail",
    "Road Surface",
    "Overlap Points",
    "Wire - Guard (Shield)",
    "Wire - Conductor (Phase)",
    "Transmission Tower",
    "Wire-structure Connector",
    "Bridge Deck",
    "High Noise",
    "Overhead Structure",
    "Ignored Ground",
    "Snow",
    "Temporal Exclusion",
];

/// Human readable ASPRS name of a classification code.
pub fn classification_name(code: u8) -> Cow<'static, str> {
    match code {
        0..=22 => Cow::Borrowed(STANDARD_CLASSIFICATIONS[code as usize]),
        23..=63 => Cow::Owned(format!("Reserved (ASPRS) [{code}]")),
        _ => Cow::Owned(format!("User Defined [{code}]")),
    }
}
