//! Zone phase table and settings

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One stage of the shrink sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Time to shrink from the current radius to the target (seconds)
    pub duration_secs: f32,
    /// Radius the zone reaches at the end of the phase
    pub target_radius: f32,
}

impl Phase {
    pub fn new(duration_secs: f32, target_radius: f32) -> Self {
        Self {
            duration_secs,
            target_radius,
        }
    }
}

/// Ordered, immutable list of phases. Insertion order is shrink order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Phase>", into = "Vec<Phase>")]
pub struct PhaseTable {
    phases: Vec<Phase>,
}

impl PhaseTable {
    /// Build a table, clamping negative (or NaN) durations and radii to zero
    pub fn new(phases: Vec<Phase>) -> Self {
        let phases = phases
            .into_iter()
            .enumerate()
            .map(|(index, phase)| {
                let sanitized = Phase {
                    duration_secs: non_negative(phase.duration_secs),
                    target_radius: non_negative(phase.target_radius),
                };
                if sanitized != phase {
                    warn!(
                        phase = index,
                        duration_secs = phase.duration_secs,
                        target_radius = phase.target_radius,
                        "Clamped negative zone phase values to zero"
                    );
                }
                sanitized
            })
            .collect();

        Self { phases }
    }

    pub fn empty() -> Self {
        Self { phases: Vec::new() }
    }

    /// Parse `duration:radius` pairs separated by commas, e.g. `60:40,60:25,60:10`
    pub fn parse(text: &str) -> Result<Self, PhaseParseError> {
        let mut phases = Vec::new();

        for entry in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (duration, radius) = entry
                .split_once(':')
                .ok_or_else(|| PhaseParseError::MissingSeparator(entry.to_string()))?;

            let duration_secs = duration
                .trim()
                .parse::<f32>()
                .map_err(|_| PhaseParseError::InvalidNumber(duration.trim().to_string()))?;
            let target_radius = radius
                .trim()
                .parse::<f32>()
                .map_err(|_| PhaseParseError::InvalidNumber(radius.trim().to_string()))?;

            phases.push(Phase::new(duration_secs, target_radius));
        }

        Ok(Self::new(phases))
    }

    pub fn get(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.phases.iter()
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self::new(vec![
            Phase::new(60.0, 40.0),
            Phase::new(60.0, 25.0),
            Phase::new(60.0, 10.0),
        ])
    }
}

impl From<Vec<Phase>> for PhaseTable {
    fn from(phases: Vec<Phase>) -> Self {
        Self::new(phases)
    }
}

impl From<PhaseTable> for Vec<Phase> {
    fn from(table: PhaseTable) -> Self {
        table.phases
    }
}

/// Phase table parse errors
#[derive(Debug, thiserror::Error)]
pub enum PhaseParseError {
    #[error("Phase entry '{0}' must be formatted as duration:radius")]
    MissingSeparator(String),

    #[error("Invalid number in phase table: '{0}'")]
    InvalidNumber(String),
}

/// Everything the authority needs to seed a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSettings {
    /// Radius before the first phase starts
    pub initial_radius: f32,
    /// Pick each phase's target center at random inside the current circle
    pub randomize_center: bool,
    /// Zone center at session start
    pub initial_center: Vec2,
    /// World height of the ground plane the zone sits on
    pub ground_height: f32,
    pub phases: PhaseTable,
}

impl ZoneSettings {
    pub fn new(initial_radius: f32, randomize_center: bool, phases: PhaseTable) -> Self {
        Self {
            initial_radius: non_negative(initial_radius),
            randomize_center,
            initial_center: Vec2::ZERO,
            ground_height: 0.0,
            phases,
        }
    }

    pub fn with_center(mut self, center: Vec2) -> Self {
        self.initial_center = center;
        self
    }

    pub fn with_ground_height(mut self, ground_height: f32) -> Self {
        self.ground_height = ground_height;
        self
    }
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self::new(60.0, true, PhaseTable::default())
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_style_table() {
        let table = PhaseTable::parse("60:40, 60:25,60:10").unwrap();
        assert_eq!(table, PhaseTable::default());
    }

    #[test]
    fn empty_text_is_empty_table() {
        let table = PhaseTable::parse("  ").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(matches!(
            PhaseTable::parse("60"),
            Err(PhaseParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            PhaseTable::parse("sixty:40"),
            Err(PhaseParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn negative_values_are_clamped_at_construction() {
        let table = PhaseTable::new(vec![Phase::new(-5.0, -1.0), Phase::new(10.0, f32::NAN)]);
        assert_eq!(table.get(0), Some(&Phase::new(0.0, 0.0)));
        assert_eq!(table.get(1), Some(&Phase::new(10.0, 0.0)));
    }

    #[test]
    fn settings_clamp_initial_radius() {
        let settings = ZoneSettings::new(-20.0, false, PhaseTable::empty());
        assert_eq!(settings.initial_radius, 0.0);
    }

    #[test]
    fn table_deserializes_through_sanitizer() {
        let table: PhaseTable =
            serde_json::from_str(r#"[{"duration_secs": -3.0, "target_radius": 12.0}]"#).unwrap();
        assert_eq!(table.get(0), Some(&Phase::new(0.0, 12.0)));
    }
}
