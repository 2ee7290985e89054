//! Labeled test prints used to validate and tune calibration factors.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelMap;
use crate::consumption::Dimensions;
use crate::error::CoreError;
use crate::threshold_validation::{validate_non_negative, validate_percent};
use crate::types::{DbId, Timestamp};

/// Output of the image analysis step for one test print.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    /// Overall inked area, percent.
    #[serde(default)]
    pub total_coverage: f64,
    /// Per-channel inked area, percent (0-100).
    #[serde(default)]
    pub channel_coverage: ChannelMap,
}

/// A test print with its measured ink draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDataEntry {
    pub id: DbId,
    pub ink_mode: String,
    pub quality: String,
    pub dimensions: Dimensions,
    pub image_analysis: ImageAnalysis,
    /// Measured mL per channel.
    pub channel_ml: ChannelMap,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl TestDataEntry {
    /// An entry without per-channel coverage cannot be scored.
    pub fn is_usable(&self) -> bool {
        !self.image_analysis.channel_coverage.is_empty()
    }

    /// Range-check the entry's numbers; errors name the entry id.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_measurements(&self.dimensions, &self.image_analysis, &self.channel_ml).map_err(
            |e| match e {
                CoreError::Validation(msg) => {
                    CoreError::Validation(format!("Test entry {}: {msg}", self.id))
                }
                other => other,
            },
        )
    }
}

/// Split a batch into usable entries, returning how many were dropped.
pub fn usable_entries(entries: Vec<TestDataEntry>) -> (Vec<TestDataEntry>, usize) {
    let total = entries.len();
    let usable: Vec<TestDataEntry> = entries.into_iter().filter(|e| e.is_usable()).collect();
    let skipped = total - usable.len();
    (usable, skipped)
}

/// Validate the numeric content of a new test print.
pub fn validate_measurements(
    dimensions: &Dimensions,
    analysis: &ImageAnalysis,
    channel_ml: &ChannelMap,
) -> Result<(), CoreError> {
    dimensions.validate()?;
    validate_percent(analysis.total_coverage, "image_analysis.totalCoverage")?;
    for (channel, coverage) in &analysis.channel_coverage {
        validate_percent(*coverage, &format!("image_analysis.channelCoverage.{channel}"))?;
    }
    if channel_ml.is_empty() {
        return Err(CoreError::Validation(
            "channel_ml must contain at least one measured channel".into(),
        ));
    }
    for (channel, ml) in channel_ml {
        validate_non_negative(*ml, &format!("channel_ml.{channel}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::consumption::LengthUnit;

    fn entry(id: DbId, coverage: ChannelMap) -> TestDataEntry {
        TestDataEntry {
            id,
            ink_mode: "cmyk".into(),
            quality: "standard".into(),
            dimensions: Dimensions {
                width: 100.0,
                height: 100.0,
                unit: LengthUnit::Mm,
            },
            image_analysis: ImageAnalysis {
                total_coverage: 30.0,
                channel_coverage: coverage,
            },
            channel_ml: [(Channel::Cyan, 0.2)].into_iter().collect(),
            created_at: None,
            image_url: None,
        }
    }

    #[test]
    fn entries_without_coverage_are_dropped() {
        let entries = vec![
            entry(1, [(Channel::Cyan, 20.0)].into_iter().collect()),
            entry(2, ChannelMap::new()),
            entry(3, [(Channel::Black, 5.0)].into_iter().collect()),
        ];
        let (usable, skipped) = usable_entries(entries);
        assert_eq!(skipped, 1);
        assert_eq!(usable.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn parses_wire_format() {
        let json = serde_json::json!({
            "id": 7,
            "ink_mode": "cmyk_white",
            "quality": "high",
            "dimensions": { "width": 4, "height": 6, "unit": "in" },
            "image_analysis": {
                "totalCoverage": 42.5,
                "channelCoverage": { "cyan": 20.0, "white": 80.0 }
            },
            "channel_ml": { "cyan": 0.21, "white": 1.4 },
            "created_at": "2026-03-01T12:00:00Z",
            "image_url": "https://cdn.example.com/prints/7.png"
        });
        let parsed: TestDataEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.dimensions.unit, LengthUnit::In);
        assert_eq!(parsed.image_analysis.channel_coverage[&Channel::White], 80.0);
        assert!(parsed.created_at.is_some());
    }

    #[test]
    fn measurement_validation() {
        let ok = entry(1, [(Channel::Cyan, 20.0)].into_iter().collect());
        assert!(validate_measurements(&ok.dimensions, &ok.image_analysis, &ok.channel_ml).is_ok());

        let mut bad_coverage = ok.image_analysis.clone();
        bad_coverage.channel_coverage.insert(Channel::Cyan, 0.2 * 1000.0);
        assert!(validate_measurements(&ok.dimensions, &bad_coverage, &ok.channel_ml).is_err());

        let mut bad_ml = ok.channel_ml.clone();
        bad_ml.insert(Channel::Black, -0.1);
        assert!(validate_measurements(&ok.dimensions, &ok.image_analysis, &bad_ml).is_err());

        assert!(
            validate_measurements(&ok.dimensions, &ok.image_analysis, &ChannelMap::new()).is_err()
        );
    }

    #[test]
    fn entry_validation_names_the_entry() {
        let mut bad = entry(42, [(Channel::Cyan, 5000.0)].into_iter().collect());
        bad.dimensions.width = -10.0;
        let err = bad.validate().unwrap_err();
        assert!(err.to_string().contains("42"), "{err}");

        // A coverage-less entry is still valid input; it is skipped when scored.
        assert!(entry(3, ChannelMap::new()).validate().is_ok());
    }
}
