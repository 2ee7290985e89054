//! Test print entity and DTOs.

use inkcal_core::channel::ChannelMap;
use inkcal_core::consumption::Dimensions;
use inkcal_core::error::CoreError;
use inkcal_core::test_data::{validate_measurements, ImageAnalysis, TestDataEntry};
use inkcal_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use validator::Validate;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A stored test print. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TestPrint {
    pub id: DbId,
    pub ink_mode: String,
    pub quality: String,
    pub width: f64,
    pub height: f64,
    pub unit: String,
    pub image_analysis: Json<ImageAnalysis>,
    pub channel_ml: Json<ChannelMap>,
    pub image_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: Timestamp,
}

impl TestPrint {
    /// Convert the row into the validator's input type.
    pub fn into_entry(self) -> Result<TestDataEntry, CoreError> {
        Ok(TestDataEntry {
            id: self.id,
            ink_mode: self.ink_mode,
            quality: self.quality,
            dimensions: Dimensions {
                width: self.width,
                height: self.height,
                unit: self.unit.parse()?,
            },
            image_analysis: self.image_analysis.0,
            channel_ml: self.channel_ml.0,
            created_at: Some(self.created_at),
            image_url: self.image_url,
        })
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for recording a new test print.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTestPrint {
    #[validate(length(min = 1, max = 64))]
    pub ink_mode: String,
    #[validate(length(min = 1, max = 32))]
    pub quality: String,
    pub dimensions: Dimensions,
    pub image_analysis: ImageAnalysis,
    pub channel_ml: ChannelMap,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl CreateTestPrint {
    /// Field-level checks plus the numeric range checks on measurements.
    pub fn validate_input(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        validate_measurements(&self.dimensions, &self.image_analysis, &self.channel_ml)
    }
}
