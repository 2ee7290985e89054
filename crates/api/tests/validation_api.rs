//! Integration tests for `/validation` and `/tuning`.
//!
//! Entries are supplied inline so the stored test prints (and therefore
//! PostgreSQL) are never needed.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json};
use inkcal_api::calibration::store::EffectiveCalibration;
use inkcal_api::handlers::validation::build_export;
use inkcal_core::channel::{Channel, ChannelMap};
use inkcal_core::consumption::{predict, Dimensions, LengthUnit};
use inkcal_core::factors::{default_factors, CalibrationFactors};
use inkcal_core::kind::CalibrationKind;
use inkcal_core::test_data::{ImageAnalysis, TestDataEntry};
use serde_json::json;

fn entry(id: i64, coverage: ChannelMap, channel_ml: ChannelMap) -> TestDataEntry {
    TestDataEntry {
        id,
        ink_mode: "cmyk".into(),
        quality: "standard".into(),
        dimensions: Dimensions {
            width: 10.0,
            height: 10.0,
            unit: LengthUnit::In,
        },
        image_analysis: ImageAnalysis {
            total_coverage: 50.0,
            channel_coverage: coverage,
        },
        channel_ml,
        created_at: None,
        image_url: None,
    }
}

fn cyan_only_factors() -> CalibrationFactors {
    let mut factors = CalibrationFactors::default();
    factors.channel_scaling_factors.insert(Channel::Cyan, 0.03);
    factors.base_consumption.insert(Channel::Cyan, 0.01);
    factors
}

/// Measurements generated from the defaults with cyan drawn 25 % heavier.
fn drifted_entries(count: usize) -> Vec<TestDataEntry> {
    let mut truth = default_factors();
    truth.channel_scaling_factors.insert(Channel::Cyan, 0.04375);
    (0..count)
        .map(|i| {
            let dimensions = Dimensions {
                width: 3.0 + i as f64,
                height: 4.0 + i as f64,
                unit: LengthUnit::In,
            };
            let coverage: ChannelMap = [
                (Channel::Cyan, 15.0 + 8.0 * i as f64),
                (Channel::Magenta, 5.0 + 2.0 * i as f64),
            ]
            .into_iter()
            .collect();
            let channel_ml = predict(&dimensions, &coverage, "standard", &truth);
            TestDataEntry {
                dimensions,
                ..entry(i as i64 + 1, coverage, channel_ml)
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// POST /validation/run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_run_scores_inline_entries() {
    let app = common::build_test_app();
    let coverage: ChannelMap = [(Channel::Cyan, 50.0)].into_iter().collect();
    let entries = vec![
        // Predicted 1.51 mL: exact.
        entry(1, coverage.clone(), [(Channel::Cyan, 1.51)].into_iter().collect()),
        // Off by 0.2 mL.
        entry(2, coverage, [(Channel::Cyan, 1.71)].into_iter().collect()),
        // No coverage data: skipped.
        entry(3, ChannelMap::new(), [(Channel::Cyan, 1.0)].into_iter().collect()),
    ];

    let response = post_json(
        app.router,
        "/api/v1/validation/run",
        json!({ "entries": entries, "factors": cyan_only_factors() }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["entryCount"], 2);
    assert_eq!(data["skippedCount"], 1);
    assert_eq!(data["results"].as_array().unwrap().len(), 2);

    let overall = data["stats"]["overallMae"].as_f64().unwrap();
    assert!((overall - 0.1).abs() < 1e-9, "overallMae was {overall}");
    assert_eq!(data["stats"]["sampleCount"], 2);
    assert!(data["stats"]["specialLayerMae"].is_null());
}

#[tokio::test]
async fn validation_run_without_scorable_entries_has_no_stats() {
    let app = common::build_test_app();
    let response = post_json(
        app.router,
        "/api/v1/validation/run",
        json!({ "entries": [] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["stats"].is_null());
    assert_eq!(json["data"]["entryCount"], 0);
}

#[tokio::test]
async fn validation_run_rejects_invalid_factors() {
    let app = common::build_test_app();
    let mut factors = cyan_only_factors();
    factors.channel_scaling_factors.insert(Channel::Black, -0.5);

    let response = post_json(
        app.router,
        "/api/v1/validation/run",
        json!({ "entries": [], "factors": factors }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validation_run_rejects_out_of_range_entries() {
    let app = common::build_test_app();
    let mut bad = entry(
        9,
        [(Channel::Cyan, 5000.0)].into_iter().collect(),
        [(Channel::Cyan, -3.0)].into_iter().collect(),
    );
    bad.dimensions.width = -10.0;

    let response = post_json(
        app.router,
        "/api/v1/validation/run",
        json!({ "entries": [bad], "factors": cyan_only_factors() }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn tuning_rejects_out_of_range_entries() {
    let app = common::build_test_app();
    let mut entries = drifted_entries(8);
    entries[3]
        .image_analysis
        .channel_coverage
        .insert(Channel::Cyan, 250.0);

    let response = post_json(
        app.router,
        "/api/v1/tuning/cmyk",
        json!({ "entries": entries }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.database.len(CalibrationKind::Cmyk).await, 0);
}

#[tokio::test]
async fn validation_over_stored_prints_needs_the_database() {
    let app = common::build_test_app();
    let response = post_json(app.router, "/api/v1/validation/run", json!({})).await;

    assert!(response.status().is_server_error());
}

// ---------------------------------------------------------------------------
// Export document
// ---------------------------------------------------------------------------

#[test]
fn export_document_keeps_unscored_entries_in_test_data() {
    let coverage: ChannelMap = [(Channel::Cyan, 50.0)].into_iter().collect();
    let entries = vec![
        entry(1, coverage, [(Channel::Cyan, 1.71)].into_iter().collect()),
        entry(2, ChannelMap::new(), [(Channel::Cyan, 1.0)].into_iter().collect()),
    ];
    let calibrated_at = "2026-03-01T12:00:00Z".parse().unwrap();
    let effective = EffectiveCalibration {
        factors: cyan_only_factors(),
        sources: Default::default(),
        versions: Default::default(),
        calibration_date: Some(calibrated_at),
    };
    let exported_at = "2026-03-02T08:30:00Z".parse().unwrap();

    let document = serde_json::to_value(build_export(entries, &effective, exported_at)).unwrap();

    let mut keys: Vec<&str> = document
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        ["calibrationDate", "stats", "testData", "timestamp", "validationResults"]
    );
    assert_eq!(document["testData"].as_array().unwrap().len(), 2);
    assert_eq!(document["validationResults"].as_array().unwrap().len(), 1);
    assert_eq!(document["validationResults"][0]["testId"], 1);
    let overall = document["stats"]["overallMae"].as_f64().unwrap();
    assert!((overall - 0.2).abs() < 1e-9, "overallMae was {overall}");
    assert_eq!(document["timestamp"], "2026-03-02T08:30:00Z");
    assert_eq!(document["calibrationDate"], "2026-03-01T12:00:00Z");
}

#[test]
fn export_document_without_scorable_entries_has_null_stats() {
    let entries = vec![entry(
        1,
        ChannelMap::new(),
        [(Channel::Cyan, 1.0)].into_iter().collect(),
    )];
    let effective = EffectiveCalibration {
        factors: default_factors(),
        sources: Default::default(),
        versions: Default::default(),
        calibration_date: None,
    };

    let document =
        serde_json::to_value(build_export(entries, &effective, chrono::Utc::now())).unwrap();

    assert!(document["stats"].is_null());
    assert!(document["calibrationDate"].is_null());
    assert_eq!(document["testData"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// /tuning
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tuning_status_starts_idle() {
    let app = common::build_test_app();
    let response = get(app.router, "/api/v1/tuning/special_layer/status").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["kind"], "special_layer");
    assert_eq!(json["data"]["state"], "idle");
}

#[tokio::test]
async fn tuning_recovers_drifted_channel_and_persists() {
    let app = common::build_test_app();

    let response = post_json(
        app.router.clone(),
        "/api/v1/tuning/cmyk",
        json!({ "entries": drifted_entries(8) }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    let before = data["beforeMae"].as_f64().unwrap();
    let after = data["afterMae"].as_f64().unwrap();
    assert!(after <= before);
    assert!(after < 1e-3, "afterMae was {after}");
    assert_eq!(data["calibration"]["source"], "database");
    assert_eq!(app.database.len(CalibrationKind::Cmyk).await, 1);

    let effective = body_json(get(app.router, "/api/v1/calibration/effective").await).await;
    let cyan = effective["data"]["factors"]["channelScalingFactors"]["cyan"]
        .as_f64()
        .unwrap();
    assert!((cyan - 0.04375).abs() < 0.002, "cyan was {cyan}");
}

#[tokio::test]
async fn tuning_with_too_few_entries_is_unprocessable() {
    let app = common::build_test_app();

    let response = post_json(
        app.router,
        "/api/v1/tuning/cmyk",
        json!({ "entries": drifted_entries(2) }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TUNING_FAILED");
    assert!(json["error"].as_str().unwrap().contains("at least 5"));
    assert_eq!(app.database.len(CalibrationKind::Cmyk).await, 0);
}

#[tokio::test]
async fn tuning_unknown_kind_is_rejected() {
    let app = common::build_test_app();
    let response = post_json(app.router, "/api/v1/tuning/rgb", json!({})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
