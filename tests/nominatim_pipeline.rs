use std::path::Path;

use httptest::matchers::*;
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use serde_json::json;
use tempfile::tempdir;

use heatmap_geocoder::{
    parse_csv, AppConfig, BoundingBox, CacheEntry, CacheStore, Coordinate, LocationKey,
    Provenance, ResolutionPipeline, WritePolicy,
};

const SAMPLE_CSV: &str = "\
City,State,Concentration_Type,Vehicle_Count,Vehicle_Type
Akron,Ohio,0,12,Truck
Cleveland,Ohio,1,3,Sedan
Unknownville,Nowhere,2,8,Van
,Kansas,0,2,Bus
";

fn config_for(server: &Server, dir: &Path) -> AppConfig {
    AppConfig {
        pacing_interval_ms: 0,
        geocode_endpoint: server.url("/search").to_string(),
        cache_path: dir.join("geocache.json"),
        cache_write_policy: WritePolicy::WriteThrough,
        sample_target_size: 6,
        sample_hard_cap: 6,
        sample_seed: Some(2024),
        request_timeout_ms: 2_000,
        ..AppConfig::default()
    }
}

fn failing_query(query: &'static str) -> Expectation {
    Expectation::matching(all_of![
        request::method_path("GET", "/search"),
        request::query(url_decoded(contains(("q", query)))),
        request::query(url_decoded(contains(("format", "json")))),
        request::query(url_decoded(contains(("countrycodes", "us")))),
    ])
    .times(1)
    .respond_with(status_code(500))
}

#[tokio::test]
async fn live_lookup_is_cached_across_calls() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/search"),
            request::query(url_decoded(contains(("q", "Akron, Ohio, USA")))),
        ])
        .times(1)
        .respond_with(json_encoded(json!([{ "lat": "41.0814", "lon": "-81.5190" }]))),
    );

    let dir = tempdir().unwrap();
    let config = config_for(&server, dir.path());
    let pipeline = ResolutionPipeline::from_config(&config).expect("pipeline");

    let first = pipeline.resolver().resolve("Akron", "Ohio").await;
    assert_eq!(first.provenance, Provenance::Live);
    assert_eq!(first.coordinate, Coordinate::new(41.0814, -81.5190));

    let second = pipeline.resolver().resolve("akron", "OHIO").await;
    assert_eq!(second.provenance, Provenance::Cache);
    assert_eq!(second.coordinate, first.coordinate);

    let store = CacheStore::open(
        &config.cache_path,
        BoundingBox::default(),
        WritePolicy::WriteThrough,
    );
    assert_eq!(
        store.get(&LocationKey::new("Akron", "Ohio")),
        Some(CacheEntry::Resolved(first.coordinate))
    );
}

#[tokio::test]
async fn throttling_skips_the_looser_query() {
    let server = Server::run();
    // No expectation for "Boise Idaho": the server fails the test if it arrives.
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/search"),
            request::query(url_decoded(contains(("q", "Boise, Idaho, USA")))),
        ])
        .times(1)
        .respond_with(status_code(403)),
    );

    let dir = tempdir().unwrap();
    let config = config_for(&server, dir.path());
    let pipeline = ResolutionPipeline::from_config(&config).expect("pipeline");

    let resolution = pipeline.resolver().resolve("Boise", "Idaho").await;
    assert!(resolution.is_approximate());
    assert!(BoundingBox::default().contains(&resolution.coordinate));
    assert_eq!(pipeline.cache_stats().approximate, 1);
}

#[tokio::test]
async fn server_error_falls_through_to_second_variant() {
    let server = Server::run();
    server.expect(failing_query("Gary, Indiana, USA"));
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/search"),
            request::query(url_decoded(contains(("q", "Gary Indiana")))),
        ])
        .times(1)
        .respond_with(json_encoded(json!([{ "lat": 41.5934, "lon": -87.3464 }]))),
    );

    let dir = tempdir().unwrap();
    let pipeline = ResolutionPipeline::from_config(&config_for(&server, dir.path())).unwrap();

    let resolution = pipeline.resolver().resolve("Gary", "Indiana").await;
    assert_eq!(resolution.provenance, Provenance::Live);
    assert_eq!(resolution.coordinate, Coordinate::new(41.5934, -87.3464));
}

#[tokio::test]
async fn out_of_bounds_answer_is_discarded() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/search"),
            request::query(url_decoded(contains(("q", "Paris, Texas, USA")))),
        ])
        .times(1)
        .respond_with(json_encoded(json!([{ "lat": "48.8566", "lon": "2.3522" }]))),
    );

    let dir = tempdir().unwrap();
    let config = config_for(&server, dir.path());
    let pipeline = ResolutionPipeline::from_config(&config).unwrap();

    let resolution = pipeline.resolver().resolve("Paris", "Texas").await;
    assert!(resolution.is_approximate());
    assert!(BoundingBox::default().contains(&resolution.coordinate));

    let raw = std::fs::read_to_string(&config.cache_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &value["paris, texas"];
    assert_eq!(entry["unresolvable"], json!(true));
    assert_eq!(entry["lat"], json!(resolution.coordinate.lat));

    let again = pipeline.resolver().resolve("Paris", "Texas").await;
    assert_eq!(again.coordinate, resolution.coordinate);
}

#[tokio::test]
async fn csv_batch_becomes_feature_collection() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/search"),
            request::query(url_decoded(contains(("q", "Akron, Ohio, USA")))),
        ])
        .times(1)
        .respond_with(json_encoded(json!([{ "lat": "41.0814", "lon": "-81.5190" }]))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/search"),
            request::query(url_decoded(not(contains(("q", "Akron, Ohio, USA"))))),
        ])
        .times(2)
        .respond_with(json_encoded(json!([]))),
    );

    let dir = tempdir().unwrap();
    let config = config_for(&server, dir.path());
    let records = parse_csv(SAMPLE_CSV.as_bytes()).unwrap();
    let pipeline = ResolutionPipeline::from_config(&config).unwrap();

    let collection = pipeline.run(&records).await;
    let metadata = &collection.metadata;
    assert_eq!(collection.kind, "FeatureCollection");
    assert_eq!(collection.features.len(), 4);
    assert_eq!(metadata.total_records, 4);
    assert_eq!(metadata.processed, 4);
    assert_eq!(metadata.live_lookups, 1);
    assert_eq!(metadata.fallback_hits, 1);
    assert_eq!(metadata.approximated, 2);

    let bounds = BoundingBox::default();
    for feature in &collection.features {
        let [lon, lat] = feature.geometry.coordinates;
        assert!(bounds.contains(&Coordinate::new(lat, lon)));
        assert_eq!(
            feature.properties.approximate,
            feature.properties.provenance == Provenance::Approximate
        );
    }
    let unknown = collection
        .features
        .iter()
        .find(|f| f.properties.city == "Unknownville")
        .expect("unknown city feature");
    assert!(unknown.properties.approximate);
    assert_eq!(unknown.properties.vehicle_type, "Van");

    let store = CacheStore::open(&config.cache_path, bounds, WritePolicy::WriteThrough);
    let stats = store.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.resolved, 2);
    assert_eq!(stats.unresolvable, 1);
}
