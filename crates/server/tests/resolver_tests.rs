//! Integration tests for the update-resolution queries.

mod common;

use axum::http::StatusCode;
use common::{TestServer, expected_link, json_request};
use serde_json::json;

/// Seed the S1 scenario: three nightly releases, the newest unpublished.
async fn seed_nightly(server: &TestServer, token: &str) {
    server.seed_taxonomy(token).await;

    for (version, publish, critical, changelog) in [
        ("0.0.1.137", true, false, ""),
        ("0.0.2.137", true, true, "### Changelog"),
        ("0.0.3.137", false, false, ""),
    ] {
        let data = format!(
            "{{\"app_name\": \"testapp\", \"version\": \"{version}\", \"channel\": \"nightly\", \
             \"platform\": \"universalPlatform\", \"arch\": \"universalArch\", \
             \"publish\": {publish}, \"critical\": {critical}, \"changelog\": \"{changelog}\"}}"
        );
        let (status, body) = server
            .upload(token, &data, &[("testapp.dmg", b"dmg"), ("testapp.pkg", b"pkg")])
            .await;
        assert_eq!(status, StatusCode::OK, "seed upload failed: {body}");
    }
}

fn nightly_link(version: &str, extension: &str) -> String {
    expected_link(&format!(
        "testapp/nightly/universalPlatform/universalArch/testapp-{version}.{extension}"
    ))
}

#[tokio::test]
async fn latest_returns_highest_published_version() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    seed_nightly(&server, &token).await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/apps/latest?app_name=testapp&channel=nightly&platform=universalPlatform&arch=universalArch",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "nightly": {
                "universalPlatform": {
                    "universalArch": {
                        "dmg": {"url": nightly_link("0.0.2.137", "dmg")},
                        "pkg": {"url": nightly_link("0.0.2.137", "pkg")},
                    }
                }
            }
        })
    );
}

#[tokio::test]
async fn latest_with_no_candidates_is_empty() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    server.seed_taxonomy(&token).await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/apps/latest?app_name=testapp&channel=nightly&platform=universalPlatform&arch=universalArch",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn latest_requires_gated_dimensions() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    server.seed_taxonomy(&token).await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/apps/latest?app_name=testapp&platform=universalPlatform&arch=universalArch",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "you have a created channels, setting channel is required"})
    );
}

#[tokio::test]
async fn check_from_older_version_offers_update() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    seed_nightly(&server, &token).await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/checkVersion?app_name=testapp&version=0.0.1.137&channel=nightly&platform=universalPlatform&arch=universalArch",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "update_available": true,
            "critical": true,
            "changelog": "### Changelog\n",
            "update_url_dmg": nightly_link("0.0.2.137", "dmg"),
            "update_url_pkg": nightly_link("0.0.2.137", "pkg"),
        })
    );
}

#[tokio::test]
async fn check_at_latest_version_still_returns_urls() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    seed_nightly(&server, &token).await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/checkVersion?app_name=testapp&version=0.0.2.137&channel=nightly&platform=universalPlatform&arch=universalArch",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "update_available": false,
            "update_url_dmg": nightly_link("0.0.2.137", "dmg"),
            "update_url_pkg": nightly_link("0.0.2.137", "pkg"),
        })
    );
}

#[tokio::test]
async fn check_newer_than_latest_is_an_error() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    seed_nightly(&server, &token).await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/checkVersion?app_name=testapp&version=0.0.3.137&channel=nightly&platform=universalPlatform&arch=universalArch",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "requested version 0.0.3.137 is newer than the latest version available"})
    );
}

#[tokio::test]
async fn check_with_no_candidates_reports_not_found() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    server.seed_taxonomy(&token).await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/checkVersion?app_name=testapp&version=0.0.1.137&channel=nightly&platform=universalPlatform&arch=universalArch",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"update_available": false, "error": "Not found"}));
}

#[tokio::test]
async fn check_rejects_malformed_version() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    server.seed_taxonomy(&token).await;

    let (status, _) = json_request(
        &server.router,
        "GET",
        "/checkVersion?app_name=testapp&version=abc&channel=nightly&platform=universalPlatform&arch=universalArch",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_lists_published_and_unpublished_releases() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    seed_nightly(&server, &token).await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/search?app_name=testapp",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let apps = body["apps"].as_array().unwrap();
    assert_eq!(apps.len(), 3);
    assert_eq!(apps[0]["Version"], "0.0.1.137");
    assert_eq!(apps[1]["Version"], "0.0.2.137");
    assert_eq!(apps[2]["Version"], "0.0.3.137");
    assert_eq!(apps[1]["Critical"], true);
    assert_eq!(apps[2]["Published"], false);
    assert_eq!(apps[1]["Changelog"][0]["Changes"], "### Changelog");

    let artifacts = apps[0]["Artifacts"].as_array().unwrap();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[0]["Package"], ".dmg");
    assert_eq!(artifacts[1]["Package"], ".pkg");
}
