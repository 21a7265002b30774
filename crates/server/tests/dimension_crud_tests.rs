//! Integration tests for taxonomy dimension CRUD.

mod common;

use axum::http::StatusCode;
use common::{TestServer, json_request, multipart_request};
use serde_json::json;

#[tokio::test]
async fn create_and_list_channels() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;

    let (status, body) = json_request(&server.router, "GET", "/listChannels", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"channels": []}));

    let nightly = server.create_dimension(&token, "channel", "nightly").await;
    let stable = server.create_dimension(&token, "channel", "stable").await;
    assert_ne!(nightly, stable);

    let (status, body) = json_request(&server.router, "GET", "/listChannels", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let channels = body.get("channels").and_then(|c| c.as_array()).unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].get("ChannelName").unwrap(), "nightly");
    assert_eq!(channels[1].get("ChannelName").unwrap(), "stable");
    assert!(channels[0].get("ID").is_some());
    assert!(channels[0].get("Updated_at").is_some());
}

#[tokio::test]
async fn duplicate_dimension_names_rejected_per_kind() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;

    for (kind, endpoint, message) in [
        ("app", "/createApp", "app with this name already exists"),
        ("channel", "/createChannel", "channel with this name already exists"),
        ("platform", "/createPlatform", "platform with this name already exists"),
        ("arch", "/createArch", "arch with this name already exists"),
    ] {
        let name = if kind == "app" { "testapp" } else { "shared" };
        server.create_dimension(&token, kind, name).await;

        let data = format!("{{\"{kind}\": \"{name}\"}}");
        let (status, body) =
            multipart_request(&server.router, "POST", endpoint, Some(&data), &[], Some(&token))
                .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": message}));
    }
}

#[tokio::test]
async fn create_app_rejects_invalid_names() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;

    let (status, _) = multipart_request(
        &server.router,
        "POST",
        "/createApp",
        Some(r#"{"app": "my app!"}"#),
        &[],
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = multipart_request(
        &server.router,
        "POST",
        "/createApp",
        Some(r#"{"app": ""}"#),
        &[],
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rename_channel_rewrites_referencing_releases() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    server.seed_taxonomy(&token).await;
    let stable_id = server.create_dimension(&token, "channel", "stable").await;

    let data = r#"{"app_name": "testapp", "version": "0.0.1.137", "channel": "stable", "platform": "universalPlatform", "arch": "universalArch", "publish": true}"#;
    let (status, _) = server.upload(&token, data, &[("testapp.dmg", b"payload")]).await;
    assert_eq!(status, StatusCode::OK);

    let update = format!("{{\"id\": \"{stable_id}\", \"channel\": \"unstable\"}}");
    let (status, body) = multipart_request(
        &server.router,
        "POST",
        "/updateChannel",
        Some(&update),
        &[],
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"updateChannelResult.Updated": true}));

    // list shows only the new name
    let (_, body) = json_request(&server.router, "GET", "/listChannels", None, Some(&token)).await;
    let names: Vec<&str> = body["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["ChannelName"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"unstable"));
    assert!(!names.contains(&"stable"));

    // releases now reference the new name
    let (_, body) = json_request(
        &server.router,
        "GET",
        "/search?app_name=testapp",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(body["apps"][0]["Channel"], "unstable");

    // a lookup against the old name returns empty
    let (status, body) = json_request(
        &server.router,
        "GET",
        "/apps/latest?app_name=testapp&channel=stable&platform=universalPlatform&arch=universalArch",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn delete_dimension_blocked_while_referenced() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;
    server.seed_taxonomy(&token).await;

    let data = r#"{"app_name": "testapp", "version": "0.0.1.137", "channel": "nightly", "platform": "universalPlatform", "arch": "universalArch"}"#;
    let (status, body) = server.upload(&token, data, &[("testapp.dmg", b"payload")]).await;
    assert_eq!(status, StatusCode::OK, "upload failed: {body}");
    let release_id = body["uploadResult.Uploaded"].as_str().unwrap().to_string();

    // the channel is referenced by the release
    let (_, channels) = json_request(&server.router, "GET", "/listChannels", None, Some(&token)).await;
    let channel_id = channels["channels"][0]["ID"].as_str().unwrap().to_string();

    let (status, _) = json_request(
        &server.router,
        "DELETE",
        &format!("/deleteChannel?id={channel_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // removing the release unblocks the delete
    let (status, body) = json_request(
        &server.router,
        "DELETE",
        &format!("/apps/delete?id={release_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleteSpecificAppResult.DeletedCount": 1}));

    let (status, body) = json_request(
        &server.router,
        "DELETE",
        &format!("/deleteChannel?id={channel_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleteChannelResult.DeletedCount": 1}));
}

#[tokio::test]
async fn delete_with_malformed_id_is_bad_request() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;

    let (status, _) = json_request(
        &server.router,
        "DELETE",
        "/deleteChannel?id=not-a-uuid",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        json_request(&server.router, "DELETE", "/deleteChannel", None, Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
