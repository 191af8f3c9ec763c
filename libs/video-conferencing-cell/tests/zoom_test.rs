use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::TestConfig;
use shared_utils::RetryPolicy;
use video_conferencing_cell::{MeetingError, MeetingProvider, MeetingRequest, ZoomMeetingProvider};

fn provider_for(server: &MockServer) -> ZoomMeetingProvider {
    let config = TestConfig::with_mock_server(&server.uri()).to_app_config();
    ZoomMeetingProvider::new(&config)
        .unwrap()
        .with_retry_policy(RetryPolicy::new(2).with_base_delay(Duration::from_millis(1)))
}

fn meeting_request() -> MeetingRequest {
    MeetingRequest {
        topic: "Initial consultation".to_string(),
        start_time: Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap(),
        duration_minutes: 50,
        agenda: None,
    }
}

#[tokio::test]
async fn test_create_meeting_returns_handle() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/me/meetings"))
        .and(header("authorization", "Bearer zoom-test-token"))
        .and(body_partial_json(json!({
            "type": 2,
            "duration": 50,
            "start_time": "2030-01-07T10:00:00Z"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 85746065432_u64,
            "join_url": "https://zoom.test/j/85746065432",
            "start_url": "https://zoom.test/s/85746065432"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let handle = provider_for(&mock_server)
        .create_meeting(&meeting_request())
        .await
        .unwrap();

    assert_eq!(handle.meeting_id, "85746065432");
    assert_eq!(handle.join_url, "https://zoom.test/j/85746065432");
    assert_eq!(handle.host_url.as_deref(), Some("https://zoom.test/s/85746065432"));
}

#[tokio::test]
async fn test_create_meeting_retries_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/me/meetings"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let err = provider_for(&mock_server)
        .create_meeting(&meeting_request())
        .await
        .unwrap_err();

    assert_matches!(err, MeetingError::Unavailable(_));
}

#[tokio::test]
async fn test_delete_meeting_maps_missing_room_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/meetings/111"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/meetings/222"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 3001,
            "message": "Meeting does not exist: 222."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    provider.delete_meeting("111").await.unwrap();

    assert_matches!(
        provider.delete_meeting("222").await,
        Err(MeetingError::NotFound(id)) if id == "222"
    );
}

#[test]
fn test_missing_token_is_not_configured() {
    let config = TestConfig::default().to_app_config();
    assert_matches!(ZoomMeetingProvider::new(&config), Err(MeetingError::NotConfigured));
}
