use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::router::doctor_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn test_setup(mock_server: &MockServer) -> (Router, String) {
    let config = TestConfig::with_base_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(
        &TestUser::staff("STF-1001"),
        &config.jwt_secret,
        24,
    );
    (doctor_routes(config.to_arc()), token)
}

#[tokio::test]
async fn listing_embeds_schedule_blocks() {
    let mock_server = MockServer::start().await;
    let (app, token) = test_setup(&mock_server);

    let doctor_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("order", "name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": doctor_id,
            "name": "Dr. Meera Shah",
            "specialization": "General Medicine",
            "gender": "FEMALE",
            "schedules": [{
                "id": Uuid::new_v4(),
                "doctor_id": doctor_id,
                "slots": [
                    { "time": "09:00:00", "status": "available" },
                    { "time": "09:30:00", "status": "booked", "appointment_id": Uuid::new_v4() }
                ],
                "metadata": { "day_type": "regular" },
                "created_at": "2025-03-14T09:00:00Z",
                "updated_at": null
            }]
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body[0]["name"], "Dr. Meera Shah");
    assert_eq!(body[0]["schedules"][0]["slots"][0]["status"], "available");
    assert_eq!(body[0]["schedules"][0]["slots"][1]["status"], "booked");
}

#[tokio::test]
async fn listing_requires_a_bearer_token() {
    let mock_server = MockServer::start().await;
    let (app, _token) = test_setup(&mock_server);

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
