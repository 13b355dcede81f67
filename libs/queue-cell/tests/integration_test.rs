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

use queue_cell::router::queue_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn test_setup(mock_server: &MockServer) -> (Router, String) {
    let config = TestConfig::with_base_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(
        &TestUser::staff("STF-1001"),
        &config.jwt_secret,
        24,
    );
    (queue_routes(config.to_arc()), token)
}

fn queue_entry_json(id: Uuid, queue_number: i64, status: &str, priority: &str) -> serde_json::Value {
    json!({
        "id": id,
        "queue_number": queue_number,
        "status": status,
        "priority": priority,
        "arrived_at": "2025-03-14T09:00:00Z",
        "patient": {
            "id": Uuid::new_v4(),
            "name": "Asha Rao",
            "age": 34,
            "gender": "FEMALE",
            "phone_number": "9876543210",
            "created_at": "2025-03-14T08:59:00Z"
        },
        "doctor": null
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn check_in_returns_the_assigned_queue_number() {
    let mock_server = MockServer::start().await;
    let (app, token) = test_setup(&mock_server);

    let entry_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/check_in_patient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            queue_entry_json(entry_id, 1, "WAITING", "URGENT"),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/addQueue")
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({
                "patientName": "Asha Rao",
                "age": 34,
                "gender": "FEMALE",
                "mobileNumber": "9876543210",
                "priority": "URGENT"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["queue_number"], 1);
    assert_eq!(body["status"], "WAITING");
    assert_eq!(body["priority"], "URGENT");
}

#[tokio::test]
async fn check_in_rejects_a_blank_patient_name() {
    let mock_server = MockServer::start().await;
    let (app, token) = test_setup(&mock_server);

    let request = Request::builder()
        .method("POST")
        .uri("/addQueue")
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({
                "patientName": "   ",
                "mobileNumber": "9876543210"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn queue_listing_serves_urgent_patients_first() {
    let mock_server = MockServer::start().await;
    let (app, token) = test_setup(&mock_server);

    // Ordering happens in the database; the API asks for
    // priority.desc,arrived_at.asc and preserves what comes back.
    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .and(query_param("order", "priority.desc,arrived_at.asc"))
        .and(query_param("status", "eq.WAITING"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            queue_entry_json(Uuid::new_v4(), 7, "WAITING", "URGENT"),
            queue_entry_json(Uuid::new_v4(), 3, "WAITING", "NORMAL"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/getQueue?status=WAITING")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body[0]["priority"], "URGENT");
    assert_eq!(body[0]["queue_number"], 7);
    assert_eq!(body[1]["priority"], "NORMAL");
}

#[tokio::test]
async fn updating_an_unknown_entry_is_not_found() {
    let mock_server = MockServer::start().await;
    let (app, token) = test_setup(&mock_server);

    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PATCH")
        .uri(&format!("/{}", id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "status": "COMPLETED" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn queue_status_never_moves_backwards() {
    let mock_server = MockServer::start().await;
    let (app, token) = test_setup(&mock_server);

    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            queue_entry_json(id, 4, "COMPLETED", "NORMAL"),
        ])))
        .mount(&mock_server)
        .await;

    // The rejected transition must never reach the database
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/queue_entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PATCH")
        .uri(&format!("/{}", id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "status": "WAITING" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn priority_is_frozen_once_the_patient_is_with_a_doctor() {
    let mock_server = MockServer::start().await;
    let (app, token) = test_setup(&mock_server);

    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            queue_entry_json(id, 4, "WITH DOCTOR", "NORMAL"),
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PATCH")
        .uri(&format!("/{}", id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "priority": "URGENT" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn removing_an_unknown_entry_is_not_found() {
    let mock_server = MockServer::start().await;
    let (app, token) = test_setup(&mock_server);

    let id = Uuid::new_v4();
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/queue_entries"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("DELETE")
        .uri(&format!("/{}", id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn queue_routes_require_a_bearer_token() {
    let mock_server = MockServer::start().await;
    let (app, _token) = test_setup(&mock_server);

    let request = Request::builder()
        .method("GET")
        .uri("/getQueue")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
