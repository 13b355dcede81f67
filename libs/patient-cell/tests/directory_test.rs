use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::models::PatientError;
use patient_cell::services::PatientDirectoryService;
use shared_utils::test_utils::TestConfig;

fn patient_json(id: Uuid, name: &str, phone: Option<&str>) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "age": null,
        "gender": null,
        "phone_number": phone,
        "created_at": "2025-03-14T09:00:00Z"
    })
}

#[tokio::test]
async fn find_by_phone_returns_the_existing_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let directory = PatientDirectoryService::new(&config);

    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("phone_number", "eq.9876543210"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            patient_json(id, "Asha Rao", Some("9876543210")),
        ])))
        .mount(&mock_server)
        .await;

    let found = directory.find_by_phone("9876543210", "token").await.unwrap();
    assert_eq!(found.unwrap().id, id);
}

#[tokio::test]
async fn find_or_create_creates_on_a_name_miss() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let directory = PatientDirectoryService::new(&config);

    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("name", "eq.Rohan Mehta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            patient_json(id, "Rohan Mehta", None),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let patient = directory.find_or_create_by_name("Rohan Mehta", "token").await.unwrap();
    assert_eq!(patient.id, id);
    assert_eq!(patient.name, "Rohan Mehta");
}

#[tokio::test]
async fn find_or_create_reuses_the_existing_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let directory = PatientDirectoryService::new(&config);

    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("name", "eq.Rohan Mehta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            patient_json(id, "Rohan Mehta", None),
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let patient = directory.find_or_create_by_name("Rohan Mehta", "token").await.unwrap();
    assert_eq!(patient.id, id);
}

#[tokio::test]
async fn get_patient_reports_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let directory = PatientDirectoryService::new(&config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = directory.get_patient(&Uuid::new_v4(), "token").await;
    assert_matches!(result, Err(PatientError::NotFound));
}
