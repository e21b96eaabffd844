use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::*;
use appointment_cell::services::repository::{CABINET_SLOT_INDEX, DENTIST_SLOT_INDEX};
use appointment_cell::services::{AppointmentRepository, RepositoryError, SupabaseAppointmentRepository};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "caller-token";

fn repository(server: &MockServer) -> SupabaseAppointmentRepository {
    SupabaseAppointmentRepository::new(&TestConfig::with_supabase_url(&server.uri()).to_app_config(), TOKEN)
}

fn row(id: Uuid, dentist: Uuid, time_slot: &str, cabinet: &str, status: &str) -> serde_json::Value {
    MockSupabaseResponses::appointment_response(
        &id.to_string(),
        &Uuid::new_v4().to_string(),
        &dentist.to_string(),
        "2025-06-10",
        time_slot,
        cabinet,
        status,
    )
}

fn new_appointment(dentist_id: Uuid) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        dentist_id,
        date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
        time_slot: TimeSlot::parse("09:00").unwrap(),
        duration_minutes: 30,
        cabinet: "Cabinet-1".to_string(),
        appointment_type: AppointmentType::Checkup,
        status: AppointmentStatus::Scheduled,
        notes: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn active_on_queries_one_day_without_cancellations() {
    let server = MockServer::start().await;
    let dentist = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("date", "eq.2025-06-10"))
        .and(query_param("status", "neq.cancelled"))
        .and(header("authorization", "Bearer caller-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            row(Uuid::new_v4(), dentist, "09:00:00", "Cabinet-1", "scheduled"),
            row(Uuid::new_v4(), dentist, "10:30:00", "Cabinet-2", "completed"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let booked = repository(&server)
        .active_on(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap())
        .await
        .unwrap();

    assert_eq!(booked.len(), 2);
    assert_eq!(booked[0].time_slot.to_string(), "09:00");
    assert_eq!(booked[1].status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn dentist_lookup_uses_the_dentists_table() {
    let server = MockServer::start().await;
    let known = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/dentists"))
        .and(query_param("id", format!("eq.{}", known)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::dentist_response(&known.to_string(), "Dr. Ana Ruiz")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/dentists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let repo = repository(&server);
    assert!(repo.dentist_exists(known).await.unwrap());
    assert!(!repo.dentist_exists(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn insert_asks_for_the_stored_row() {
    let server = MockServer::start().await;
    let dentist = Uuid::new_v4();
    let appointment = new_appointment(dentist);

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({
            "dentist_id": dentist,
            "date": "2025-06-10",
            "time_slot": "09:00",
            "cabinet": "Cabinet-1",
            "status": "scheduled"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            row(appointment.id, dentist, "09:00:00", "Cabinet-1", "scheduled")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = repository(&server).insert(appointment.clone()).await.unwrap();
    assert_eq!(stored.id, appointment.id);
    assert_eq!(stored.time_slot, appointment.time_slot);
}

#[tokio::test]
async fn unique_index_violations_become_slot_taken() {
    for (index, reason) in [
        (DENTIST_SLOT_INDEX, ConflictReason::DentistBusy),
        (CABINET_SLOT_INDEX, ConflictReason::CabinetBusy),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::unique_violation_response(index)),
            )
            .mount(&server)
            .await;

        let err = repository(&server)
            .insert(new_appointment(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err, RepositoryError::SlotTaken(reason));
        assert_eq!(
            AppointmentError::from(err),
            AppointmentError::Conflict { reason }
        );
    }
}

#[tokio::test]
async fn other_failures_are_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(MockSupabaseResponses::error_response("boom", "XX000")),
        )
        .mount(&server)
        .await;

    let err = repository(&server)
        .find(Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, RepositoryError::Unavailable(msg) => assert!(msg.contains("boom")));
}

#[tokio::test]
async fn malformed_rows_are_decode_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "time_slot": "07:00" }
        ])))
        .mount(&server)
        .await;

    let err = repository(&server).list(&AppointmentFilter::default()).await.unwrap_err();
    assert_matches!(err, RepositoryError::Decode(_));
}

#[tokio::test]
async fn update_patches_by_id_and_reports_missing_rows() {
    let server = MockServer::start().await;
    let appointment = new_appointment(Uuid::new_v4());

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let result = repository(&server).update(appointment).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn delete_reports_whether_a_row_went_away() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            row(id, Uuid::new_v4(), "09:00", "Cabinet-1", "scheduled")
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let repo = repository(&server);
    assert!(repo.delete(id).await.unwrap());
    assert!(!repo.delete(id).await.unwrap());
}
