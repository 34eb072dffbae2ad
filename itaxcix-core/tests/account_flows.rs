//! Registration, recovery, session restore, profile and availability flows

mod common;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use itaxcix_core::db;
use itaxcix_core::error::SESSION_EXPIRED_MESSAGE;
use itaxcix_core::models::{ContactType, Profile};
use itaxcix_core::view_models::{
    AuthViewModel, DriverViewModel, ProfileViewModel, RecoveryStep, RegistrationProgress,
    RegistrationRole, RegistrationViewModel,
};
use itaxcix_core::UiState;

const WS_UNUSED: &str = "ws://127.0.0.1:1";

/// base64 of the bytes `jpeg`
const PHOTO: &[u8] = b"jpeg";
const PHOTO_BASE64: &str = "anBlZw==";

async fn no_requests_sent(server: &MockServer) -> bool {
    server.received_requests().await.unwrap_or_default().is_empty()
}

async fn mount_post(server: &MockServer, route: &str, body: serde_json::Value, reply: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(route))
        .and(body_json(body))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply))
        .expect(1)
        .mount(server)
        .await;
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_driver_registration_runs_every_step() {
    let server = MockServer::start().await;
    mount_post(
        &server,
        "/registration/validate-document",
        json!({ "documentTypeId": 1, "documentValue": "40112233" }),
        json!({ "data": { "personId": 31, "fullName": "Jorge Ramos" } }),
    )
    .await;
    mount_post(
        &server,
        "/registration/validate-biometric",
        json!({ "personId": 31, "base64Image": PHOTO_BASE64 }),
        json!({ "data": { "personId": 31, "validated": true } }),
    )
    .await;
    mount_post(
        &server,
        "/registration/validate-vehicle",
        json!({ "personId": 31, "plateValue": "ABC123" }),
        json!({ "data": { "personId": 31, "vehicleId": 7 } }),
    )
    .await;
    mount_post(
        &server,
        "/registration/register",
        json!({
            "password": "Clave#2025",
            "contactTypeId": 1,
            "contactValue": "jorge@correo.pe",
            "personId": 31,
            "vehicleId": 7
        }),
        json!({ "data": { "userId": 55 } }),
    )
    .await;
    mount_post(
        &server,
        "/registration/verify-contact",
        json!({ "userId": 55, "code": "123456" }),
        json!({ "message": "Contacto verificado" }),
    )
    .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    let vm = RegistrationViewModel::new(state, RegistrationRole::Driver);

    assert!(vm.validate_document("40112233").await.success().is_some());
    assert!(vm.validate_biometric(PHOTO).await.success().is_some());
    assert!(vm.validate_vehicle("abc-123").await.success().is_some());
    assert!(vm
        .register("Clave#2025", "Clave#2025", ContactType::Email, "jorge@correo.pe")
        .await
        .success()
        .is_some());

    let done = vm.verify_contact("123456").await;
    let expected = RegistrationProgress {
        person_id: Some(31),
        biometric_validated: true,
        vehicle_id: Some(7),
        user_id: Some(55),
        contact_verified: true,
    };
    assert_eq!(done, UiState::Success(expected.clone()));
    assert_eq!(vm.progress.get(), expected);
}

#[tokio::test]
async fn test_registration_steps_refuse_to_run_out_of_order() {
    let server = MockServer::start().await;
    let state = common::state_for(&server.uri(), WS_UNUSED).await;

    let citizen = RegistrationViewModel::new(state.clone(), RegistrationRole::Citizen);
    assert!(citizen.validate_biometric(PHOTO).await.error().is_some());
    assert!(citizen
        .register("Clave#2025", "Clave#2025", ContactType::Phone, "987654321")
        .await
        .error()
        .is_some());
    assert!(citizen.verify_contact("123456").await.error().is_some());
    assert_eq!(
        citizen.validate_vehicle("ABC-123").await.error(),
        Some("Solo los conductores registran un vehículo")
    );

    let driver = RegistrationViewModel::new(state, RegistrationRole::Driver);
    assert!(driver.validate_vehicle("ABC-123").await.error().is_some());

    assert!(no_requests_sent(&server).await);
    assert_eq!(citizen.progress.get(), RegistrationProgress::default());
}

#[tokio::test]
async fn test_new_document_restarts_registration() {
    let server = MockServer::start().await;
    mount_post(
        &server,
        "/registration/validate-document",
        json!({ "documentTypeId": 1, "documentValue": "12345678" }),
        json!({ "data": { "personId": 31 } }),
    )
    .await;
    mount_post(
        &server,
        "/registration/validate-biometric",
        json!({ "personId": 31, "base64Image": PHOTO_BASE64 }),
        json!({ "data": { "personId": 31, "validated": true } }),
    )
    .await;
    mount_post(
        &server,
        "/registration/validate-document",
        json!({ "documentTypeId": 1, "documentValue": "87654321" }),
        json!({ "data": { "personId": 32 } }),
    )
    .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    let vm = RegistrationViewModel::new(state, RegistrationRole::Citizen);

    vm.validate_document("12345678").await;
    vm.validate_biometric(PHOTO).await;
    assert!(vm.progress.get().biometric_validated);

    vm.validate_document("87654321").await;
    assert_eq!(
        vm.progress.get(),
        RegistrationProgress {
            person_id: Some(32),
            ..RegistrationProgress::default()
        }
    );
}

#[tokio::test]
async fn test_rejected_face_match_keeps_biometric_pending() {
    let server = MockServer::start().await;
    mount_post(
        &server,
        "/registration/validate-document",
        json!({ "documentTypeId": 1, "documentValue": "12345678" }),
        json!({ "data": { "personId": 31 } }),
    )
    .await;
    mount_post(
        &server,
        "/registration/validate-biometric",
        json!({ "personId": 31, "base64Image": PHOTO_BASE64 }),
        json!({ "data": { "personId": 31, "validated": false } }),
    )
    .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    let vm = RegistrationViewModel::new(state, RegistrationRole::Citizen);

    vm.validate_document("12345678").await;
    let outcome = vm.validate_biometric(PHOTO).await;
    assert_eq!(
        outcome.error(),
        Some("No pudimos verificar tu identidad. Inténtalo nuevamente.")
    );
    assert!(!vm.progress.get().biometric_validated);
}

// ============================================================================
// Password recovery
// ============================================================================

#[tokio::test]
async fn test_password_recovery_survives_a_wrong_code() {
    let server = MockServer::start().await;
    mount_post(
        &server,
        "/auth/recovery/start",
        json!({ "contactTypeId": 1, "contact": "lucia@correo.pe" }),
        json!({ "data": { "userId": 5 } }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/auth/recovery/verify-code"))
        .and(body_json(json!({ "userId": 5, "code": "000000" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Código inválido" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_post(
        &server,
        "/auth/recovery/verify-code",
        json!({ "userId": 5, "code": "123456" }),
        json!({ "data": { "tempToken": "tmp-9" } }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/auth/recovery/change-password"))
        .and(header("authorization", "Bearer tmp-9"))
        .and(body_json(json!({
            "userId": 5,
            "newPassword": "Nueva#2025",
            "repeatPassword": "Nueva#2025"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    let vm = AuthViewModel::new(state);

    assert_eq!(
        vm.request_recovery_code(ContactType::Email, "lucia@correo.pe").await,
        UiState::Success(RecoveryStep::CodeSent { user_id: 5 })
    );
    assert_eq!(
        vm.verify_recovery_code("000000").await.error(),
        Some("Código inválido")
    );
    assert_eq!(
        vm.verify_recovery_code("123456").await,
        UiState::Success(RecoveryStep::CodeVerified {
            user_id: 5,
            temp_token: "tmp-9".to_string(),
        })
    );
    assert_eq!(
        vm.reset_password("Nueva#2025", "Nueva#2025").await,
        UiState::Success(RecoveryStep::PasswordChanged)
    );

    // A finished recovery cannot be replayed
    assert!(vm.verify_recovery_code("123456").await.error().is_some());
}

#[tokio::test]
async fn test_password_reset_needs_a_verified_code() {
    let server = MockServer::start().await;
    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    let vm = AuthViewModel::new(state);

    assert!(vm.reset_password("Nueva#2025", "Nueva#2025").await.error().is_some());
    assert!(vm.verify_recovery_code("123456").await.error().is_some());
    assert!(no_requests_sent(&server).await);
}

// ============================================================================
// Session restore
// ============================================================================

#[tokio::test]
async fn test_restore_session_refreshes_user() {
    let server = MockServer::start().await;
    let mut refreshed = common::citizen_json();
    refreshed["phone"] = json!("999888777");
    Mock::given(method("GET"))
        .and(path("/users/5"))
        .and(header("authorization", "Bearer tok-saved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": refreshed })))
        .expect(1)
        .mount(&server)
        .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    db::save_session(&state.db, "tok-saved", &common::citizen())
        .await
        .unwrap();

    let user = AuthViewModel::new(state.clone())
        .restore_session()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.phone.as_deref(), Some("999888777"));

    let session = state.session().unwrap();
    assert_eq!(session.token, "tok-saved");
    assert_eq!(session.user, user);
    let (_, stored) = db::load_session(&state.db).await.unwrap().unwrap();
    assert_eq!(stored, user);
}

#[tokio::test]
async fn test_restore_session_with_rejected_token_signs_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/5"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    db::save_session(&state.db, "tok-saved", &common::citizen())
        .await
        .unwrap();

    let restored = AuthViewModel::new(state.clone()).restore_session().await.unwrap();
    assert!(restored.is_none());
    assert!(!state.is_authenticated());
    assert!(db::load_session(&state.db).await.unwrap().is_none());
}

#[tokio::test]
async fn test_restore_session_offline_keeps_cached_user() {
    let state = common::state_for("http://127.0.0.1:1", WS_UNUSED).await;
    db::save_session(&state.db, "tok-saved", &common::citizen())
        .await
        .unwrap();

    let restored = AuthViewModel::new(state.clone()).restore_session().await.unwrap();
    assert_eq!(restored, Some(common::citizen()));
    assert!(state.is_authenticated());
}

#[tokio::test]
async fn test_restore_without_stored_session() {
    let server = MockServer::start().await;
    let state = common::state_for(&server.uri(), WS_UNUSED).await;

    let restored = AuthViewModel::new(state.clone()).restore_session().await.unwrap();
    assert!(restored.is_none());
    assert!(no_requests_sent(&server).await);
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
async fn test_profile_shape_follows_role() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile/citizen/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "firstName": "Lucía", "lastName": "Quispe", "document": "12345678" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/profile/driver/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "firstName": "Jorge",
                "lastName": "Ramos",
                "document": "40112233",
                "licensePlate": "ABC123",
                "available": true
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    let vm = ProfileViewModel::new(state.clone());

    common::sign_in(&state, common::citizen()).await;
    match vm.load_profile().await {
        UiState::Success(Profile::Citizen(profile)) => assert_eq!(profile.first_name, "Lucía"),
        other => panic!("expected citizen profile, got {other:?}"),
    }

    common::sign_in(&state, common::driver()).await;
    match vm.load_profile().await {
        UiState::Success(Profile::Driver(profile)) => {
            assert_eq!(profile.license_plate, "ABC123");
            assert!(profile.available);
        }
        other => panic!("expected driver profile, got {other:?}"),
    }
}

#[tokio::test]
async fn test_email_update_writes_through_to_session_and_store() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/users/5/email"))
        .and(body_json(json!({ "email": "nuevo@correo.pe" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    common::sign_in(&state, common::citizen()).await;
    let vm = ProfileViewModel::new(state.clone());

    assert!(vm.update_email("nuevo@correo.pe").await.success().is_some());

    let session = state.session().unwrap();
    assert_eq!(session.token, "tok-test");
    assert_eq!(session.user.email.as_deref(), Some("nuevo@correo.pe"));
    let (_, stored) = db::load_session(&state.db).await.unwrap().unwrap();
    assert_eq!(stored.email.as_deref(), Some("nuevo@correo.pe"));
}

#[tokio::test]
async fn test_invalid_phone_is_not_sent() {
    let server = MockServer::start().await;
    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    common::sign_in(&state, common::citizen()).await;
    let vm = ProfileViewModel::new(state.clone());

    assert!(vm.update_phone("812345678").await.error().is_some());
    assert!(vm.field_errors.get().get("phone").is_some());
    assert_eq!(
        state.session().unwrap().user.phone.as_deref(),
        Some("987654321")
    );
    assert!(no_requests_sent(&server).await);
}

#[tokio::test]
async fn test_photo_upload_is_base64_encoded() {
    let server = MockServer::start().await;
    mount_post(
        &server,
        "/users/5/profile-photo",
        json!({ "base64Image": PHOTO_BASE64 }),
        json!({ "data": { "photoUrl": "https://cdn.itaxcix.com/u/5.jpg" } }),
    )
    .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    common::sign_in(&state, common::citizen()).await;

    let outcome = ProfileViewModel::new(state).upload_photo(PHOTO).await;
    assert_eq!(
        outcome.success().map(|p| p.photo_url.as_str()),
        Some("https://cdn.itaxcix.com/u/5.jpg")
    );
}

// ============================================================================
// Driver availability
// ============================================================================

#[tokio::test]
async fn test_going_offline_updates_flag_session_and_store() {
    let server = MockServer::start().await;
    mount_post(
        &server,
        "/drivers/9/availability",
        json!({ "driverId": 9, "available": false }),
        json!({ "data": { "driverId": 9, "available": false } }),
    )
    .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    common::sign_in(&state, common::driver()).await;
    let vm = DriverViewModel::new(state.clone()).await;
    assert!(vm.available.get());

    let outcome = vm.set_availability(false).await;
    assert_eq!(outcome.success().map(|s| s.available), Some(false));
    assert!(!vm.available.get());
    assert!(!state.driver_available().await.unwrap());
    assert_eq!(state.session().unwrap().user.driver_available, Some(false));
}

#[tokio::test]
async fn test_refresh_availability_adopts_backend_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drivers/9/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "driverId": 9, "available": false }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    common::sign_in(&state, common::driver()).await;
    let vm = DriverViewModel::new(state.clone()).await;

    let outcome = vm.refresh_availability().await;
    assert_eq!(outcome.success().map(|s| s.available), Some(false));
    assert!(!vm.available.get());
    assert!(!state.driver_available().await.unwrap());
}

#[tokio::test]
async fn test_availability_change_when_signed_out() {
    let server = MockServer::start().await;
    let state = common::state_for(&server.uri(), WS_UNUSED).await;
    let vm = DriverViewModel::new(state.clone()).await;

    let outcome = vm.set_availability(true).await;
    assert_eq!(outcome.error(), Some(SESSION_EXPIRED_MESSAGE));
    assert!(!vm.available.get());
    assert!(!state.driver_available().await.unwrap());
    assert!(no_requests_sent(&server).await);
}
