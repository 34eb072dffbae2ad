//! HTTP client for the iTaxCix API
//!
//! Handles all REST communication with the backend. Success bodies arrive in
//! an `{ "message", "data" }` envelope; failures carry `error.message`.

use std::time::Duration;

use reqwest::{Client, Method, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{AppError, AppResult, GENERIC_ERROR_MESSAGE};
use crate::models::{
    Ack, ApiErrorBody, ApiResponse, BiometricValidationRequest, BiometricValidationResponse,
    CitizenProfile, ContactVerificationRequest, DocumentValidationRequest,
    DocumentValidationResponse, DriverProfile, DriverStatus, EmailUpdate, IncidentReport,
    IncidentResponse, LoginRequest, LoginResult, Page, PasswordReset, PhoneUpdate, ProfilePhoto,
    ProfilePhotoUpload, RatingRequest, RatingsComments, RecoveryCodeVerification,
    RecoveryRequest, RecoveryResponse, RecoveryToken, RegistrationRequest, RegistrationResponse,
    TravelHistoryItem, TravelRequest, TravelRespond, TravelResponse, User,
    VehicleValidationRequest, VehicleValidationResponse,
};

/// Envelope of endpoints whose `data` is absent or irrelevant
#[derive(Debug, Deserialize)]
struct AckEnvelope {
    #[serde(default)]
    message: Option<String>,
}

/// API client for the iTaxCix backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build URL for endpoint
    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn request(&self, method: Method, endpoint: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method, self.url(endpoint));

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Make GET request and unwrap the `data` envelope
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, token: Option<&str>) -> AppResult<T> {
        let response = self.request(Method::GET, endpoint, token).send().await?;
        let envelope: ApiResponse<T> = self.handle_response(response, token.is_some()).await?;
        Ok(envelope.data)
    }

    /// Make request with JSON body and unwrap the `data` envelope
    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
        token: Option<&str>,
    ) -> AppResult<T> {
        let response = self
            .request(method, endpoint, token)
            .json(body)
            .send()
            .await?;
        let envelope: ApiResponse<T> = self.handle_response(response, token.is_some()).await?;
        Ok(envelope.data)
    }

    /// Make request whose success body only carries a message
    async fn send_ack<B: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> AppResult<Ack> {
        let mut request = self.request(method, endpoint, token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let envelope: AckEnvelope = self.handle_response(response, token.is_some()).await?;
        Ok(Ack {
            message: envelope.message,
        })
    }

    /// Handle response and parse JSON.
    ///
    /// A 401 only means an expired session when a token was sent; anonymous
    /// endpoints such as login report bad credentials the same way.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        authenticated: bool,
    ) -> AppResult<T> {
        let status = response.status();

        if authenticated && status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::SessionExpired);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&error_text);
            tracing::warn!("API error ({}): {}", status, message);
            return Err(AppError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data = response.json().await?;
        Ok(data)
    }

    // ========================================================================
    // Auth Endpoints
    // ========================================================================

    /// Sign in with document number and password
    pub async fn login(&self, document_value: &str, password: &str) -> AppResult<LoginResult> {
        let body = LoginRequest {
            document_value: document_value.to_string(),
            password: password.to_string(),
        };
        self.send(Method::POST, "/auth/login", &body, None).await
    }

    /// Fetch the authenticated user record
    pub async fn get_user(&self, user_id: i64, token: &str) -> AppResult<User> {
        self.get(&format!("/users/{}", user_id), Some(token)).await
    }

    pub async fn start_recovery(&self, request: &RecoveryRequest) -> AppResult<RecoveryResponse> {
        self.send(Method::POST, "/auth/recovery/start", request, None)
            .await
    }

    pub async fn verify_recovery_code(
        &self,
        request: &RecoveryCodeVerification,
    ) -> AppResult<RecoveryToken> {
        self.send(Method::POST, "/auth/recovery/verify-code", request, None)
            .await
    }

    /// Set a new password, authorised by the temporary recovery token
    pub async fn reset_password(&self, request: &PasswordReset, temp_token: &str) -> AppResult<Ack> {
        self.send_ack(
            Method::POST,
            "/auth/recovery/change-password",
            Some(request),
            Some(temp_token),
        )
        .await
    }

    // ========================================================================
    // Registration Endpoints
    // ========================================================================

    pub async fn validate_document(
        &self,
        request: &DocumentValidationRequest,
    ) -> AppResult<DocumentValidationResponse> {
        self.send(Method::POST, "/registration/validate-document", request, None)
            .await
    }

    pub async fn validate_biometric(
        &self,
        request: &BiometricValidationRequest,
    ) -> AppResult<BiometricValidationResponse> {
        self.send(Method::POST, "/registration/validate-biometric", request, None)
            .await
    }

    pub async fn validate_vehicle(
        &self,
        request: &VehicleValidationRequest,
    ) -> AppResult<VehicleValidationResponse> {
        self.send(Method::POST, "/registration/validate-vehicle", request, None)
            .await
    }

    pub async fn register(&self, request: &RegistrationRequest) -> AppResult<RegistrationResponse> {
        self.send(Method::POST, "/registration/register", request, None)
            .await
    }

    pub async fn verify_contact(&self, request: &ContactVerificationRequest) -> AppResult<Ack> {
        self.send_ack(
            Method::POST,
            "/registration/verify-contact",
            Some(request),
            None,
        )
        .await
    }

    // ========================================================================
    // Profile Endpoints
    // ========================================================================

    pub async fn get_citizen_profile(&self, user_id: i64, token: &str) -> AppResult<CitizenProfile> {
        self.get(&format!("/profile/citizen/{}", user_id), Some(token))
            .await
    }

    pub async fn get_driver_profile(&self, user_id: i64, token: &str) -> AppResult<DriverProfile> {
        self.get(&format!("/profile/driver/{}", user_id), Some(token))
            .await
    }

    pub async fn update_email(&self, user_id: i64, email: &str, token: &str) -> AppResult<Ack> {
        let body = EmailUpdate {
            email: email.to_string(),
        };
        self.send_ack(
            Method::PUT,
            &format!("/users/{}/email", user_id),
            Some(&body),
            Some(token),
        )
        .await
    }

    pub async fn update_phone(&self, user_id: i64, phone: &str, token: &str) -> AppResult<Ack> {
        let body = PhoneUpdate {
            phone: phone.to_string(),
        };
        self.send_ack(
            Method::PUT,
            &format!("/users/{}/phone", user_id),
            Some(&body),
            Some(token),
        )
        .await
    }

    pub async fn upload_profile_photo(
        &self,
        user_id: i64,
        upload: &ProfilePhotoUpload,
        token: &str,
    ) -> AppResult<ProfilePhoto> {
        self.send(
            Method::POST,
            &format!("/users/{}/profile-photo", user_id),
            upload,
            Some(token),
        )
        .await
    }

    // ========================================================================
    // Driver Endpoints
    // ========================================================================

    pub async fn get_driver_status(&self, driver_id: i64, token: &str) -> AppResult<DriverStatus> {
        self.get(&format!("/drivers/{}/status", driver_id), Some(token))
            .await
    }

    /// Turn trip reception on or off
    pub async fn set_driver_availability(
        &self,
        driver_id: i64,
        available: bool,
        token: &str,
    ) -> AppResult<DriverStatus> {
        let body = DriverStatus {
            driver_id,
            available,
        };
        self.send(
            Method::POST,
            &format!("/drivers/{}/availability", driver_id),
            &body,
            Some(token),
        )
        .await
    }

    // ========================================================================
    // Travel Endpoints
    // ========================================================================

    pub async fn request_travel(
        &self,
        request: &TravelRequest,
        token: &str,
    ) -> AppResult<TravelResponse> {
        self.send(Method::POST, "/travels", request, Some(token))
            .await
    }

    /// Driver accepts or rejects a pending request
    pub async fn respond_travel(
        &self,
        travel_id: i64,
        accept: bool,
        token: &str,
    ) -> AppResult<TravelResponse> {
        self.send(
            Method::PATCH,
            &format!("/travels/{}/respond", travel_id),
            &TravelRespond { accept },
            Some(token),
        )
        .await
    }

    pub async fn start_travel(&self, travel_id: i64, token: &str) -> AppResult<TravelResponse> {
        self.transition(travel_id, "start", token).await
    }

    pub async fn complete_travel(&self, travel_id: i64, token: &str) -> AppResult<TravelResponse> {
        self.transition(travel_id, "complete", token).await
    }

    pub async fn cancel_travel(&self, travel_id: i64, token: &str) -> AppResult<TravelResponse> {
        self.transition(travel_id, "cancel", token).await
    }

    async fn transition(&self, travel_id: i64, action: &str, token: &str) -> AppResult<TravelResponse> {
        let response = self
            .request(
                Method::PATCH,
                &format!("/travels/{}/{}", travel_id, action),
                Some(token),
            )
            .send()
            .await?;
        let envelope: ApiResponse<TravelResponse> = self.handle_response(response, true).await?;
        Ok(envelope.data)
    }

    /// Travel history (paginated, 1-based pages)
    pub async fn travel_history(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
        token: &str,
    ) -> AppResult<Page<TravelHistoryItem>> {
        self.get(
            &format!(
                "/travels/history/{}?page={}&perPage={}",
                user_id, page, per_page
            ),
            Some(token),
        )
        .await
    }

    // ========================================================================
    // Rating & Incident Endpoints
    // ========================================================================

    pub async fn rate_travel(
        &self,
        travel_id: i64,
        rating: &RatingRequest,
        token: &str,
    ) -> AppResult<Ack> {
        self.send_ack(
            Method::POST,
            &format!("/travels/{}/rating", travel_id),
            Some(rating),
            Some(token),
        )
        .await
    }

    pub async fn get_ratings(&self, user_id: i64, token: &str) -> AppResult<RatingsComments> {
        self.get(&format!("/ratings/{}", user_id), Some(token))
            .await
    }

    pub async fn report_incident(
        &self,
        report: &IncidentReport,
        token: &str,
    ) -> AppResult<IncidentResponse> {
        self.send(Method::POST, "/incidents", report, Some(token))
            .await
    }
}

/// Best-effort extraction of `error.message` from an error body
pub fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}
