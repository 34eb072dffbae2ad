//! REST request and response records mirroring the backend JSON contracts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Envelope Types
// ============================================================================

/// Success envelope wrapping every 2xx body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

/// Error body of a non-2xx response: `{ "error": { "message": "..." } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}

/// Plain acknowledgement returned by endpoints with no payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Auth Types
// ============================================================================

/// User role as reported by the backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Citizen,
    Driver,
    Admin,
    #[serde(other)]
    Unknown,
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub document_value: String,
    pub password: String,
}

/// Authenticated user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    /// Only present for drivers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_available: Option<bool>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_driver(&self) -> bool {
        self.has_role(Role::Driver)
    }
}

/// Body of a successful login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub token: String,
    pub user: User,
}

// ============================================================================
// Password Recovery Types
// ============================================================================

/// Channel a verification code is sent through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactType {
    Email,
    Phone,
}

impl ContactType {
    /// Backend catalogue id
    pub fn id(self) -> i32 {
        match self {
            ContactType::Email => 1,
            ContactType::Phone => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryRequest {
    pub contact_type_id: i32,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryResponse {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryCodeVerification {
    pub user_id: i64,
    pub code: String,
}

/// Short-lived token authorising a password reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryToken {
    pub temp_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub user_id: i64,
    pub new_password: String,
    pub repeat_password: String,
}

// ============================================================================
// Registration Types
// ============================================================================

/// Identity document kinds accepted at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Dni,
}

impl DocumentType {
    pub fn id(self) -> i32 {
        match self {
            DocumentType::Dni => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentValidationRequest {
    pub document_type_id: i32,
    pub document_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentValidationResponse {
    pub person_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Face photo matched against the document holder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricValidationRequest {
    pub person_id: i64,
    pub base64_image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricValidationResponse {
    pub person_id: i64,
    pub validated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleValidationRequest {
    pub person_id: i64,
    pub plate_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleValidationResponse {
    pub person_id: i64,
    pub vehicle_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub password: String,
    pub contact_type_id: i32,
    pub contact_value: String,
    pub person_id: i64,
    /// Drivers only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactVerificationRequest {
    pub user_id: i64,
    pub code: String,
}

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitizenProfile {
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub license_plate: String,
    #[serde(default)]
    pub vehicle_description: Option<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub available: bool,
}

/// Either profile shape, chosen by the user's role
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    Citizen(CitizenProfile),
    Driver(DriverProfile),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailUpdate {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneUpdate {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePhotoUpload {
    pub base64_image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePhoto {
    pub photo_url: String,
}

// ============================================================================
// Driver Types
// ============================================================================

/// Availability of a driver to receive trip requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStatus {
    pub driver_id: i64,
    pub available: bool,
}

// ============================================================================
// Travel Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Lifecycle state of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelStatus {
    Requested,
    Accepted,
    Rejected,
    Started,
    Completed,
    Cancelled,
}

impl TravelStatus {
    /// No further transitions happen after these
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TravelStatus::Rejected | TravelStatus::Completed | TravelStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TravelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TravelStatus::Requested => write!(f, "requested"),
            TravelStatus::Accepted => write!(f, "accepted"),
            TravelStatus::Rejected => write!(f, "rejected"),
            TravelStatus::Started => write!(f, "started"),
            TravelStatus::Completed => write!(f, "completed"),
            TravelStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Citizen asks a specific driver for a ride
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelRequest {
    pub citizen_id: i64,
    pub driver_id: i64,
    pub origin: Coordinates,
    pub destination: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelResponse {
    pub travel_id: i64,
    pub status: TravelStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Driver's answer to an incoming request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelRespond {
    pub accept: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelHistoryItem {
    pub travel_id: i64,
    pub status: TravelStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub origin_address: Option<String>,
    #[serde(default)]
    pub destination_address: Option<String>,
    /// Name of the other party (driver for citizens, passenger for drivers)
    #[serde(default)]
    pub counterpart_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// Paginated response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

// ============================================================================
// Rating Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingRequest {
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingComment {
    pub rater_name: String,
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingsComments {
    pub average_rating: f64,
    pub total_ratings: u32,
    #[serde(default)]
    pub comments: Vec<RatingComment>,
}

// ============================================================================
// Incident Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    pub user_id: i64,
    pub travel_id: i64,
    pub type_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentResponse {
    pub incident_id: i64,
}
