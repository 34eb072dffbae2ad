//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use itaxcix_core::db;
use itaxcix_core::models::{Role, User};
use itaxcix_core::{AppState, ClientConfig, Session, SharedState};

/// State backed by an in-memory store, pointed at a mock backend
pub async fn state_for(api_url: &str, ws_url: &str) -> SharedState {
    let config = ClientConfig {
        api_url: api_url.to_string(),
        ws_url: ws_url.to_string(),
        http_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    };
    let pool = db::connect_in_memory().await.unwrap();
    Arc::new(AppState::with_pool(config, pool).unwrap())
}

pub fn citizen() -> User {
    User {
        id: 5,
        first_name: "Lucía".to_string(),
        last_name: "Quispe".to_string(),
        document: "12345678".to_string(),
        email: Some("lucia@correo.pe".to_string()),
        phone: Some("987654321".to_string()),
        roles: vec![Role::Citizen],
        permissions: vec![],
        average_rating: Some(4.8),
        driver_available: None,
    }
}

pub fn citizen_json() -> Value {
    json!({
        "id": 5,
        "firstName": "Lucía",
        "lastName": "Quispe",
        "document": "12345678",
        "email": "lucia@correo.pe",
        "phone": "987654321",
        "roles": ["CITIZEN"],
        "permissions": [],
        "averageRating": 4.8
    })
}

pub fn driver() -> User {
    User {
        id: 9,
        first_name: "Jorge".to_string(),
        last_name: "Ramos".to_string(),
        document: "40112233".to_string(),
        email: None,
        phone: Some("912345678".to_string()),
        roles: vec![Role::Driver],
        permissions: vec![],
        average_rating: Some(4.6),
        driver_available: Some(true),
    }
}

/// Sign `user` in without going through the login endpoint
pub async fn sign_in(state: &SharedState, user: User) {
    state
        .set_session(Session {
            token: "tok-test".to_string(),
            user,
        })
        .await
        .unwrap();
}
