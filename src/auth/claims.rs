use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access-token payload. Carries enough identity to serve a request
/// without a store lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,         // user ID
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub iat: usize,        // issued at (unix timestamp)
    pub exp: usize,        // expires at (unix timestamp)
}

/// Refresh-token payload: identity only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}
