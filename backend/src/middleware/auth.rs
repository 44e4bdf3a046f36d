//! Authentication middleware
//!
//! Bearer-token validation and role checks. Token issuance lives outside this
//! service; here we only verify the signature and lift the caller's tenant
//! identity into request extensions.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::{role_satisfies, Role, UserType};
use uuid::Uuid;

use crate::error::{AppError, ErrorDetail, ErrorResponse};
use crate::AppState;

/// Authenticated caller extracted from the bearer token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub company_id: Uuid,
    /// Home store for staff accounts
    pub store_id: Option<Uuid>,
    pub role: Option<Role>,
    pub user_type: UserType,
}

impl AuthUser {
    /// Fail with `InsufficientPermissions` unless the caller holds at least `required`
    pub fn require_role(&self, required: Role) -> Result<(), AppError> {
        if role_satisfies(self.user_type, self.role, required) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions {
                required: required.as_str().to_string(),
            })
        }
    }
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub(crate) struct Claims {
    pub id: String,
    #[serde(rename = "userType")]
    pub user_type: String,
    pub company_id: Option<String>,
    pub store_id: Option<String>,
    pub role: Option<String>,
    pub exp: i64,
}

/// Authentication middleware that validates JWT tokens against `jwt.secret`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Access token required"),
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => return unauthorized_response(&msg),
    };

    match auth_user_from_claims(claims) {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Err(msg) => unauthorized_response(msg),
    }
}

/// Map verified claims onto the caller identity. Every inventory operation is
/// company-scoped, so tokens without a company are refused.
pub(crate) fn auth_user_from_claims(claims: Claims) -> Result<AuthUser, &'static str> {
    let user_id = Uuid::parse_str(&claims.id).map_err(|_| "Invalid user ID in token")?;

    let user_type = UserType::from_str(&claims.user_type).ok_or("Unknown user type in token")?;

    let company_id = claims
        .company_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or("Token is not bound to a company")?;

    let store_id = match claims.store_id.as_deref() {
        Some(id) => Some(Uuid::parse_str(id).map_err(|_| "Invalid store ID in token")?),
        None => None,
    };

    Ok(AuthUser {
        user_id,
        company_id,
        store_id,
        role: claims.role.as_deref().and_then(Role::from_str),
        user_type,
    })
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail::new("UNAUTHORIZED", "Authentication required"),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}
