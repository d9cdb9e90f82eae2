//! Authentication middleware
//!
//! Validates the bearer token and scopes every request to one household.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    pub household_id: uuid::Uuid,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => return unauthorized_response(&msg),
    };

    let user_id = match uuid::Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    let household_id = match uuid::Uuid::parse_str(&claims.household_id) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid household ID in token"),
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        household_id,
    });

    next.run(request).await
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    sub: String,
    household_id: String,
    exp: i64,
    iat: i64,
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
    AppError::Unauthorized(message.to_string()).into_response()
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
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DatabaseConfig, JwtConfig, PlanningConfig, ServerConfig};
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn token(secret: &str, household_id: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            household_id: household_id.to_string(),
            exp: now + 3600,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_decode_valid_token() {
        let household = uuid::Uuid::new_v4().to_string();
        let claims = decode_jwt(&token("secret", &household), "secret").unwrap();
        assert_eq!(claims.household_id, household);
    }

    #[test]
    fn test_decode_rejects_wrong_secret() {
        let household = uuid::Uuid::new_v4().to_string();
        assert!(decode_jwt(&token("secret", &household), "other").is_err());
    }

    fn test_app() -> Router {
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/pantry_test")
            .unwrap();
        let state = AppState {
            db,
            config: Arc::new(Config {
                environment: "test".to_string(),
                server: ServerConfig {
                    port: 0,
                    host: "127.0.0.1".to_string(),
                },
                database: DatabaseConfig {
                    url: "postgres://localhost/pantry_test".to_string(),
                    max_connections: 1,
                    min_connections: 0,
                },
                jwt: JwtConfig {
                    secret: "secret".to_string(),
                },
                planning: PlanningConfig::default(),
            }),
        };

        Router::new()
            .route(
                "/me",
                get(|user: CurrentUser| async move { user.0.household_id.to_string() }),
            )
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    fn request(authorization: Option<String>) -> Request {
        let builder = axum::http::Request::builder().uri("/me");
        let builder = match authorization {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        };
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_missing_token_is_rejected() {
        tokio_test::block_on(async {
            let response = test_app().oneshot(request(None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        });
    }

    #[test]
    fn test_token_for_other_secret_is_rejected() {
        tokio_test::block_on(async {
            let household = uuid::Uuid::new_v4().to_string();
            let bearer = format!("Bearer {}", token("other", &household));
            let response = test_app().oneshot(request(Some(bearer))).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        });
    }

    #[test]
    fn test_valid_token_reaches_handler() {
        tokio_test::block_on(async {
            let household = uuid::Uuid::new_v4().to_string();
            let bearer = format!("Bearer {}", token("secret", &household));
            let response = test_app().oneshot(request(Some(bearer))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        });
    }
}
