// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, HttpResponse, post, web};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::task::{Context, Poll};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::response::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};
use crate::{AppState, db, validation};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: Role,
    unit_id: Option<Uuid>,
    exp: usize,
}

/// The authenticated caller, put into request extensions by [`JwtMiddleware`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub unit_id: Option<Uuid>,
}

impl AuthUser {
    /// Row filter for unit-owned data: `None` for headquarters.
    pub fn scope(&self) -> Option<Uuid> {
        match self.role {
            Role::Headquarters => None,
            Role::Unit => self.unit_id,
        }
    }

    pub fn is_headquarters(&self) -> bool {
        self.role == Role::Headquarters
    }

    pub fn require_headquarters(&self) -> AppResult<()> {
        if self.is_headquarters() {
            Ok(())
        } else {
            Err(AppError::Forbidden("headquarters only".to_string()))
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub unit_id: Option<Uuid>,
}

pub fn issue_token(secret: &str, ttl_days: i64, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (Utc::now() + Duration::days(ttl_days.max(1))).timestamp() as usize;
    let claims = Claims {
        sub: user.id,
        role: user.role,
        unit_id: user.unit_id,
        exp: expiration,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}

fn decode_token(secret: &str, token: &str) -> Result<AuthUser, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_ref()), &Validation::default())?;
    Ok(AuthUser {
        id: data.claims.sub,
        role: data.claims.role,
        unit_id: data.claims.unit_id,
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "JWT issued", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
#[post("/auth/login")]
pub async fn login(state: web::Data<AppState>, payload: web::Json<LoginRequest>) -> AppResult<HttpResponse> {
    let invalid = || AppError::Unauthorized("invalid credentials".to_string());

    let user = db::users::find_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(invalid)?;

    let matches = verify(&payload.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("bcrypt verify error: {e}")))?;
    if !matches {
        return Err(invalid());
    }

    let token = issue_token(&state.config.jwt_secret, state.config.jwt_ttl_days, &user)
        .map_err(|e| AppError::Internal(format!("jwt encode error: {e}")))?;
    log::info!("login user_id={} role={}", user.id, user.role);

    Ok(ApiResponse::ok(AuthResponse { token, user }))
}

/// Validation and hashing shared by `POST /api/users` and the admin CLI.
pub async fn create_user(state: &AppState, req: &CreateUserRequest) -> AppResult<User> {
    validation::validate_email(&req.email).map_err(AppError::Validation)?;
    if req.password.len() < 8 {
        return Err(AppError::Validation("password must have at least 8 characters".to_string()));
    }
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    let unit_id = match (req.role, req.unit_id) {
        (Role::Unit, None) => {
            return Err(AppError::Validation("unit users need a unit_id".to_string()));
        }
        (Role::Unit, Some(unit_id)) => {
            db::units::get(&state.pool, unit_id)
                .await?
                .ok_or_else(|| AppError::NotFound("unit not found".to_string()))?;
            Some(unit_id)
        }
        (Role::Headquarters, _) => None,
    };

    let password_hash =
        hash(&req.password, DEFAULT_COST).map_err(|e| AppError::Internal(format!("bcrypt hash error: {e}")))?;
    let user = db::users::insert(&state.pool, &req.email, &password_hash, &req.name, req.role, unit_id).await?;
    log::info!("user created id={} role={}", user.id, user.role);
    Ok(user)
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses((status = 201, description = "User created", body = User)),
    security(("bearer" = [])),
    tag = "auth"
)]
#[post("/users")]
pub async fn create_user_handler(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CreateUserRequest>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    let created = create_user(&state, &payload).await?;
    Ok(ApiResponse::created(created))
}

/// Middleware that:
/// - reads `Authorization: Bearer <jwt>`
/// - validates it with the configured secret
/// - puts an [`AuthUser`] into `req.extensions_mut()`
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(secret) = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.config.jwt_secret.clone())
        else {
            return Box::pin(async move {
                Err(AppError::Configuration("application state missing".to_string()).into())
            });
        };

        let token = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim);

        let Some(token) = token else {
            return Box::pin(async move {
                Err(AppError::Unauthorized("missing or invalid Authorization header".to_string()).into())
            });
        };

        match decode_token(&secret, token) {
            Ok(user) if user.role == Role::Unit && user.unit_id.is_none() => Box::pin(async move {
                Err(AppError::Forbidden("unit user without unit".to_string()).into())
            }),
            Ok(user) => {
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(_) => Box::pin(async move { Err(AppError::Unauthorized("invalid token".to_string()).into()) }),
        }
    }
}
