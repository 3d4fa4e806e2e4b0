//! User, balance and notification endpoints.

use std::sync::Arc;

use application::UserInput;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::UserId;
use common::time::to_unix;
use domain::account::Account;
use domain::notification::Notification;
use domain::user::{User, UserStatus};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StoreUserRequest {
    /// Updates this user when present; creates a new one otherwise.
    pub id: Option<String>,
    pub login: String,
    pub email: Option<String>,
    pub telegram: Option<String>,
    #[serde(default)]
    pub status: i16,
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Deserialize)]
pub struct StoreBalanceRequest {
    pub balance: i64,
}

#[derive(Serialize)]
pub struct UserStoredResponse {
    pub user_id: UserId,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub login: String,
    pub email: Option<String>,
    pub telegram: Option<String>,
    pub status: i16,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            login: user.login,
            email: user.email,
            telegram: user.telegram,
            status: user.status.code(),
            created_at: to_unix(user.created_at),
            updated_at: to_unix(user.updated_at),
            deleted_at: user.deleted_at.map(to_unix),
        }
    }
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub user_id: UserId,
    pub balance: i64,
    pub updated_at: i64,
}

impl From<Account> for BalanceResponse {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.user_id,
            balance: account.balance,
            updated_at: to_unix(account.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub order_id: String,
    pub message: String,
    pub created_at: i64,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id.to_string(),
            order_id: notification.order_id.to_string(),
            message: notification.message,
            created_at: to_unix(notification.created_at),
        }
    }
}

/// POST /users: create a user (201) or update the one named by `id` (200).
#[tracing::instrument(skip(state, req), fields(login = %req.login))]
pub async fn store(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StoreUserRequest>,
) -> Result<(StatusCode, Json<UserStoredResponse>), ApiError> {
    let status = UserStatus::from_code(req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid user status: {}", req.status)))?;
    let id = req.id.as_deref().map(parse_id::<UserId>).transpose()?;

    let user_id = state
        .users
        .store_user(UserInput {
            id,
            login: req.login,
            email: req.email,
            telegram: req.telegram,
            status,
        })
        .await?;

    let code = if id.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((code, Json(UserStoredResponse { user_id })))
}

/// GET /users/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.find_user(parse_id(&id)?).await?;
    Ok(Json(user.into()))
}

/// DELETE /users/{id}?hard=: soft delete by default. Deleting an absent
/// user succeeds.
#[tracing::instrument(skip(state, query), fields(hard = query.hard))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    state.users.delete_user(parse_id(&id)?, query.hard).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/{id}/balance
#[tracing::instrument(skip(state))]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = state.accounts.find_balance(parse_id(&id)?).await?;
    Ok(Json(account.into()))
}

/// PUT /users/{id}/balance: creates the account on first write.
#[tracing::instrument(skip(state, req), fields(balance = req.balance))]
pub async fn store_balance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<StoreBalanceRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .store_balance(parse_id(&id)?, req.balance)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/{id}/notifications: newest first.
#[tracing::instrument(skip(state))]
pub async fn notifications(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let notifications = state.notifications.list_for_user(parse_id(&id)?).await?;
    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}
