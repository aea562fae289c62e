//! Authentication service layer
//!
//! Business logic behind the auth and user endpoints: login, token
//! authentication with the live user re-check, password change and profile
//! update. bcrypt work runs on the blocking pool.

use super::jwt::{check_live_user, issue_token, validate_token, JwtConfig};
use super::middleware::AuthenticatedUser;
use super::models::{
    ProfileChanges, UserPublic, ADMIN_PROFILE_FIELDS, CREDENTIAL_FIELDS, EDITABLE_PROFILE_FIELDS,
    IDENTIFIER_FIELDS,
};
use super::password::{hash_password, validate_new_password, verify_credential};
use super::repository::UserRepository;
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::{AppError, AuthFailure};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

lazy_static! {
    /// Production-cost hash checked when no account matches the login email
    static ref UNKNOWN_USER_CREDENTIAL: String =
        hash_password("sitevault-unknown-account").unwrap_or_default();
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "foreman@site.example.com")]
    pub email: String,
    pub password: String,
}

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Session token to send as `Authorization: Bearer <token>`
    pub token: String,
    pub user: UserPublic,
}

/// Identity behind a valid session token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub user: UserPublic,
}

/// Password change request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Target account; defaults to the caller. Only admins may name another user.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub current_password: String,
    pub new_password: String,
}

/// Documented shape of a profile update body.
///
/// Handlers accept an arbitrary JSON object and sanitize it with
/// [`profile_changes_from_fields`]; this type only describes the accepted keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdateRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub avatar_url: Option<String>,
    /// Admin only
    #[schema(example = "site_engineer")]
    pub role: Option<String>,
    /// Admin only
    #[schema(example = "active")]
    pub status: Option<String>,
}

/// Plain confirmation message
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt_config: JwtConfig,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, jwt_config: JwtConfig) -> Self {
        Self { users, jwt_config }
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.jwt_config
    }

    /// Login with email and password
    ///
    /// Unknown email and wrong password produce the same error. An inactive
    /// account is refused before the password is checked.
    pub async fn login(
        &self,
        request: LoginRequest,
        ctx: &RequestContext,
    ) -> Result<LoginResponse, AppError> {
        if request.email.is_empty() || request.password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        if !is_valid_email(&request.email) {
            return Err(AppError::Validation("Invalid email format".to_string()));
        }

        let fail = |reason: AuthFailure| {
            audit_log(&AuditEvent::LoginFailure {
                email: request.email.clone(),
                reason: reason.code().to_string(),
                context: ctx.clone(),
            });
            AppError::Unauthorized(reason)
        };

        let user = self.users.find_by_email(&request.email).await?;

        if user.as_ref().is_some_and(|u| !u.is_active()) {
            return Err(fail(AuthFailure::AccountInactive));
        }

        // An unknown email still pays for one bcrypt verification
        let stored = user.as_ref().map(|u| u.password.clone());
        let password = request.password.clone();
        let matches = tokio::task::spawn_blocking(move || match stored {
            Some(stored) => verify_credential(&password, &stored),
            None => verify_credential(&password, &UNKNOWN_USER_CREDENTIAL),
        })
        .await
        .map_err(|e| AppError::Internal(format!("password verification task: {e}")))?;

        let Some(user) = user.filter(|_| matches) else {
            return Err(fail(AuthFailure::InvalidCredentials));
        };

        let (token, _claims) = issue_token(&self.jwt_config, &user)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            email: user.email.clone(),
            context: ctx.clone(),
        });

        Ok(LoginResponse {
            token,
            user: user.to_public(),
        })
    }

    /// Validate a session token and re-check it against the live user record
    pub async fn authenticate(
        &self,
        token: &str,
        ctx: &RequestContext,
    ) -> Result<AuthenticatedUser, AppError> {
        let reject = |user_id: Option<Uuid>, failure: AuthFailure| {
            audit_log(&AuditEvent::TokenRejected {
                user_id,
                reason: failure.code().to_string(),
                context: ctx.clone(),
            });
            AppError::Unauthorized(failure)
        };

        let claims = validate_token(&self.jwt_config, token).map_err(|e| match AppError::from(e) {
            AppError::Unauthorized(failure) => reject(None, failure),
            other => other,
        })?;

        let user_id = claims
            .user_id()
            .map_err(|_| reject(None, AuthFailure::MalformedClaims))?;

        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Err(reject(Some(user_id), AuthFailure::InvalidToken));
        };

        check_live_user(&claims, &user).map_err(|e| match AppError::from(e) {
            AppError::Unauthorized(failure) => reject(Some(user_id), failure),
            other => other,
        })?;

        Ok(AuthenticatedUser { claims, user })
    }

    /// Change a password after verifying the current one
    ///
    /// The target defaults to the caller. Naming another account requires the
    /// caller's live role to be admin.
    pub async fn change_password(
        &self,
        caller: &AuthenticatedUser,
        request: ChangePasswordRequest,
        ctx: &RequestContext,
    ) -> Result<(), AppError> {
        let target_id = request.user_id.unwrap_or(caller.user.id);
        if target_id != caller.user.id && !caller.is_admin() {
            audit_log(&AuditEvent::AccessDenied {
                user_id: caller.user.id,
                email: caller.user.email.clone(),
                resource: format!("users/{target_id}/password"),
                context: ctx.clone(),
            });
            return Err(AppError::Forbidden(
                "You can only change your own password".to_string(),
            ));
        }

        if request.current_password.is_empty() || request.new_password.is_empty() {
            return Err(AppError::Validation(
                "Current and new password are required".to_string(),
            ));
        }
        validate_new_password(&request.new_password)?;

        let target = self
            .users
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let stored = target.password.clone();
        let current = request.current_password;
        let new_password = request.new_password;
        let hashed = tokio::task::spawn_blocking(move || {
            if !verify_credential(&current, &stored) {
                return Ok(None);
            }
            hash_password(&new_password).map(Some)
        })
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task: {e}")))??;

        let Some(hashed) = hashed else {
            return Err(AppError::Unauthorized(AuthFailure::InvalidCredentials));
        };

        self.users.update_password(target.id, &hashed).await?;

        audit_log(&AuditEvent::PasswordChange {
            user_id: target.id,
            changed_by: caller.user.id,
            context: ctx.clone(),
        });

        Ok(())
    }

    /// Apply a profile update to the caller's own record
    pub async fn update_profile(
        &self,
        caller: &AuthenticatedUser,
        fields: Map<String, Value>,
        ctx: &RequestContext,
    ) -> Result<UserPublic, AppError> {
        let changes = profile_changes_from_fields(fields, caller.is_admin())?;

        if changes.is_empty() {
            let current = self
                .users
                .find_by_id(caller.user.id)
                .await?
                .ok_or_else(|| AppError::NotFound("User".to_string()))?;
            return Ok(current.to_public());
        }

        let updated = self.users.update_profile(caller.user.id, &changes).await?;

        audit_log(&AuditEvent::ProfileUpdate {
            user_id: updated.id,
            fields: changed_field_names(&changes),
            context: ctx.clone(),
        });

        Ok(updated.to_public())
    }
}

/// Turn a raw profile field map into validated changes.
///
/// The identifier and every credential alias are dropped unconditionally.
/// Remaining keys must be editable columns (`role` and `status` only for
/// admins) with string values.
pub fn profile_changes_from_fields(
    mut fields: Map<String, Value>,
    is_admin: bool,
) -> Result<ProfileChanges, AppError> {
    for key in IDENTIFIER_FIELDS.iter().chain(CREDENTIAL_FIELDS) {
        fields.remove(*key);
    }

    let mut changes = ProfileChanges::default();
    for (key, value) in fields {
        let editable = EDITABLE_PROFILE_FIELDS.contains(&key.as_str())
            || (is_admin && ADMIN_PROFILE_FIELDS.contains(&key.as_str()));
        if !editable {
            return Err(AppError::Validation(format!(
                "Field '{key}' cannot be updated"
            )));
        }

        let Value::String(value) = value else {
            return Err(AppError::Validation(format!("Field '{key}' must be a string")));
        };

        match key.as_str() {
            "email" => {
                if !is_valid_email(&value) {
                    return Err(AppError::Validation("Invalid email format".to_string()));
                }
                changes.email = Some(value);
            }
            "first_name" => changes.first_name = Some(value),
            "last_name" => changes.last_name = Some(value),
            "phone" => changes.phone = Some(value),
            "company" => changes.company = Some(value),
            "job_title" => changes.job_title = Some(value),
            "avatar_url" => changes.avatar_url = Some(value),
            "role" => changes.role = Some(value.parse()?),
            "status" => changes.status = Some(value.parse()?),
            _ => {
                return Err(AppError::Validation(format!(
                    "Field '{key}' cannot be updated"
                )))
            }
        }
    }

    Ok(changes)
}

fn changed_field_names(changes: &ProfileChanges) -> Vec<String> {
    let present = [
        ("email", changes.email.is_some()),
        ("first_name", changes.first_name.is_some()),
        ("last_name", changes.last_name.is_some()),
        ("phone", changes.phone.is_some()),
        ("company", changes.company.is_some()),
        ("job_title", changes.job_title.is_some()),
        ("avatar_url", changes.avatar_url.is_some()),
        ("role", changes.role.is_some()),
        ("status", changes.status.is_some()),
    ];
    present
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// `local@domain.tld` with no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| !label.is_empty())
}
