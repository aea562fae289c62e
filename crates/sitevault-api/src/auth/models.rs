//! User models for the authentication layer
//!
//! - User: full record as held by the credential store
//! - UserPublic: response representation with the credential removed
//!
//! These map to the `users` table of the hosted database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitevault_core::{UserRole, UserStatus};
use utoipa::ToSchema;
use uuid::Uuid;

/// Keys that name the user identifier in a profile update
pub const IDENTIFIER_FIELDS: &[&str] = &["id"];

/// Keys that name the stored credential in a profile update
pub const CREDENTIAL_FIELDS: &[&str] = &["password", "password_hash", "credential"];

/// Profile columns any authenticated user may change on their own record
pub const EDITABLE_PROFILE_FIELDS: &[&str] = &[
    "email",
    "first_name",
    "last_name",
    "phone",
    "company",
    "job_title",
    "avatar_url",
];

/// Profile columns only an admin may change
pub const ADMIN_PROFILE_FIELDS: &[&str] = &["role", "status"];

/// User account as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique, immutable identifier
    pub id: Uuid,

    /// Login email (unique, case-sensitive as stored)
    pub email: String,

    /// bcrypt hash, or plaintext for accounts not yet migrated.
    /// Never serialized.
    #[serde(skip_serializing, default)]
    pub password: String,

    pub role: UserRole,

    #[serde(default)]
    pub status: UserStatus,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create an active user with the given credential
    pub fn new(email: impl Into<String>, password: impl Into<String>, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password: password.into(),
            role,
            status: UserStatus::Active,
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            company: None,
            job_title: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }

    /// Convert user to public representation (without the credential)
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            status: self.status,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            company: self.company.clone(),
            job_title: self.job_title.clone(),
            avatar_url: self.avatar_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public user representation (safe for API responses)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    #[schema(value_type = String, example = "project_manager")]
    pub role: UserRole,
    #[schema(value_type = String, example = "active")]
    pub status: UserStatus,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated set of column changes for a profile update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the changes to an in-memory record
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(first_name) = &self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(company) = &self.company {
            user.company = Some(company.clone());
        }
        if let Some(job_title) = &self.job_title {
            user.job_title = Some(job_title.clone());
        }
        if let Some(avatar_url) = &self.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(status) = self.status {
            user.status = status;
        }
        user.updated_at = Utc::now();
    }
}
