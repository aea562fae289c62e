//! Security audit logging
//!
//! Authentication and authorization events are logged at INFO level on the
//! `audit` target so they can be routed away from application logs. Each
//! event is also serialized to JSON and attached as the `event` field.
//!
//! Credentials never appear in an event.
//!
//! # Example
//!
//! ```ignore
//! use sitevault_api::audit::{audit_log, AuditEvent, RequestContext};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: user.id,
//!     email: user.email.clone(),
//!     context: RequestContext::default(),
//! });
//! ```

use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Client details attached to every audit event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess {
        user_id: Uuid,
        email: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    /// Failed login; `reason` is the error code returned to the client
    LoginFailure {
        email: String,
        reason: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    /// Session token refused by the auth middleware or verify endpoint
    TokenRejected {
        user_id: Option<Uuid>,
        reason: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    PasswordChange {
        user_id: Uuid,
        changed_by: Uuid,
        #[serde(flatten)]
        context: RequestContext,
    },

    /// Profile update; only the names of changed fields are recorded
    ProfileUpdate {
        user_id: Uuid,
        fields: Vec<String>,
        #[serde(flatten)]
        context: RequestContext,
    },

    AccessDenied {
        user_id: Uuid,
        email: String,
        resource: String,
        #[serde(flatten)]
        context: RequestContext,
    },
}

/// Log a security audit event
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess {
            user_id,
            email,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?context.ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            email,
            reason,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?context.ip_address,
                "Login failed"
            );
        }
        AuditEvent::TokenRejected {
            user_id,
            reason,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                reason = %reason,
                ip_address = ?context.ip_address,
                "Session token rejected"
            );
        }
        AuditEvent::PasswordChange {
            user_id,
            changed_by,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                changed_by = %changed_by,
                ip_address = ?context.ip_address,
                "Password changed"
            );
        }
        AuditEvent::ProfileUpdate {
            user_id,
            fields,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                fields = ?fields,
                ip_address = ?context.ip_address,
                "Profile updated"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            email,
            resource,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                resource = %resource,
                ip_address = ?context.ip_address,
                "Access denied"
            );
        }
    }
}

/// Client IP from proxy headers.
///
/// `X-Forwarded-For` wins over `X-Real-IP`; the first hop is the client.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(first.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
