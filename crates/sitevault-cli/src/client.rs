//! HTTP client for the SiteVault API
//!
//! Every authenticated call attaches the cached bearer token. When the server
//! rejects the session itself (anything but a wrong current password) the
//! cached session is cleared so the next command starts logged out.

use crate::session::{Session, SessionContext, SessionError, SessionStore, SessionUser};
use futures::StreamExt;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sitevault_core::ByteRange;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Error code returned for a wrong current password
const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Machine-readable code for API errors
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    token: String,
    user: SessionUser,
}

#[derive(Debug, Deserialize)]
struct VerifyReply {
    user: SessionUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
    current_password: &'a str,
    new_password: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageReply {
    message: String,
}

/// Result of a media download
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDownload {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_range: Option<String>,
    pub bytes_written: u64,
}

impl MediaDownload {
    /// Object size taken from `Content-Range: bytes a-b/N`
    pub fn total_size(&self) -> Option<u64> {
        self.content_range
            .as_deref()?
            .rsplit_once('/')?
            .1
            .parse()
            .ok()
    }
}

pub struct ApiClient<S: SessionStore> {
    http: reqwest::Client,
    base_url: String,
    session: SessionContext<S>,
}

impl<S: SessionStore> ApiClient<S> {
    pub fn new(base_url: impl Into<String>, session: SessionContext<S>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &SessionContext<S> {
        &self.session
    }

    pub fn into_session(self) -> SessionContext<S> {
        self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.session.bearer().ok_or(ClientError::NotLoggedIn)?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }

    /// Turn a non-success response into an error, clearing the session when
    /// the server refused the token
    async fn check(&mut self, response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error = api_error(response).await;
        if status == StatusCode::UNAUTHORIZED && error.code() != Some(INVALID_CREDENTIALS) {
            tracing::debug!(code = ?error.code(), "Session rejected, clearing cache");
            self.session.clear()?;
        }
        Err(error)
    }

    /// Log in and cache the new session
    pub async fn login(&mut self, email: &str, password: &str) -> Result<&SessionUser, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginBody { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let reply: LoginReply = response.json().await?;
        self.session.set(Session {
            token: reply.token,
            user: reply.user,
        })?;
        self.session.user().ok_or(ClientError::NotLoggedIn)
    }

    /// Re-check the cached token and refresh the cached identity
    pub async fn verify(&mut self) -> Result<SessionUser, ClientError> {
        let response = self.authorized(Method::POST, "/auth/verify")?.send().await?;
        let response = self.check(response).await?;

        let reply: VerifyReply = response.json().await?;
        self.session.update_user(reply.user.clone())?;
        Ok(reply.user)
    }

    /// Forget the cached session. Tokens are stateless so the server is not
    /// contacted.
    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.session.clear()?;
        Ok(())
    }

    /// Change a password; `user_id` names another account (admin only)
    pub async fn update_password(
        &mut self,
        user_id: Option<Uuid>,
        current_password: &str,
        new_password: &str,
    ) -> Result<String, ClientError> {
        let response = self
            .authorized(Method::PUT, "/users/password")?
            .json(&PasswordBody {
                user_id,
                current_password,
                new_password,
            })
            .send()
            .await?;
        let response = self.check(response).await?;

        let reply: MessageReply = response.json().await?;
        Ok(reply.message)
    }

    /// Apply profile field changes to the caller's record
    pub async fn update_profile(
        &mut self,
        fields: Map<String, Value>,
    ) -> Result<SessionUser, ClientError> {
        let response = self
            .authorized(Method::PUT, "/users/profile")?
            .json(&fields)
            .send()
            .await?;
        let response = self.check(response).await?;

        let user: SessionUser = response.json().await?;
        self.session.update_user(user.clone())?;
        Ok(user)
    }

    /// Stream a media object (or a byte range of it) into `dest`
    pub async fn fetch_media(
        &self,
        id: Uuid,
        range: Option<ByteRange>,
        dest: &Path,
    ) -> Result<MediaDownload, ClientError> {
        let mut request = self
            .http
            .get(self.url("/media"))
            .query(&[("id", id.to_string())]);
        if let Some(range) = range {
            request = request.header(header::RANGE, range.header_value());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let header_str = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let status = response.status().as_u16();
        let content_type = header_str(header::CONTENT_TYPE);
        let content_range = header_str(header::CONTENT_RANGE);

        let output_err = |source| ClientError::Output {
            path: dest.display().to_string(),
            source,
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(output_err)?;
        let mut bytes_written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(output_err)?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await.map_err(output_err)?;

        Ok(MediaDownload {
            status,
            content_type,
            content_range,
            bytes_written,
        })
    }
}

/// Decode the server's `{code, message}` error body
async fn api_error(response: Response) -> ClientError {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => ClientError::Api {
            status: status.as_u16(),
            code: body.code,
            message: body.message,
        },
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            code: format!("HTTP_{}", status.as_u16()),
            message: status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string(),
        },
    }
}
