//! Authentication and session module
//!
//! - Password hashing with bcrypt (legacy plaintext aware)
//! - Session token issuance and validation
//! - Middleware for request authentication
//! - Authentication service for login, password and profile changes
//! - Repository layer over the `users` table

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;

pub use jwt::{check_live_user, issue_token, validate_token, Claims, JwtConfig, TokenError};
pub use middleware::{auth_middleware, bearer_token, AuthenticatedUser};
pub use models::{ProfileChanges, User, UserPublic};
pub use password::{hash_password, is_hashed, verify_credential, verify_password, PasswordError};
pub use repository::{PgUserRepository, RepositoryError, UserRepository};
pub use service::{
    AuthService, ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    VerifyResponse,
};
