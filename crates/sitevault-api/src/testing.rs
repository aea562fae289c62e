//! Test support: in-memory repositories and a stub object store
//!
//! Compiled for unit tests and behind the `test-utils` feature for the
//! integration tests in `tests/`.

use crate::auth::password::hash_password_with_cost;
use crate::auth::{ProfileChanges, RepositoryError, User, UserRepository};
use crate::media::{MediaObject, MediaRepository, ObjectStorage, StorageError};
use crate::state::AppState;
use async_trait::async_trait;
use axum::Router;
use sitevault_core::{AppConfig, UserRole};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Secret used by [`test_config`]
pub const TEST_JWT_SECRET: &str = "test-secret-for-sitevault";

/// bcrypt cost for fixtures
pub const TEST_BCRYPT_COST: u32 = 4;

/// Configuration with every required value filled in
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "postgres://unused".to_string();
    config.storage.backend_url = "http://storage.invalid".to_string();
    config.storage.service_key = "service-key".to_string();
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
    config.media.upstream_timeout_secs = 5;
    config
}

/// Active user with a bcrypt-hashed password
pub fn hashed_user(email: &str, password: &str, role: UserRole) -> User {
    let hash = hash_password_with_cost(password, TEST_BCRYPT_COST)
        .unwrap_or_else(|e| panic!("fixture hash failed: {e}"));
    User::new(email, hash, role)
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let repo = Self::new();
        for user in users {
            repo.insert(user);
        }
        repo
    }

    pub fn insert(&self, user: User) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user.id, user);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.read().ok()?.get(&id).cloned()
    }

    /// Mutate a stored record in place, as an out-of-band admin action would
    pub fn modify(&self, id: Uuid, f: impl FnOnce(&mut User)) {
        if let Ok(mut users) = self.users.write() {
            if let Some(user) = users.get_mut(&id) {
                f(user);
            }
        }
    }

    fn poisoned() -> RepositoryError {
        RepositoryError::DatabaseError("user store lock poisoned".to_string())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.get(&id).cloned())
    }

    async fn update_password(&self, id: Uuid, credential: &str) -> Result<(), RepositoryError> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;
        let user = users.get_mut(&id).ok_or(RepositoryError::UserNotFound)?;
        user.password = credential.to_string();
        user.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<User, RepositoryError> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;
        if let Some(email) = &changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(RepositoryError::EmailAlreadyExists);
            }
        }
        let user = users.get_mut(&id).ok_or(RepositoryError::UserNotFound)?;
        changes.apply_to(user);
        Ok(user.clone())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMediaRepository {
    objects: RwLock<HashMap<Uuid, MediaObject>>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object stored at `path` and return its id
    pub fn add(&self, path: &str, file_type: Option<&str>) -> Uuid {
        self.insert(MediaObject {
            id: Uuid::new_v4(),
            file_name: path.rsplit('/').next().map(str::to_string),
            file_path: Some(path.to_string()),
            file_type: file_type.map(str::to_string),
        })
    }

    /// Store a row as-is, including ones with no usable path
    pub fn insert(&self, object: MediaObject) -> Uuid {
        let id = object.id;
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(id, object);
        }
        id
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn find_media(&self, id: Uuid) -> Result<Option<MediaObject>, RepositoryError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| RepositoryError::DatabaseError("media lock poisoned".to_string()))?;
        Ok(objects.get(&id).cloned())
    }
}

/// Object store that "signs" by appending the path to a fixed base URL
pub struct StaticObjectStorage {
    base_url: String,
    fail: bool,
}

impl StaticObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fail: false,
        }
    }

    /// Storage whose signing endpoint always refuses
    pub fn failing() -> Self {
        Self {
            base_url: String::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ObjectStorage for StaticObjectStorage {
    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, StorageError> {
        if self.fail {
            return Err(StorageError::Rejected {
                status: 400,
                message: "Object not found".to_string(),
            });
        }
        Ok(format!(
            "{}/{}?token=test&expires_in={expires_in_secs}",
            self.base_url,
            path.trim_start_matches('/')
        ))
    }
}

/// Build shared state around the given collaborators
pub fn test_state(
    config: AppConfig,
    users: Arc<InMemoryUserRepository>,
    media: Arc<InMemoryMediaRepository>,
    storage: StaticObjectStorage,
) -> Arc<AppState> {
    let state = AppState::new(config, users, media, Arc::new(storage))
        .unwrap_or_else(|e| panic!("test state: {e}"));
    Arc::new(state)
}

/// Router over empty in-memory stores
pub fn create_router_for_testing() -> Router {
    let state = test_state(
        test_config(),
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryMediaRepository::new()),
        StaticObjectStorage::new("http://storage.invalid"),
    );
    crate::create_router(state)
}
