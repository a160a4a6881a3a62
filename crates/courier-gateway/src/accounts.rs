// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Username/password accounts backing `/auth/*`.
//!
//! Passwords are stored as Argon2id PHC strings (Algorithm::Argon2id,
//! Version::V0x13) in the `users` collection. A user's id is the tenant id
//! carried by the tokens minted at login.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use courier_core::{CourierError, Criteria, StoreAdapter, TenantId, USERS_COLLECTION};

/// A stored account. The password hash never leaves this module.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    id: String,
    username: String,
    password: String,
    created_at: DateTime<Utc>,
}

/// What callers may see of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn tenant_id(&self) -> TenantId {
        TenantId(self.id.clone())
    }
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            created_at: record.created_at,
        }
    }
}

/// Registers and authenticates gateway users.
pub struct UserAccounts {
    store: Arc<dyn StoreAdapter>,
    params: Params,
    /// Serializes the uniqueness check and insert in `register`.
    registering: Mutex<()>,
}

impl std::fmt::Debug for UserAccounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserAccounts")
            .field("store", &self.store.name())
            .finish_non_exhaustive()
    }
}

impl UserAccounts {
    /// Accounts hashed with the default Argon2id cost.
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self::with_params(store, Params::default())
    }

    pub fn with_params(store: Arc<dyn StoreAdapter>, params: Params) -> Self {
        Self {
            store,
            params,
            registering: Mutex::new(()),
        }
    }

    /// Create an account. Usernames are unique and compared after trimming.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserProfile, CourierError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(CourierError::Validation(
                "username and password are required".into(),
            ));
        }

        let _registering = self.registering.lock().await;
        if self.find_by("username", username).await?.is_some() {
            return Err(CourierError::Validation("username already exists".into()));
        }

        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password: self.hash(password).await?,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&record)
            .map_err(|e| CourierError::Internal(format!("failed to encode user: {e}")))?;
        self.store.append(USERS_COLLECTION, value).await?;

        info!(user_id = %record.id, username, "user registered");
        Ok(record.into())
    }

    /// Check a username/password pair.
    ///
    /// Unknown users and wrong passwords fail the same way.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, CourierError> {
        let invalid = || CourierError::Unauthorized("invalid credentials".into());
        let Some(record) = self.find_by("username", username.trim()).await? else {
            debug!("login for unknown user");
            return Err(invalid());
        };
        if !self.verify(password, &record.password).await? {
            debug!(user_id = %record.id, "login with wrong password");
            return Err(invalid());
        }
        Ok(record.into())
    }

    pub async fn profile(&self, id: &str) -> Result<UserProfile, CourierError> {
        self.find_by("id", id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| CourierError::NotFound("user not found".into()))
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Option<UserRecord>, CourierError> {
        let found = self
            .store
            .find(USERS_COLLECTION, &Criteria::all().field(field, value))
            .await?;
        found
            .map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| CourierError::Internal(format!("malformed user record: {e}")))
            })
            .transpose()
    }

    async fn hash(&self, password: &str) -> Result<String, CourierError> {
        let salt = generate_salt()?;
        let params = self.params.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_password(password.as_bytes(), &salt, params))
            .await
            .map_err(|e| CourierError::Internal(format!("password hashing panicked: {e}")))?
    }

    async fn verify(&self, password: &str, phc: &str) -> Result<bool, CourierError> {
        let password = password.to_owned();
        let phc = phc.to_owned();
        tokio::task::spawn_blocking(move || verify_password(password.as_bytes(), &phc))
            .await
            .map_err(|e| CourierError::Internal(format!("password check panicked: {e}")))?
    }
}

fn argon2(params: Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Hash `password` into a PHC string.
fn hash_password(password: &[u8], salt: &[u8; 16], params: Params) -> Result<String, CourierError> {
    let salt = SaltString::encode_b64(salt)
        .map_err(|e| CourierError::Internal(format!("invalid password salt: {e}")))?;
    argon2(params)
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CourierError::Internal(format!("password hashing failed: {e}")))
}

/// The cost parameters are read back from the PHC string.
fn verify_password(password: &[u8], phc: &str) -> Result<bool, CourierError> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| CourierError::Internal(format!("stored password hash is malformed: {e}")))?;
    Ok(Argon2::default().verify_password(password, &parsed).is_ok())
}

fn generate_salt() -> Result<[u8; 16], CourierError> {
    let mut salt = [0u8; 16];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| CourierError::Internal("failed to generate random salt".into()))?;
    Ok(salt)
}
