use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RegisterRequest, UpdateDetailsRequest,
            UpdatePasswordRequest,
        },
        error::AuthError,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{StoreError, UserStore},
        repo_types::{NewUser, UserChanges},
    },
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

lazy_static! {
    /// Hash checked when the email is unknown, so both login failures pay for Argon2.
    static ref DUMMY_HASH: String =
        hash_password("authkit-dummy-password").unwrap_or_default();
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_blocking(plain: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AuthError::Internal(anyhow::Error::new(e).context("hash task")))?
}

async fn verify_blocking(plain: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| AuthError::Internal(anyhow::Error::new(e).context("verify task")))
}

/// First use also builds `DUMMY_HASH`, so that stays on the blocking pool too.
async fn burn_dummy_verify(plain: String) -> Result<(), AuthError> {
    tokio::task::spawn_blocking(move || {
        verify_password(&plain, &DUMMY_HASH);
    })
    .await
    .map_err(|e| AuthError::Internal(anyhow::Error::new(e).context("verify task")))
}

/// Account operations. Holds no per-request state; everything durable
/// lives in the user store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
    password_min_length: usize,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            state.keys.clone(),
            state.config.password_min_length,
        )
    }
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys, password_min_length: usize) -> Self {
        Self {
            store,
            keys,
            password_min_length,
        }
    }

    fn check_password_length(&self, password: &str, problems: &mut Vec<String>) {
        if password.chars().count() < self.password_min_length {
            problems.push(format!(
                "password must be at least {} characters",
                self.password_min_length
            ));
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let name = req.name.trim().to_string();
        let email = normalize_email(&req.email);

        let mut problems = Vec::new();
        if name.is_empty() {
            problems.push("name is required".to_string());
        }
        if !is_valid_email(&email) {
            problems.push("email must be a valid email address".to_string());
        }
        self.check_password_length(&req.password, &mut problems);
        if !problems.is_empty() {
            warn!(?problems, "register rejected");
            return Err(AuthError::Validation(problems));
        }

        // Fast path; the store's unique constraint is what actually settles races.
        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = hash_blocking(req.password).await?;
        let user = self
            .store
            .create(NewUser {
                name,
                email,
                password_hash,
            })
            .await
            .map_err(|e| {
                if matches!(e, StoreError::DuplicateEmail) {
                    warn!("email registered concurrently");
                }
                AuthError::from(e)
            })?;

        let token = self.keys.issue(user.id)?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&req.email);
        if email.is_empty() || req.password.is_empty() {
            return Err(AuthError::Validation(vec![
                "email and password are required".to_string(),
            ]));
        }

        let Some(user) = self.store.find_by_email(&email).await? else {
            burn_dummy_verify(req.password).await?;
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_blocking(req.password, user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.keys.issue(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<PublicUser, AuthError> {
        let user = self.store.find_by_id(user_id).await?.ok_or_else(|| {
            warn!(user_id = %user_id, "token refers to missing user");
            AuthError::UserNotFound
        })?;
        Ok(user.into())
    }

    pub async fn update_details(
        &self,
        user_id: Uuid,
        req: UpdateDetailsRequest,
    ) -> Result<PublicUser, AuthError> {
        let name = req.name.map(|n| n.trim().to_string());
        let email = req.email.as_deref().map(normalize_email);

        let mut problems = Vec::new();
        if name.as_deref().is_some_and(str::is_empty) {
            problems.push("name must not be empty".to_string());
        }
        if email.as_deref().is_some_and(|e| !is_valid_email(e)) {
            problems.push("email must be a valid email address".to_string());
        }
        if !problems.is_empty() {
            warn!(?problems, "update details rejected");
            return Err(AuthError::Validation(problems));
        }

        let current = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let changes = UserChanges {
            name,
            email: email.filter(|e| *e != current.email),
        };
        if changes.is_empty() {
            return Ok(current.into());
        }

        if let Some(new_email) = &changes.email {
            if self.store.find_by_email(new_email).await?.is_some() {
                warn!(user_id = %user_id, email = %new_email, "email already registered");
                return Err(AuthError::DuplicateEmail);
            }
        }

        let user = self
            .store
            .update_details(user_id, changes)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        info!(user_id = %user.id, "user details updated");
        Ok(user.into())
    }

    /// Earlier tokens stay valid until they expire; only a fresh one is issued.
    pub async fn update_password(
        &self,
        user_id: Uuid,
        req: UpdatePasswordRequest,
    ) -> Result<AuthResponse, AuthError> {
        let mut problems = Vec::new();
        if req.current_password.is_empty() {
            problems.push("current password is required".to_string());
        }
        self.check_password_length(&req.new_password, &mut problems);
        if !problems.is_empty() {
            warn!(?problems, "update password rejected");
            return Err(AuthError::Validation(problems));
        }

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_blocking(req.current_password, user.password_hash).await? {
            warn!(user_id = %user_id, "update password with wrong current password");
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = hash_blocking(req.new_password).await?;
        let user = self
            .store
            .update_password(user_id, &password_hash)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = self.keys.issue(user.id)?;
        info!(user_id = %user.id, "password updated");
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        if !self.store.delete(user_id).await? {
            warn!(user_id = %user_id, "delete of missing user");
            return Err(AuthError::UserNotFound);
        }
        info!(user_id = %user_id, "user deleted");
        Ok(())
    }
}
