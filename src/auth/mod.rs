//! Identity boundary. Repositories only ever ask for the current user id.

use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use uuid::Uuid;

use crate::errors::{MoneyError, Result, ValidationError};

const MIN_PASSWORD_LEN: usize = 6;

pub trait AuthProvider: Send + Sync {
    /// Identifier of the signed-in user, or [`MoneyError::NotAuthenticated`].
    fn current_user_id(&self) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub provider: String,
}

#[derive(Debug, Clone)]
struct PasswordAccount {
    uid: String,
    password: String,
}

#[derive(Debug, Default)]
struct AuthState {
    accounts: HashMap<String, PasswordAccount>,
    federated: HashMap<(String, String), String>,
    current: Option<AuthUser>,
}

/// Local stand-in for the hosted identity provider: email/password accounts
/// plus federated sign-in by provider token.
#[derive(Debug, Default)]
pub struct InMemoryAuth {
    state: RwLock<AuthState>,
}

impl InMemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that already has `uid` signed in.
    pub fn signed_in(uid: impl Into<String>) -> Self {
        let auth = Self::new();
        if let Ok(mut state) = auth.state.write() {
            state.current = Some(AuthUser {
                uid: uid.into(),
                email: None,
                provider: "custom".into(),
            });
        }
        auth
    }

    /// Creates an email/password account and signs it in.
    pub fn register(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(MoneyError::Repository(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let mut state = self.write()?;
        if state.accounts.contains_key(&email) {
            return Err(MoneyError::Repository(
                "The email address is already in use by another account".into(),
            ));
        }
        let uid = new_uid();
        state.accounts.insert(
            email.clone(),
            PasswordAccount {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        let user = AuthUser {
            uid,
            email: Some(email),
            provider: "password".into(),
        };
        state.current = Some(user.clone());
        tracing::info!(uid = %user.uid, "registered new account");
        Ok(user)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = normalize_email(email)?;
        let mut state = self.write()?;
        let uid = match state.accounts.get(&email) {
            Some(account) if account.password == password => account.uid.clone(),
            _ => {
                tracing::warn!("sign-in rejected");
                return Err(MoneyError::Repository("Invalid email or password".into()));
            }
        };
        let user = AuthUser {
            uid,
            email: Some(email),
            provider: "password".into(),
        };
        state.current = Some(user.clone());
        Ok(user)
    }

    /// Federated sign-in: the same provider token always maps to the same user.
    pub fn sign_in_with_token(&self, provider: &str, id_token: &str) -> Result<AuthUser> {
        let token = id_token.trim();
        if token.is_empty() {
            return Err(MoneyError::Repository("Missing identity token".into()));
        }
        let mut state = self.write()?;
        let uid = state
            .federated
            .entry((provider.to_string(), token.to_string()))
            .or_insert_with(new_uid)
            .clone();
        let user = AuthUser {
            uid,
            email: None,
            provider: provider.to_string(),
        };
        state.current = Some(user.clone());
        tracing::info!(provider, uid = %user.uid, "signed in with identity token");
        Ok(user)
    }

    pub fn sign_out(&self) {
        if let Ok(mut state) = self.state.write() {
            state.current = None;
        }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.read().ok().and_then(|state| state.current.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, AuthState>> {
        self.state
            .read()
            .map_err(|_| MoneyError::Repository("auth state lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, AuthState>> {
        self.state
            .write()
            .map_err(|_| MoneyError::Repository("auth state lock poisoned".into()))
    }
}

impl AuthProvider for InMemoryAuth {
    fn current_user_id(&self) -> Result<String> {
        self.read()?
            .current
            .as_ref()
            .map(|user| user.uid.clone())
            .ok_or(MoneyError::NotAuthenticated)
    }
}

/// Sign-up screen input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::BlankEmail);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }

    /// Validates, then registers against `auth`. Nothing is sent on a local failure.
    pub fn submit(&self, auth: &InMemoryAuth) -> Result<AuthUser> {
        self.validate()?;
        auth.register(&self.email, &self.password)
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::BlankEmail.into());
    }
    Ok(email)
}

fn new_uid() -> String {
    Uuid::new_v4().simple().to_string()
}
