//! Account registration and lookup.

use std::sync::Arc;

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use models::user::{validate_new_user, NewUser, Role};
use models::validation::{into_result, FieldError};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::domain::{Account, Caller};
use crate::errors::ServiceError;
use crate::store::{RideStore, StoreTx};

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

pub(crate) fn hash_password(password: &[u8]) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password, &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Hash(e.to_string()))
}

/// Hash of 32 random bytes nobody ever sees, for accounts that must never
/// be able to sign in.
pub(crate) fn unusable_password_hash() -> Result<String, ServiceError> {
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    hash_password(&secret)
}

pub struct AccountService<S: RideStore> {
    store: Arc<S>,
}

impl<S: RideStore> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self { Self { store } }

    /// Register a new unverified user.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use service::accounts::{AccountService, RegisterInput};
    /// use service::store::MemoryStore;
    ///
    /// let svc = AccountService::new(Arc::new(MemoryStore::new()));
    /// let input = RegisterInput { email: "U@E.com".into(), first_name: "U".into(), last_name: "E".into(), password: "Passw0rd".into() };
    /// let account = tokio_test::block_on(svc.register(input)).unwrap();
    /// assert_eq!(account.email, "u@e.com");
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<Account, ServiceError> {
        if input.password.chars().count() < 8 {
            return Err(ServiceError::Validation(vec![FieldError::new("password", "must be at least 8 characters")]));
        }
        let mut new_user = NewUser {
            email: input.email,
            first_name: input.first_name,
            last_name: input.last_name,
            password_hash: "pending".into(),
            role: Role::User,
            verified: false,
        };
        into_result(validate_new_user(&new_user))?;

        let mut tx = self.store.begin().await?;
        if tx.account_by_email(&new_user.email).await?.is_some() {
            return Err(ServiceError::Validation(vec![FieldError::new("email", "already registered")]));
        }
        new_user.password_hash = hash_password(input.password.as_bytes())?;
        let account = tx.insert_account(&new_user).await?;
        tx.commit().await?;
        info!(user_id = account.id, "account_registered");
        Ok(account)
    }

    /// Fetch an account; users see their own, admins see any.
    pub async fn get(&self, caller: &Caller, id: i32) -> Result<Account, ServiceError> {
        if caller.user_id != id && !caller.is_admin() {
            return Err(ServiceError::unauthorized("accounts are private"));
        }
        self.store.account(id).await?.ok_or_else(|| ServiceError::not_found("account", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    fn input(email: &str) -> RegisterInput {
        RegisterInput { email: email.into(), first_name: "Alice".into(), last_name: "Martin".into(), password: "Secret123".into() }
    }

    #[tokio::test]
    async fn registers_with_lowercase_email_and_hashed_password() {
        let store = Arc::new(MemoryStore::new());
        let svc = AccountService::new(store.clone());
        let account = svc.register(input("Alice@Example.com")).await.unwrap();
        assert_eq!(account.email, "alice@example.com");
        assert_eq!(account.role, Role::User);
        assert!(!account.verified);

        let hash = store.password_hash(account.id).await.unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"Secret123", &parsed).is_ok());
    }

    #[tokio::test]
    async fn email_is_unique_ignoring_case() {
        let svc = AccountService::new(Arc::new(MemoryStore::new()));
        svc.register(input("alice@example.com")).await.unwrap();
        let err = svc.register(input("ALICE@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e[0].field == "email"));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let svc = AccountService::new(Arc::new(MemoryStore::new()));
        let err = svc.register(RegisterInput { password: "short".into(), ..input("a@example.com") }).await.unwrap_err();
        assert_eq!(err.code(), 2005);
    }

    #[tokio::test]
    async fn accounts_are_private_except_to_admins() {
        let svc = AccountService::new(Arc::new(MemoryStore::new()));
        let a = svc.register(input("a@example.com")).await.unwrap();
        let b = svc.register(input("b@example.com")).await.unwrap();
        assert!(svc.get(&Caller::user(a.id), a.id).await.is_ok());
        assert!(matches!(svc.get(&Caller::user(b.id), a.id).await, Err(ServiceError::Unauthorized(_))));
        assert!(svc.get(&Caller::admin(b.id), a.id).await.is_ok());
    }
}
