//! Identity provider seam, the shared session handle, registration rules and the
//! user profile directory.

use crate::error::LibraryError;
use crate::models::{User, GUEST_USERNAME};
use crate::store::{run_blocking, Document, DocumentStore, USERS};
use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use thiserror::Error;
use uuid::Uuid;

const MIN_PROVIDER_PASSWORD_LEN: usize = 6;
const MIN_PASSWORD_LEN: usize = 8;
const PASSWORD_SPECIALS: &str = "!@#$%^&*";
static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

/// Current-user handle shared by the provider and every store that needs an identity.
#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Arc<RwLock<Option<AuthUser>>>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn signed_in(user_id: &str, email: &str) -> Self {
        let session = Session::default();
        session.set(Some(AuthUser {
            user_id: user_id.to_string(),
            email: email.to_string(),
        }));
        session
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    pub fn user_id(&self) -> Option<String> {
        self.current_user().map(|user| user.user_id)
    }

    pub fn set(&self, user: Option<AuthUser>) {
        match self.current.write() {
            Ok(mut guard) => *guard = user,
            Err(_) => log::error!("session lock poisoned; current user unchanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No account found with this email.")]
    InvalidUser,

    #[error("Incorrect password.")]
    InvalidCredentials,

    #[error("Password is too weak!")]
    WeakPassword,

    #[error("This email is already registered!")]
    EmailAlreadyInUse,

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Message shown when account creation fails.
    pub fn registration_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Invalid email format!".to_string(),
            AuthError::InvalidUser => "Registration failed. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;
    fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;
    fn sign_out(&self);
    fn current_user(&self) -> Option<AuthUser>;
}

struct Account {
    user_id: String,
    salt: String,
    password_hash: String,
}

/// Email/password provider kept in process memory. Signing in or up updates the session.
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    session: Session,
}

impl MemoryIdentityProvider {
    pub fn new(session: Session) -> Self {
        MemoryIdentityProvider {
            accounts: Mutex::new(HashMap::new()),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let result = hasher.finalize();
    result.iter().map(|byte| format!("{:02x}", byte)).collect()
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl IdentityProvider for MemoryIdentityProvider {
    fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let key = email_key(email);
        if !is_valid_email(&key) {
            return Err(AuthError::InvalidCredentials);
        }
        if password.chars().count() < MIN_PROVIDER_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| AuthError::Other("account registry unavailable".to_string()))?;
        if accounts.contains_key(&key) {
            return Err(AuthError::EmailAlreadyInUse);
        }
        let salt = Uuid::new_v4().simple().to_string();
        let user = AuthUser {
            user_id: Uuid::new_v4().simple().to_string(),
            email: key.clone(),
        };
        accounts.insert(
            key,
            Account {
                user_id: user.user_id.clone(),
                password_hash: hash_password(&salt, password),
                salt,
            },
        );
        drop(accounts);
        log::info!("created account {}", user.user_id);
        self.session.set(Some(user.clone()));
        Ok(user)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let key = email_key(email);
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| AuthError::Other("account registry unavailable".to_string()))?;
        let account = accounts.get(&key).ok_or(AuthError::InvalidUser)?;
        if hash_password(&account.salt, password) != account.password_hash {
            return Err(AuthError::InvalidCredentials);
        }
        let user = AuthUser {
            user_id: account.user_id.clone(),
            email: key,
        };
        drop(accounts);
        self.session.set(Some(user.clone()));
        Ok(user)
    }

    fn sign_out(&self) {
        self.session.set(None);
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session.current_user()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Email,
    Password,
    ConfirmPassword,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InputError {
    pub field: Field,
    pub message: String,
}

fn input_error(field: Field, message: &str) -> InputError {
    InputError {
        field,
        message: message.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
                .expect("email pattern is valid")
        })
        .is_match(email)
}

/// Checks registration fields in form order and reports the first problem.
pub fn validate_registration(
    input: &RegistrationInput,
    required_email_domain: Option<&str>,
) -> Result<(), InputError> {
    let username = input.username.trim();
    let email = input.email.trim();
    let password = input.password.trim();
    let confirm = input.confirm_password.trim();

    if username.is_empty() {
        return Err(input_error(Field::Username, "Username is required"));
    }
    if email.is_empty() {
        return Err(input_error(Field::Email, "Email is required"));
    }
    if !is_valid_email(email) {
        return Err(input_error(Field::Email, "Invalid email format"));
    }
    if let Some(domain) = required_email_domain {
        if !email.to_lowercase().ends_with(&format!("@{}", domain.to_lowercase())) {
            return Err(InputError {
                field: Field::Email,
                message: format!("Email must end with @{}", domain),
            });
        }
    }
    if password.is_empty() {
        return Err(input_error(Field::Password, "Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(input_error(Field::Password, "Password must be at least 8 characters"));
    }
    if !password.chars().any(|ch| ch.is_ascii_uppercase()) {
        return Err(input_error(
            Field::Password,
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|ch| ch.is_ascii_lowercase()) {
        return Err(input_error(
            Field::Password,
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|ch| ch.is_ascii_digit()) {
        return Err(input_error(Field::Password, "Password must contain at least one number"));
    }
    if !password.chars().any(|ch| PASSWORD_SPECIALS.contains(ch)) {
        return Err(input_error(
            Field::Password,
            "Password must contain at least one special character (!@#$%^&*)",
        ));
    }
    if password != confirm {
        return Err(input_error(Field::ConfirmPassword, "Passwords do not match"));
    }
    Ok(())
}

pub fn validate_login(email: &str, password: &str) -> Result<(), InputError> {
    if email.trim().is_empty() {
        return Err(input_error(Field::Email, "Email is required"));
    }
    if password.trim().is_empty() {
        return Err(input_error(Field::Password, "Password is required"));
    }
    Ok(())
}

/// Profiles under `users/{userId}`.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        UserDirectory { store }
    }

    pub async fn save_profile(&self, user: &User) -> Result<(), LibraryError> {
        let data = match serde_json::to_value(user) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let user_id = user.user_id.clone();
        run_blocking(&self.store, move |store| store.set(USERS, &user_id, data)).await?;
        log::info!("saved profile for {}", user.user_id);
        Ok(())
    }

    async fn fetch(&self, user_id: &str) -> Option<Document> {
        if user_id.trim().is_empty() {
            return None;
        }
        let id = user_id.to_string();
        match run_blocking(&self.store, move |store| store.get(USERS, &id)).await {
            Ok(document) => document,
            Err(err) => {
                log::error!("error fetching profile for {}: {}", user_id, err);
                None
            }
        }
    }

    pub async fn profile(&self, user_id: &str) -> Option<User> {
        let document = self.fetch(user_id).await?;
        let text = |key: &str| {
            document
                .data
                .get(key)
                .and_then(|value| value.as_str())
                .map(|value| value.to_string())
        };
        Some(User {
            user_id: text("userId").unwrap_or_else(|| document.id.clone()),
            username: text("username").unwrap_or_else(|| GUEST_USERNAME.to_string()),
            email: text("email").unwrap_or_else(|| "Unknown".to_string()),
        })
    }

    /// The username as stored, or `None` while the profile is missing or has none.
    pub async fn stored_username(&self, user_id: &str) -> Option<String> {
        let document = self.fetch(user_id).await?;
        document
            .data
            .get("username")
            .and_then(|value| value.as_str())
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
    }

    /// Display name for `user_id`; "Guest" when signed out, missing, or on failure.
    pub async fn username(&self, user_id: Option<&str>) -> String {
        match user_id {
            Some(id) => self
                .profile(id)
                .await
                .map(|user| user.username)
                .unwrap_or_else(|| GUEST_USERNAME.to_string()),
            None => GUEST_USERNAME.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("{}", .0.registration_message())]
    Auth(AuthError),

    #[error(transparent)]
    Profile(#[from] LibraryError),
}

/// Validates the form, creates the account, then stores the profile document.
pub async fn register(
    provider: &dyn IdentityProvider,
    directory: &UserDirectory,
    input: &RegistrationInput,
    required_email_domain: Option<&str>,
) -> Result<User, RegistrationError> {
    validate_registration(input, required_email_domain)?;
    let account = provider
        .sign_up(input.email.trim(), input.password.trim())
        .map_err(RegistrationError::Auth)?;
    let user = User {
        user_id: account.user_id,
        username: input.username.trim().to_string(),
        email: account.email,
    };
    directory.save_profile(&user).await?;
    Ok(user)
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Validates the form and signs in, trimming the same way [`register`] does.
pub fn login(
    provider: &dyn IdentityProvider,
    email: &str,
    password: &str,
) -> Result<AuthUser, LoginError> {
    validate_login(email, password)?;
    let user = provider.sign_in(email.trim(), password.trim())?;
    log::info!("signed in {}", user.user_id);
    Ok(user)
}
