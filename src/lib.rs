//! BookNest library core: per-user book collections, reviews, live list mirrors and
//! book search, over a pluggable document store.

pub mod auth;
pub mod collections;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod reviews;
pub mod search;
pub mod store;
pub mod sync;
pub mod toggle;

pub use auth::{IdentityProvider, MemoryIdentityProvider, Session, UserDirectory};
pub use collections::CollectionStore;
pub use config::Config;
pub use error::{LibraryError, SearchError, StoreError, ToggleError};
pub use models::{Book, CollectionKind, Review, User};
pub use reviews::ReviewStore;
pub use search::{SearchGateway, Shelf};
pub use store::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore, Subscription};
pub use sync::{filter_by_title, LibraryMirror, ListChange, LiveMirror};
pub use toggle::{BookActions, MembershipState, MembershipToggle};

use auth::{AuthUser, LoginError, RegistrationError, RegistrationInput};
use std::sync::Arc;

/// Everything one signed-in client needs, sharing a single store and session.
#[derive(Clone)]
pub struct Library {
    config: Config,
    session: Session,
    identity: Arc<MemoryIdentityProvider>,
    directory: UserDirectory,
    collections: CollectionStore,
    reviews: ReviewStore,
    search: SearchGateway,
}

impl Library {
    /// Uses SQLite at `config.database_path` when set, memory otherwise.
    pub fn open(config: Config) -> Result<Self, LibraryError> {
        let store: Arc<dyn DocumentStore> = match &config.database_path {
            Some(path) => Arc::new(SqliteDocumentStore::open(path)?),
            None => {
                log::info!("no database path configured; documents stay in memory");
                Arc::new(MemoryDocumentStore::new())
            }
        };
        Library::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn DocumentStore>) -> Result<Self, LibraryError> {
        let session = Session::new();
        let search = SearchGateway::new(&config)?;
        Ok(Library {
            identity: Arc::new(MemoryIdentityProvider::new(session.clone())),
            directory: UserDirectory::new(store.clone()),
            collections: CollectionStore::new(store.clone(), session.clone()),
            reviews: ReviewStore::new(store, session.clone()),
            search,
            session,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn collections(&self) -> &CollectionStore {
        &self.collections
    }

    pub fn reviews(&self) -> &ReviewStore {
        &self.reviews
    }

    pub fn search(&self) -> &SearchGateway {
        &self.search
    }

    /// Registers and signs in, applying the configured email domain rule.
    pub async fn register(&self, input: &RegistrationInput) -> Result<User, RegistrationError> {
        auth::register(
            self.identity.as_ref(),
            &self.directory,
            input,
            self.config.required_email_domain.as_deref(),
        )
        .await
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AuthUser, LoginError> {
        auth::login(self.identity.as_ref(), email, password)
    }

    pub fn actions(&self, book: &Book) -> BookActions {
        BookActions::new(&self.collections, book)
    }

    pub fn mirror(&self, kind: CollectionKind) -> LibraryMirror {
        LibraryMirror::new(kind)
    }

    pub async fn live(&self, kind: CollectionKind) -> Option<LiveMirror> {
        LiveMirror::start(&self.collections, kind).await
    }
}
