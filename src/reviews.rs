use crate::auth::{Session, UserDirectory};
use crate::error::LibraryError;
use crate::models::{clamp_rating, Review};
use crate::store::{
    reviews_collection, run_blocking, Document, DocumentStore, Listener, Order, Subscription,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const AUTHOR_FIELD: &str = "userId";

/// Reviews under `books/{bookId}/reviews`, newest first.
#[derive(Clone)]
pub struct ReviewStore {
    store: Arc<dyn DocumentStore>,
    session: Session,
    directory: UserDirectory,
}

impl ReviewStore {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session) -> Self {
        ReviewStore {
            directory: UserDirectory::new(store.clone()),
            store,
            session,
        }
    }

    /// Inserts the review, then records its generated id on it.
    ///
    /// The second write can fail after the first succeeded; the review then exists
    /// without a usable id and `ReviewIdPatch` is returned.
    pub async fn create(
        &self,
        book_id: &str,
        text: &str,
        rating: f32,
    ) -> Result<String, LibraryError> {
        let user_id = self.session.user_id().ok_or(LibraryError::Unauthenticated)?;
        if book_id.trim().is_empty() {
            return Err(LibraryError::Validation("Book data is missing!".to_string()));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(LibraryError::Validation("Please write a review!".to_string()));
        }
        let username = match self.directory.stored_username(&user_id).await {
            Some(username) => username,
            None => {
                return Err(LibraryError::Validation(
                    "Loading username, please try again".to_string(),
                ))
            }
        };

        let collection = reviews_collection(book_id);
        let mut data = Map::new();
        data.insert(AUTHOR_FIELD.to_string(), json!(user_id));
        data.insert("username".to_string(), json!(username));
        data.insert("text".to_string(), json!(text));
        data.insert("rating".to_string(), json!(clamp_rating(rating)));

        let target = collection.clone();
        let review_id = run_blocking(&self.store, move |store| store.add(&target, data)).await?;

        let mut patch = Map::new();
        patch.insert("reviewId".to_string(), json!(review_id.clone()));
        let patched_id = review_id.clone();
        let patched = run_blocking(&self.store, move |store| {
            store.update(&collection, &patched_id, patch)
        });
        match patched.await {
            Ok(()) => {
                log::info!("review {} submitted for book {}", review_id, book_id);
                Ok(review_id)
            }
            Err(err) => {
                log::error!("review {} stored without its id: {}", review_id, err);
                Err(LibraryError::ReviewIdPatch {
                    review_id,
                    message: err.to_string(),
                })
            }
        }
    }

    pub async fn list(&self, book_id: &str) -> Vec<Review> {
        if book_id.trim().is_empty() {
            return vec![];
        }
        let collection = reviews_collection(book_id);
        let listed = run_blocking(&self.store, move |store| {
            store.list(&collection, Order::NewestFirst)
        });
        match listed.await {
            Ok(documents) => documents.iter().map(review_from_document).collect(),
            Err(err) => {
                log::error!("error loading reviews for {}: {}", book_id, err);
                vec![]
            }
        }
    }

    pub async fn subscribe<F>(&self, book_id: &str, on_change: F) -> Option<Subscription>
    where
        F: Fn(Vec<Review>) + Send + Sync + 'static,
    {
        if book_id.trim().is_empty() {
            return None;
        }
        let listener: Listener = Arc::new(move |documents: Vec<Document>| {
            on_change(documents.iter().map(review_from_document).collect());
        });
        let collection = reviews_collection(book_id);
        match run_blocking(&self.store, move |store| {
            store.subscribe(&collection, Order::NewestFirst, listener)
        })
        .await
        {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                log::error!("error listening to reviews for {}: {}", book_id, err);
                None
            }
        }
    }

    /// Only the author may delete; the store checks the stored author id.
    pub async fn delete(&self, book_id: &str, review_id: &str) -> Result<(), LibraryError> {
        let user_id = self.session.user_id().ok_or(LibraryError::Unauthenticated)?;
        if review_id.trim().is_empty() {
            return Err(LibraryError::Validation(
                "Cannot delete review without ID".to_string(),
            ));
        }
        let collection = reviews_collection(book_id);
        let id = review_id.to_string();
        let result = run_blocking(&self.store, move |store| {
            store.delete_owned(&collection, &id, AUTHOR_FIELD, &user_id)
        })
        .await;
        match result {
            Ok(()) => {
                log::info!("review {} deleted from book {}", review_id, book_id);
                Ok(())
            }
            Err(err) => {
                log::warn!("failed to delete review {}: {}", review_id, err);
                Err(err)
            }
        }
    }
}

/// Whether the delete control should be offered for `review`.
pub fn can_delete(review: &Review, current_user_id: Option<&str>) -> bool {
    match current_user_id {
        Some(user_id) => review.user_id == user_id,
        None => false,
    }
}

pub fn review_from_document(document: &Document) -> Review {
    let text = |key: &str| {
        document
            .data
            .get(key)
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
    };
    let rating = document
        .data
        .get("rating")
        .and_then(Value::as_f64)
        .map(|value| clamp_rating(value as f32))
        .unwrap_or(0.0);

    Review {
        review_id: text("reviewId").unwrap_or_default(),
        user_id: text(AUTHOR_FIELD).unwrap_or_else(|| "Unknown".to_string()),
        username: text("username").unwrap_or_else(|| "Anonymous".to_string()),
        text: text("text").unwrap_or_default(),
        rating,
        created_at: document.created_at,
    }
}
