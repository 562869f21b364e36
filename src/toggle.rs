//! Add/remove buttons for a book's membership in each collection kind.

use crate::collections::CollectionStore;
use crate::error::ToggleError;
use crate::models::{Book, CollectionKind, UNKNOWN_ID};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipState {
    /// Not checked against the store yet.
    Unknown,
    Absent,
    Present,
}

impl MembershipState {
    fn from_exists(present: bool) -> Self {
        if present {
            MembershipState::Present
        } else {
            MembershipState::Absent
        }
    }
}

/// Displayed membership of one book in one kind.
///
/// The state only changes after the store confirms. Overlapping toggles are not
/// coalesced; whichever completes last decides the displayed state.
#[derive(Clone)]
pub struct MembershipToggle {
    collections: CollectionStore,
    book: Book,
    kind: CollectionKind,
    state: Arc<Mutex<MembershipState>>,
}

impl MembershipToggle {
    pub fn new(collections: CollectionStore, book: Book, kind: CollectionKind) -> Self {
        MembershipToggle {
            collections,
            book,
            kind,
            state: Arc::new(Mutex::new(MembershipState::Unknown)),
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn state(&self) -> MembershipState {
        *self.lock_state()
    }

    pub fn label(&self) -> &'static str {
        label(self.kind, self.state())
    }

    /// Asks the store and records the answer.
    pub async fn resolve(&self) -> MembershipState {
        let present = self.collections.exists(self.kind, &self.book.id).await;
        let state = MembershipState::from_exists(present);
        *self.lock_state() = state;
        state
    }

    /// Performs the opposite of the displayed state and returns the new state.
    pub async fn toggle(&self) -> Result<MembershipState, ToggleError> {
        check_book(&self.book)?;

        let displayed = match self.state() {
            MembershipState::Unknown => self.resolve().await,
            known => known,
        };
        let (succeeded, next) = match displayed {
            MembershipState::Present => (
                self.collections.remove(self.kind, &self.book.id).await,
                MembershipState::Absent,
            ),
            _ => (
                self.collections.upsert(self.kind, &self.book).await,
                MembershipState::Present,
            ),
        };
        if !succeeded {
            log::warn!("toggle of {} in {} failed", self.book.id, self.kind.as_str());
            return Err(ToggleError::Failed(self.kind.label()));
        }

        *self.lock_state() = next;
        Ok(next)
    }

    fn lock_state(&self) -> MutexGuard<'_, MembershipState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A toggle needs an id to key the entry plus the title and cover it displays.
pub fn check_book(book: &Book) -> Result<(), ToggleError> {
    let id = book.id.trim();
    if id.is_empty()
        || id == UNKNOWN_ID
        || book.title.trim().is_empty()
        || book.image_url.trim().is_empty()
    {
        return Err(ToggleError::MissingBookData);
    }
    Ok(())
}

pub fn label(kind: CollectionKind, state: MembershipState) -> &'static str {
    let present = state == MembershipState::Present;
    match (kind, present) {
        (CollectionKind::Favorites, false) => "Add to Favorites",
        (CollectionKind::Favorites, true) => "Remove From Favorites",
        (CollectionKind::ReadingList, false) => "Add to Reading List",
        (CollectionKind::ReadingList, true) => "Remove From Reading List",
        (CollectionKind::ShoppingCart, false) => "Add to Cart",
        (CollectionKind::ShoppingCart, true) => "Remove From Cart",
    }
}

/// Short confirmation shown once a toggle lands in `state`.
pub fn notice(kind: CollectionKind, state: MembershipState) -> &'static str {
    let present = state == MembershipState::Present;
    match (kind, present) {
        (CollectionKind::Favorites, true) => "Added to Favorites!",
        (CollectionKind::Favorites, false) => "Removed from Favorites",
        (CollectionKind::ReadingList, true) => "Added to Reading List!",
        (CollectionKind::ReadingList, false) => "Removed from Reading List",
        (CollectionKind::ShoppingCart, true) => "Added to Cart",
        (CollectionKind::ShoppingCart, false) => "Removed from Cart",
    }
}

/// The three independent toggles shown on a book's detail view.
#[derive(Clone)]
pub struct BookActions {
    favorites: MembershipToggle,
    reading_list: MembershipToggle,
    cart: MembershipToggle,
}

impl BookActions {
    pub fn new(collections: &CollectionStore, book: &Book) -> Self {
        let toggle = |kind| MembershipToggle::new(collections.clone(), book.clone(), kind);
        BookActions {
            favorites: toggle(CollectionKind::Favorites),
            reading_list: toggle(CollectionKind::ReadingList),
            cart: toggle(CollectionKind::ShoppingCart),
        }
    }

    pub fn get(&self, kind: CollectionKind) -> &MembershipToggle {
        match kind {
            CollectionKind::Favorites => &self.favorites,
            CollectionKind::ReadingList => &self.reading_list,
            CollectionKind::ShoppingCart => &self.cart,
        }
    }

    /// Resolves all three kinds concurrently.
    pub async fn resolve_all(&self) -> [(CollectionKind, MembershipState); 3] {
        let (favorites, reading_list, cart) = tokio::join!(
            self.favorites.resolve(),
            self.reading_list.resolve(),
            self.cart.resolve()
        );
        [
            (CollectionKind::Favorites, favorites),
            (CollectionKind::ReadingList, reading_list),
            (CollectionKind::ShoppingCart, cart),
        ]
    }

    pub fn labels(&self) -> [&'static str; 3] {
        [self.favorites.label(), self.reading_list.label(), self.cart.label()]
    }

    /// Toggles `kind` and returns the notice to show.
    pub async fn toggle(&self, kind: CollectionKind) -> Result<&'static str, ToggleError> {
        let state = self.get(kind).toggle().await?;
        Ok(notice(kind, state))
    }
}
