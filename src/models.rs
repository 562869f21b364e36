use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const UNKNOWN_ID: &str = "N/A";
pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_DESCRIPTION: &str = "No description available.";
pub const PLACEHOLDER_IMAGE: &str = "asset://booknest/drawable/magazine.png";
pub const GUEST_USERNAME: &str = "Guest";

/// Internal book record. Every field is always populated; missing data is a sentinel.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(alias = "bookId")]
    pub id: String,
    pub title: String,
    pub author: String,
    pub published_year: String,
    pub genre: String,
    pub rating: String,
    pub description: String,
    pub image_url: String,
    pub google_books_url: String,
    pub pdf_url: String,
    pub reading_url: String,
}

impl Default for Book {
    fn default() -> Self {
        Book {
            id: UNKNOWN_ID.to_string(),
            title: UNKNOWN_TITLE.to_string(),
            author: UNKNOWN_AUTHOR.to_string(),
            published_year: NOT_AVAILABLE.to_string(),
            genre: NOT_AVAILABLE.to_string(),
            rating: NOT_AVAILABLE.to_string(),
            description: NO_DESCRIPTION.to_string(),
            image_url: PLACEHOLDER_IMAGE.to_string(),
            google_books_url: String::new(),
            pdf_url: String::new(),
            reading_url: String::new(),
        }
    }
}

impl Book {
    /// The small denormalized document written for a collection entry.
    pub fn projection(&self, kind: CollectionKind) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert("bookId".to_string(), Value::String(self.id.clone()));
        doc.insert("title".to_string(), Value::String(self.title.clone()));
        doc.insert("imageUrl".to_string(), Value::String(self.image_url.clone()));
        if kind.keeps_purchase_link() {
            doc.insert(
                "googleBooksUrl".to_string(),
                Value::String(self.google_books_url.clone()),
            );
        }
        doc
    }
}

/// The per-user named sets a book can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Favorites,
    ReadingList,
    ShoppingCart,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [
        CollectionKind::Favorites,
        CollectionKind::ReadingList,
        CollectionKind::ShoppingCart,
    ];

    /// Collection segment used in document paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Favorites => "favorites",
            CollectionKind::ReadingList => "reading_list",
            CollectionKind::ShoppingCart => "shopping_cart",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CollectionKind::Favorites => "Favorites",
            CollectionKind::ReadingList => "Reading List",
            CollectionKind::ShoppingCart => "Cart",
        }
    }

    pub fn keeps_purchase_link(&self) -> bool {
        matches!(self, CollectionKind::ShoppingCart)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub review_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub rating: f32,
    /// Store-assigned creation time in milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

impl Review {
    pub fn has_id(&self) -> bool {
        !self.review_id.trim().is_empty()
    }
}

pub fn clamp_rating(rating: f32) -> f32 {
    if rating.is_nan() {
        return 0.0;
    }
    rating.max(0.0).min(5.0)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::{clamp_rating, Book, CollectionKind};

    #[test]
    fn cart_projection_keeps_purchase_link() {
        let book = Book {
            id: "B1".to_string(),
            title: "Dune".to_string(),
            image_url: "https://img/dune.jpg".to_string(),
            google_books_url: "https://books.google.com/books?id=B1".to_string(),
            ..Book::default()
        };

        let cart = book.projection(CollectionKind::ShoppingCart);
        let favorite = book.projection(CollectionKind::Favorites);

        assert_eq!(
            cart.get("googleBooksUrl").and_then(|v| v.as_str()),
            Some("https://books.google.com/books?id=B1")
        );
        assert!(favorite.get("googleBooksUrl").is_none());
        assert_eq!(favorite.get("bookId").and_then(|v| v.as_str()), Some("B1"));
        assert_eq!(favorite.len(), 3);
    }

    #[test]
    fn book_reads_book_id_alias() {
        let book: Book = serde_json::from_value(serde_json::json!({
            "bookId": "B7",
            "title": "T",
            "author": "A",
            "publishedYear": "1965",
            "genre": "Fiction",
            "rating": "4.5",
            "description": "D",
            "imageUrl": "https://img",
            "googleBooksUrl": "",
            "pdfUrl": "",
            "readingUrl": ""
        }))
        .expect("book should decode");
        assert_eq!(book.id, "B7");
    }

    #[test]
    fn rating_is_clamped_into_star_range() {
        assert_eq!(clamp_rating(-1.0), 0.0);
        assert_eq!(clamp_rating(7.5), 5.0);
        assert_eq!(clamp_rating(3.5), 3.5);
        assert_eq!(clamp_rating(f32::NAN), 0.0);
    }
}
