use crate::config::Config;
use crate::error::SearchError;
use crate::models::{Book, UNKNOWN_ID};
use crate::normalize::books_from_response;
use reqwest::Client;

const GOOGLE_BOOKS_WEB: &str = "https://books.google.com/";

/// Category rows on the library screen, each backed by a fixed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shelf {
    All,
    ScienceFiction,
    Drama,
    NonFiction,
    SelfHelp,
    Romance,
}

impl Shelf {
    pub const ALL: [Shelf; 6] = [
        Shelf::All,
        Shelf::ScienceFiction,
        Shelf::Drama,
        Shelf::NonFiction,
        Shelf::SelfHelp,
        Shelf::Romance,
    ];

    pub fn query(&self) -> &'static str {
        match self {
            Shelf::All => "bestsellers",
            Shelf::ScienceFiction => "science fiction",
            Shelf::Drama => "drama",
            Shelf::NonFiction => "non-fiction",
            Shelf::SelfHelp => "self-help",
            Shelf::Romance => "romance",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Shelf::All => "All",
            Shelf::ScienceFiction => "Science Fiction",
            Shelf::Drama => "Drama",
            Shelf::NonFiction => "Non-Fiction",
            Shelf::SelfHelp => "Self-Help",
            Shelf::Romance => "Romance",
        }
    }
}

/// Client for the volumes endpoint of the book search API.
#[derive(Clone)]
pub struct SearchGateway {
    client: Client,
    volumes_url: String,
    api_key: String,
}

impl SearchGateway {
    pub fn new(config: &Config) -> Result<Self, SearchError> {
        let client = Client::builder()
            .connect_timeout(config.http_timeout)
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(SearchGateway {
            client,
            volumes_url: format!("{}/volumes", config.search_base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    /// Results in the API's ranking order. No matches is an empty list, not an error.
    pub async fn search(&self, query: &str) -> Result<Vec<Book>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        let mut params = vec![("q", query)];
        if !self.api_key.is_empty() {
            params.push(("key", self.api_key.as_str()));
        }
        let response = self.client.get(&self.volumes_url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("search for {:?} returned {}", query, status);
            return Err(SearchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(vec![]);
        }
        let data: serde_json::Value =
            serde_json::from_str(&body).map_err(|err| SearchError::Decode(err.to_string()))?;
        let books = books_from_response(&data);
        log::debug!("search for {:?} returned {} books", query, books.len());
        Ok(books)
    }

    pub async fn browse(&self, shelf: Shelf) -> Result<Vec<Book>, SearchError> {
        self.search(shelf.query()).await
    }

    /// Free-text library search; an empty box shows the default shelf.
    pub async fn search_or_browse(&self, text: &str) -> Result<Vec<Book>, SearchError> {
        if text.trim().is_empty() {
            return self.browse(Shelf::All).await;
        }
        self.search(text).await
    }

    /// Best-effort "similar books" row: failures become an empty row.
    pub async fn similar_to(&self, title: &str) -> Vec<Book> {
        match self.search(title).await {
            Ok(books) => books,
            Err(err) => {
                log::warn!("similar books for {:?} unavailable: {}", title, err);
                vec![]
            }
        }
    }
}

/// Web search page for a title, used as the purchase link.
pub fn google_books_search_url(title: &str) -> String {
    let words: Vec<String> = title
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect();
    if words.is_empty() {
        return GOOGLE_BOOKS_WEB.to_string();
    }
    format!("{}books?q={}", GOOGLE_BOOKS_WEB, words.join("+"))
}

/// Where "read online" should go for `book`.
pub fn reading_link(book: &Book) -> Option<String> {
    let reading_url = book.reading_url.trim();
    if !reading_url.is_empty() {
        return Some(reading_url.to_string());
    }
    let id = book.id.trim();
    if id.is_empty() || id == UNKNOWN_ID {
        return None;
    }
    Some(format!(
        "{}books?id={}",
        GOOGLE_BOOKS_WEB,
        urlencoding::encode(id)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shelves_map_to_fixed_queries() {
        assert_eq!(Shelf::All.query(), "bestsellers");
        assert_eq!(Shelf::SelfHelp.query(), "self-help");
        assert_eq!(Shelf::NonFiction.label(), "Non-Fiction");
        assert_eq!(Shelf::ALL.len(), 6);
    }

    #[test]
    fn search_url_joins_words_with_plus() {
        assert_eq!(
            google_books_search_url("The Left Hand of Darkness"),
            "https://books.google.com/books?q=The+Left+Hand+of+Darkness"
        );
        assert_eq!(
            google_books_search_url("Tom & Jerry"),
            "https://books.google.com/books?q=Tom+%26+Jerry"
        );
        assert_eq!(google_books_search_url("  "), "https://books.google.com/");
    }

    #[test]
    fn reading_link_prefers_explicit_url() {
        let mut book = Book {
            id: "zyTCAlFPjgYC".to_string(),
            ..Book::default()
        };
        assert_eq!(
            reading_link(&book).as_deref(),
            Some("https://books.google.com/books?id=zyTCAlFPjgYC")
        );
        book.reading_url = "https://play.google.com/books/reader?id=zyTCAlFPjgYC".to_string();
        assert_eq!(reading_link(&book).as_deref(), Some(book.reading_url.as_str()));
        assert_eq!(reading_link(&Book::default()), None);
    }

    #[tokio::test]
    async fn blank_query_skips_the_network() {
        let config = Config {
            search_base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let gateway = SearchGateway::new(&config).expect("client");
        assert!(gateway.search("   ").await.expect("empty").is_empty());
    }
}
