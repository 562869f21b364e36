use crate::models::{
    Book, NOT_AVAILABLE, NO_DESCRIPTION, PLACEHOLDER_IMAGE, UNKNOWN_AUTHOR, UNKNOWN_ID,
    UNKNOWN_TITLE,
};
use serde_json::{Map, Value};

/// Maps every entry of a search response's `items` array, preserving order.
pub fn books_from_response(data: &Value) -> Vec<Book> {
    data.get("items")
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .map(normalize_volume)
                .collect()
        })
        .unwrap_or_default()
}

/// Maps one search API item (`{ id, volumeInfo, accessInfo }`) into a Book.
pub fn normalize_volume(item: &Value) -> Book {
    let info = item.get("volumeInfo").cloned().unwrap_or(Value::Null);

    let id = text_or(item.get("id"), UNKNOWN_ID);
    let title = text_or(info.get("title"), UNKNOWN_TITLE);
    let author = first_of_list(info.get("authors")).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let published_year = text_or(info.get("publishedDate"), NOT_AVAILABLE);
    let genre = first_of_list(info.get("categories")).unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let rating = rating_text(info.get("averageRating"));
    let description = text_or(info.get("description"), NO_DESCRIPTION);
    let image_url = secure_image_url(
        info.get("imageLinks")
            .and_then(|value| value.get("thumbnail").or_else(|| value.get("smallThumbnail")))
            .and_then(|value| value.as_str()),
    );
    let google_books_url = text_or(info.get("previewLink"), "");

    let pdf = item.get("accessInfo").and_then(|value| value.get("pdf"));
    let pdf_available = pdf
        .and_then(|value| value.get("isAvailable"))
        .and_then(|value| value.as_bool())
        .unwrap_or(false);
    let pdf_url = if pdf_available {
        text_or(pdf.and_then(|value| value.get("downloadLink")), "")
    } else {
        String::new()
    };

    Book {
        id,
        title,
        author,
        published_year,
        genre,
        rating,
        description,
        image_url,
        google_books_url,
        pdf_url,
        reading_url: String::new(),
    }
}

/// Maps a persisted document (a collection projection or a full book) into a Book.
/// The document id stands in for a missing `bookId`.
pub fn book_from_document(doc_id: &str, data: &Map<String, Value>) -> Book {
    let id = non_blank(data.get("bookId").or_else(|| data.get("id")))
        .or_else(|| non_blank_str(doc_id))
        .unwrap_or_else(|| UNKNOWN_ID.to_string());

    Book {
        id,
        title: text_or(data.get("title"), UNKNOWN_TITLE),
        author: text_or(data.get("author"), UNKNOWN_AUTHOR),
        published_year: text_or(data.get("publishedYear"), NOT_AVAILABLE),
        genre: text_or(data.get("genre"), NOT_AVAILABLE),
        rating: rating_text(data.get("rating")),
        description: text_or(data.get("description"), NO_DESCRIPTION),
        image_url: secure_image_url(data.get("imageUrl").and_then(|value| value.as_str())),
        google_books_url: text_or(data.get("googleBooksUrl"), ""),
        pdf_url: text_or(data.get("pdfUrl"), ""),
        reading_url: text_or(data.get("readingUrl"), ""),
    }
}

/// Upgrades `http://` to `https://`; an empty value becomes the bundled placeholder.
pub fn secure_image_url(raw: Option<&str>) -> String {
    let trimmed = raw.map(|value| value.trim()).unwrap_or("");
    if trimmed.is_empty() {
        return PLACEHOLDER_IMAGE.to_string();
    }
    match trimmed.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => trimmed.to_string(),
    }
}

/// String form of a numeric average, always with at least one decimal (`4` -> `"4.0"`).
pub fn rating_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(number)) => match number.as_f64() {
            Some(rating) if rating.is_finite() => format_rating(rating),
            _ => NOT_AVAILABLE.to_string(),
        },
        Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn format_rating(rating: f64) -> String {
    if rating.fract() == 0.0 {
        format!("{:.1}", rating)
    } else {
        rating.to_string()
    }
}

fn text_or(value: Option<&Value>, fallback: &str) -> String {
    non_blank(value).unwrap_or_else(|| fallback.to_string())
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value.and_then(|value| value.as_str()).and_then(non_blank_str)
}

fn non_blank_str(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn first_of_list(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|value| value.as_array())
        .and_then(|values| values.first())
        .and_then(|first| first.as_str())
        .and_then(non_blank_str)
}
