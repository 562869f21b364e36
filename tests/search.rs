use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use booknest::{Config, SearchError, SearchGateway, Shelf};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

async fn volumes(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
    if params.get("key").map(String::as_str) != Some("test-key") {
        return (StatusCode::FORBIDDEN, "missing key").into_response();
    }
    let query = params.get("q").cloned().unwrap_or_default();
    match query.as_str() {
        "dune" => Json(json!({
            "items": [
                {
                    "id": "B1",
                    "volumeInfo": {
                        "title": "Dune",
                        "authors": [],
                        "averageRating": 4.5,
                        "imageLinks": { "thumbnail": "http://covers.example/dune.jpg" }
                    },
                    "accessInfo": { "pdf": { "isAvailable": false } }
                },
                {
                    "id": "B2",
                    "volumeInfo": { "title": "Dune Messiah", "averageRating": 4 }
                }
            ]
        }))
        .into_response(),
        "bestsellers" => Json(json!({
            "items": [{ "id": "TOP", "volumeInfo": { "title": "Top Pick" } }]
        }))
        .into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "garbled" => (StatusCode::OK, "{not json").into_response(),
        _ => Json(json!({})).into_response(),
    }
}

async fn spawn_stub() -> String {
    let app = Router::new().route("/volumes", get(volumes));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn gateway() -> SearchGateway {
    let config = Config {
        api_key: "test-key".to_string(),
        search_base_url: spawn_stub().await,
        http_timeout: Duration::from_secs(5),
        ..Config::default()
    };
    SearchGateway::new(&config).unwrap()
}

#[tokio::test]
async fn search_normalizes_results_in_api_order() {
    let gateway = gateway().await;
    let books = gateway.search("dune").await.unwrap();

    assert_eq!(books.len(), 2);
    assert_eq!(books[0].id, "B1");
    assert_eq!(books[0].author, "Unknown Author");
    assert_eq!(books[0].rating, "4.5");
    assert_eq!(books[0].image_url, "https://covers.example/dune.jpg");
    assert_eq!(books[0].pdf_url, "");
    assert_eq!(books[1].title, "Dune Messiah");
    assert_eq!(books[1].rating, "4.0");
}

#[tokio::test]
async fn missing_items_is_no_matches() {
    let gateway = gateway().await;
    assert!(gateway.search("zzzz").await.unwrap().is_empty());
}

#[tokio::test]
async fn server_errors_are_distinct_from_no_matches() {
    let gateway = gateway().await;
    assert!(matches!(
        gateway.search("broken").await,
        Err(SearchError::Status(500))
    ));
    assert!(matches!(
        gateway.search("garbled").await,
        Err(SearchError::Decode(_))
    ));
    assert!(gateway.similar_to("broken").await.is_empty());
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = Config {
        search_base_url: format!("http://{addr}"),
        http_timeout: Duration::from_secs(2),
        ..Config::default()
    };
    let gateway = SearchGateway::new(&config).unwrap();
    assert!(matches!(
        gateway.search("dune").await,
        Err(SearchError::Transport(_))
    ));
}

#[tokio::test]
async fn empty_search_box_browses_default_shelf() {
    let gateway = gateway().await;
    let books = gateway.search_or_browse("  ").await.unwrap();
    assert_eq!(books[0].id, "TOP");
    assert_eq!(gateway.browse(Shelf::All).await.unwrap(), books);
    assert!(gateway.browse(Shelf::Romance).await.unwrap().is_empty());
}
