mod support;

use booknest::auth::{AuthError, AuthUser, RegistrationError, RegistrationInput};
use booknest::reviews::can_delete;
use booknest::{
    Book, CollectionKind, CollectionStore, Config, DocumentStore, Library, LibraryError,
    ListChange, MembershipState, ReviewStore, Session, ToggleError,
};
use std::sync::Arc;
use support::{init_logging, InstrumentedStore};

fn book(id: &str, title: &str) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        image_url: format!("https://covers.example/{id}.jpg"),
        google_books_url: format!("https://books.google.com/books?id={id}"),
        ..Book::default()
    }
}

fn input(username: &str, email: &str) -> RegistrationInput {
    RegistrationInput {
        username: username.to_string(),
        email: email.to_string(),
        password: "Shelves#42".to_string(),
        confirm_password: "Shelves#42".to_string(),
    }
}

fn memory_library() -> Library {
    Library::open(Config::default()).unwrap()
}

#[tokio::test]
async fn registered_reader_builds_collections_and_reviews() {
    init_logging();
    let library = memory_library();
    let user = library.register(&input("ada", "ada@example.com")).await.unwrap();
    assert_eq!(library.session().user_id().as_deref(), Some(user.user_id.as_str()));
    assert_eq!(library.directory().username(Some(&user.user_id)).await, "ada");

    let dune = book("B1", "Dune");
    let actions = library.actions(&dune);
    actions.resolve_all().await;
    assert_eq!(actions.toggle(CollectionKind::Favorites).await, Ok("Added to Favorites!"));
    assert_eq!(
        actions.toggle(CollectionKind::ReadingList).await,
        Ok("Added to Reading List!")
    );

    let mut mirror = library.mirror(CollectionKind::Favorites);
    assert_eq!(mirror.load(library.collections()).await.len(), 1);

    let review_id = library.reviews().create("B1", "A classic", 5.0).await.unwrap();
    let reviews = library.reviews().list("B1").await;
    assert_eq!(reviews[0].review_id, review_id);
    assert_eq!(reviews[0].username, "ada");
    assert!(can_delete(&reviews[0], library.session().user_id().as_deref()));
}

#[tokio::test]
async fn duplicate_registration_is_reported() {
    let library = memory_library();
    library.register(&input("ada", "ada@example.com")).await.unwrap();
    let err = library
        .register(&input("ada2", "ADA@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::Auth(AuthError::EmailAlreadyInUse)));
    assert_eq!(err.to_string(), "This email is already registered!");
}

#[tokio::test]
async fn registered_password_signs_back_in() {
    let library = memory_library();
    let mut form = input("ada", "ada@example.com");
    form.password = "Shelves#42 ".to_string();
    form.confirm_password = "Shelves#42 ".to_string();
    let user = library.register(&form).await.unwrap();
    library.identity().sign_out();
    assert!(library.session().user_id().is_none());

    let signed_in = library.login("ada@example.com", "Shelves#42 ").unwrap();
    assert_eq!(signed_in.user_id, user.user_id);
    assert_eq!(library.session().user_id(), Some(user.user_id));
}

#[tokio::test]
async fn configured_email_domain_is_enforced() {
    let config = Config {
        required_email_domain: Some("gmail.com".to_string()),
        ..Config::default()
    };
    let library = Library::open(config).unwrap();
    let err = library
        .register(&input("ada", "ada@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Email must end with @gmail.com");
    assert!(library.session().user_id().is_none());
}

#[tokio::test]
async fn rejected_requests_never_reach_the_store() {
    let store = Arc::new(InstrumentedStore::new());
    let signed_out = CollectionStore::new(store.clone(), Session::new());
    assert!(!signed_out.upsert(CollectionKind::Favorites, &book("B1", "Dune")).await);
    assert!(!signed_out.remove(CollectionKind::Favorites, "B1").await);
    assert!(!signed_out.exists(CollectionKind::ShoppingCart, "B1").await);
    assert!(signed_out.list_all(CollectionKind::ReadingList).await.is_empty());

    let reviews = ReviewStore::new(store.clone(), Session::new());
    assert!(matches!(
        reviews.create("B1", "text", 4.0).await,
        Err(LibraryError::Unauthenticated)
    ));
    assert!(matches!(
        reviews.delete("B1", "R1").await,
        Err(LibraryError::Unauthenticated)
    ));

    let signed_in =
        CollectionStore::new(store.clone(), Session::signed_in("u1", "u1@example.com"));
    assert!(!signed_in.exists(CollectionKind::Favorites, " ").await);
    let actions = booknest::BookActions::new(&signed_in, &Book::default());
    assert_eq!(
        actions.toggle(CollectionKind::Favorites).await,
        Err(ToggleError::MissingBookData)
    );

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn failed_id_patch_leaves_review_without_id() {
    let store = Arc::new(InstrumentedStore::new());
    let shared: Arc<dyn DocumentStore> = store.clone();
    booknest::UserDirectory::new(shared.clone())
        .save_profile(&booknest::User {
            user_id: "u1".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
        })
        .await
        .unwrap();
    let reviews = ReviewStore::new(shared, Session::signed_in("u1", "ada@example.com"));

    store.fail_updates(true);
    let err = reviews.create("B1", "Half written", 3.0).await.unwrap_err();
    let review_id = match err {
        LibraryError::ReviewIdPatch { review_id, .. } => review_id,
        other => panic!("unexpected error: {other}"),
    };
    assert!(!review_id.is_empty());

    let listed = reviews.list("B1").await;
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].has_id());
}

#[tokio::test]
async fn live_mirror_follows_toggles() {
    let library = memory_library();
    library.register(&input("ada", "ada@example.com")).await.unwrap();
    let mut live = library.live(CollectionKind::ShoppingCart).await.unwrap();
    assert_eq!(live.next_change().await, Some(vec![]));

    let toggle = library.actions(&book("B7", "Emma"));
    toggle.toggle(CollectionKind::ShoppingCart).await.unwrap();
    let changes = live.next_change().await.unwrap();
    match changes.as_slice() {
        [ListChange::Inserted { index: 0, book }] => {
            assert_eq!(book.title, "Emma");
            assert_eq!(book.google_books_url, "https://books.google.com/books?id=B7");
        }
        other => panic!("unexpected changes: {other:?}"),
    }

    assert_eq!(
        toggle.get(CollectionKind::ShoppingCart).state(),
        MembershipState::Present
    );
    toggle.toggle(CollectionKind::ShoppingCart).await.unwrap();
    assert_eq!(
        live.next_change().await,
        Some(vec![ListChange::Removed {
            index: 0,
            id: "B7".to_string()
        }])
    );

    library.identity().sign_out();
    assert!(library.live(CollectionKind::ShoppingCart).await.is_none());
}

#[tokio::test]
async fn sqlite_library_survives_reopen() {
    let path = std::env::temp_dir().join(format!("booknest-{}.db", uuid::Uuid::new_v4()));
    let config = Config {
        database_path: Some(path.clone()),
        ..Config::default()
    };

    let reader = AuthUser {
        user_id: "u1".to_string(),
        email: "ada@example.com".to_string(),
    };
    {
        let library = Library::open(config.clone()).unwrap();
        library.session().set(Some(reader.clone()));
        let collections = library.collections();
        assert!(collections.upsert(CollectionKind::ReadingList, &book("B1", "Dune")).await);
        assert!(collections.upsert(CollectionKind::ReadingList, &book("B2", "Emma")).await);
    }

    let library = Library::open(config).unwrap();
    library.session().set(Some(reader));
    let titles: Vec<String> = library
        .collections()
        .list_all(CollectionKind::ReadingList)
        .await
        .into_iter()
        .map(|book| book.title)
        .collect();
    assert_eq!(titles, vec!["Dune".to_string(), "Emma".to_string()]);

    let _ = std::fs::remove_file(&path);
}
