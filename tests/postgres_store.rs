//! PostgreSQL store tests.
//!
//! Skipped unless `TEST_DATABASE_URL` points at a scratch database; the
//! migrations are applied on first use.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use uuid::Uuid;

use wallet_service::{
    db,
    error::AppError,
    models::user::{NewUser, ProfileChanges},
    services::transfer_service::TransferCoordinator,
    store::{AccountStore, IdentityDirectory, PgStore},
};

async fn test_store() -> Option<Arc<PgStore>> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = db::create_pool(&url, 10).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    Some(Arc::new(PgStore::new(pool, Duration::from_secs(2))))
}

fn unique_username() -> String {
    format!("pg_{}", &Uuid::new_v4().simple().to_string()[..16])
}

async fn new_user(store: &PgStore, first: &str, balance: i64) -> Uuid {
    let user = NewUser {
        username: unique_username(),
        password_hash: "hash".to_string(),
        first_name: first.to_string(),
        last_name: "Tester".to_string(),
    };
    store.create_user(user, balance).await.unwrap().id
}

#[tokio::test]
async fn test_create_user_seeds_account() {
    let Some(store) = test_store().await else { return };
    let id = new_user(&store, "Seed", 1_234).await;

    assert_eq!(store.get_balance(id).await.unwrap(), 1_234);
    assert!(matches!(
        store.create_account(id, 10).await,
        Err(AppError::AccountAlreadyExists)
    ));
}

#[tokio::test]
async fn test_create_account_requires_existing_user() {
    let Some(store) = test_store().await else { return };
    let owner = Uuid::new_v4();

    assert!(matches!(
        store.create_account(owner, 10).await,
        Err(AppError::UserNotFound)
    ));
    assert!(matches!(
        store.get_balance(owner).await,
        Err(AppError::AccountNotFound)
    ));
}

#[tokio::test]
async fn test_duplicate_username_creates_nothing() {
    let Some(store) = test_store().await else { return };
    let username = unique_username();
    let user = NewUser {
        username: username.clone(),
        password_hash: "hash".to_string(),
        first_name: "First".to_string(),
        last_name: "Tester".to_string(),
    };
    store.create_user(user.clone(), 100).await.unwrap();

    let result = store.create_user(user, 100).await;
    assert!(matches!(result, Err(AppError::DuplicateUsername)));
    assert!(store.find_by_username(&username).await.unwrap().is_some());
}

#[tokio::test]
async fn test_update_profile_keeps_unset_fields() {
    let Some(store) = test_store().await else { return };
    let id = new_user(&store, "Before", 100).await;

    let updated = store
        .update_profile(
            id,
            ProfileChanges {
                last_name: Some("After".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.first_name, "Before");
    assert_eq!(updated.last_name, "After");
    assert!(matches!(
        store.update_profile(Uuid::new_v4(), ProfileChanges::default()).await,
        Err(AppError::UserNotFound)
    ));
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let Some(store) = test_store().await else { return };
    let marker = Uuid::new_v4().simple().to_string();
    let id = new_user(&store, &format!("Pct{marker}"), 100).await;

    let found = store.search(&marker.to_uppercase()).await.unwrap();
    assert!(found.iter().any(|u| u.id == id));
    assert!(store.search("%_no_such_name_%").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transfer_commits_both_sides() {
    let Some(store) = test_store().await else { return };
    let from = new_user(&store, "From", 1_000).await;
    let to = new_user(&store, "To", 0).await;
    let coordinator = TransferCoordinator::new(store.clone(), Duration::from_secs(2), 3);

    let receipt = coordinator.transfer(from, to, 250).await.unwrap();
    assert_eq!(receipt.source_balance, 750);
    assert_eq!(receipt.destination_balance, 250);

    assert!(matches!(
        coordinator.transfer(from, to, 751).await,
        Err(AppError::InsufficientFunds)
    ));
    assert!(matches!(
        coordinator.transfer(from, Uuid::new_v4(), 1).await,
        Err(AppError::AccountNotFound)
    ));
    assert_eq!(store.get_balance(from).await.unwrap(), 750);
    assert_eq!(store.get_balance(to).await.unwrap(), 250);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_never_overdraw() {
    let Some(store) = test_store().await else { return };
    let from = new_user(&store, "Hot", 1_000).await;
    let to = new_user(&store, "Cold", 0).await;
    let coordinator = TransferCoordinator::new(store.clone(), Duration::from_secs(5), 5);

    let mut tasks = JoinSet::new();
    for _ in 0..20 {
        let coordinator = coordinator.clone();
        tasks.spawn(async move { coordinator.transfer(from, to, 70).await });
    }

    let mut succeeded = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert!(matches!(e, AppError::InsufficientFunds), "unexpected {e:?}"),
        }
    }

    assert_eq!(succeeded, 14);
    assert_eq!(store.get_balance(from).await.unwrap(), 20);
    assert_eq!(store.get_balance(to).await.unwrap(), 980);
}
