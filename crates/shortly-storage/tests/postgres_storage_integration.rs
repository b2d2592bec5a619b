//! These tests start a PostgreSQL container and need a Docker daemon.

use std::time::Duration;

use shortly_core::{NewRecord, OwnerId, ShortKey, Stats};
use shortly_storage::{PostgresStorage, Storage, StorageError};
use shortly_test_infra::postgres::{PostgresConfig, PostgresServer};
use sqlx::postgres::PgPoolOptions;

struct Fixture {
    _postgres: PostgresServer,
    storage: PostgresStorage,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(PostgresConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let pool = connect_with_retry(&url).await;

        let storage = PostgresStorage::new(pool);
        storage.reset().await.expect("create schema");

        Self {
            _postgres: postgres,
            storage,
        }
    }
}

async fn connect_with_retry(url: &str) -> sqlx::PgPool {
    let mut last_error = None;

    for _ in 0..20 {
        match PgPoolOptions::new().max_connections(5).connect(url).await {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect postgres: {last_error:?}");
}

fn key(value: &str) -> ShortKey {
    ShortKey::new_unchecked(value)
}

fn new_record(k: &str, url: &str) -> NewRecord {
    NewRecord {
        key: key(k),
        original_url: url.to_string(),
    }
}

#[tokio::test]
async fn store_and_get_record() {
    let fixture = Fixture::start().await;
    let owner = OwnerId::new_v4();

    fixture
        .storage
        .store(owner, &key("abcd1234"), "http://a.com")
        .await
        .unwrap();

    let url = fixture.storage.get(&key("abcd1234")).await.unwrap();
    assert_eq!(url, "http://a.com");
}

#[tokio::test]
async fn get_unknown_key_is_not_found() {
    let fixture = Fixture::start().await;

    let err = fixture.storage.get(&key("nope0000")).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_url_recovers_existing_key() {
    let fixture = Fixture::start().await;
    let (u1, u2) = (OwnerId::new_v4(), OwnerId::new_v4());

    fixture
        .storage
        .store(u1, &key("key00001"), "http://a.com")
        .await
        .unwrap();

    let err = fixture
        .storage
        .store(u2, &key("key00002"), "http://a.com")
        .await
        .unwrap_err();

    match err {
        StorageError::AlreadyExists { existing_key, url } => {
            assert_eq!(existing_key, key("key00001"));
            assert_eq!(url, "http://a.com");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(fixture.storage.get_all(u2).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_key_conflicts() {
    let fixture = Fixture::start().await;
    let owner = OwnerId::new_v4();

    fixture
        .storage
        .store(owner, &key("abcd1234"), "http://a.com")
        .await
        .unwrap();

    let err = fixture
        .storage
        .store(owner, &key("abcd1234"), "http://b.com")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::KeyConflict(_)));
}

#[tokio::test]
async fn batch_store_rolls_back_on_conflict() {
    let fixture = Fixture::start().await;
    let owner = OwnerId::new_v4();

    fixture
        .storage
        .store(owner, &key("key00001"), "http://a.com")
        .await
        .unwrap();

    let err = fixture
        .storage
        .batch_store(
            owner,
            &[
                new_record("key00002", "http://x.com"),
                new_record("key00003", "http://a.com"),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::BatchConflict));
    assert!(matches!(
        fixture.storage.get(&key("key00002")).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
    assert_eq!(fixture.storage.stats().await.unwrap().urls, 1);
}

#[tokio::test]
async fn batch_delete_soft_deletes_only_owned_keys() {
    let fixture = Fixture::start().await;
    let (u1, u2) = (OwnerId::new_v4(), OwnerId::new_v4());

    fixture
        .storage
        .batch_store(
            u1,
            &[
                new_record("key00001", "http://x.com"),
                new_record("key00002", "http://y.com"),
            ],
        )
        .await
        .unwrap();
    fixture
        .storage
        .store(u2, &key("key00003"), "http://z.com")
        .await
        .unwrap();

    fixture
        .storage
        .batch_delete(u1, &[key("key00001"), key("key00003"), key("unknown0")])
        .await
        .unwrap();

    assert!(matches!(
        fixture.storage.get(&key("key00001")).await.unwrap_err(),
        StorageError::Deleted(_)
    ));
    assert_eq!(
        fixture.storage.get(&key("key00003")).await.unwrap(),
        "http://z.com"
    );

    let owned = fixture.storage.get_all(u1).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[&key("key00002")], "http://y.com");

    assert_eq!(
        fixture.storage.stats().await.unwrap(),
        Stats { urls: 2, users: 2 }
    );
}

#[tokio::test]
async fn deleted_url_can_be_shortened_again() {
    let fixture = Fixture::start().await;
    let owner = OwnerId::new_v4();

    fixture
        .storage
        .store(owner, &key("key00001"), "http://a.com")
        .await
        .unwrap();
    fixture
        .storage
        .batch_delete(owner, &[key("key00001")])
        .await
        .unwrap();

    fixture
        .storage
        .store(owner, &key("key00002"), "http://a.com")
        .await
        .unwrap();
    assert_eq!(
        fixture.storage.get(&key("key00002")).await.unwrap(),
        "http://a.com"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn store_races_with_deletes_of_the_same_url() {
    let fixture = Fixture::start().await;
    let owner = OwnerId::new_v4();
    let url = "http://contended.com";

    for round in 0..50u32 {
        let deleter = {
            let storage = fixture.storage.clone();
            let live = storage.get_all(owner).await.unwrap();
            tokio::spawn(async move {
                let keys: Vec<ShortKey> = live.into_keys().collect();
                storage.batch_delete(owner, &keys).await
            })
        };

        let stores: Vec<_> = (0..4u32)
            .map(|slot| {
                let storage = fixture.storage.clone();
                let k = ShortKey::new_unchecked(format!("k{round:03}{slot:04}"));
                tokio::spawn(async move { storage.store(owner, &k, url).await })
            })
            .collect();

        deleter.await.unwrap().unwrap();
        for store in stores {
            match store.await.unwrap() {
                Ok(()) | Err(StorageError::AlreadyExists { .. }) => {}
                Err(other) => panic!("round {round}: unexpected error: {other:?}"),
            }
        }
    }

    assert!(fixture.storage.get_all(owner).await.unwrap().len() <= 1);
}

#[tokio::test]
async fn ping_and_close() {
    let fixture = Fixture::start().await;

    fixture.storage.ping().await.unwrap();
    fixture.storage.close().await.unwrap();
    fixture.storage.close().await.unwrap();

    let err = fixture.storage.ping().await.unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)));
}
