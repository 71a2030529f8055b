//! Shared test fixtures
//!
//! Database-backed tests run against the database named by `DATABASE_URL`
//! and skip themselves when it is not set, so the unit and property suites
//! stay runnable without infrastructure.

use sqlx::PgPool;

/// Connect and migrate, or `None` when no test database is configured.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url)
        .await
        .expect("connecting to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("running migrations");
    Some(pool)
}

/// Create a user with a unique username and return its id.
pub async fn create_user(pool: &PgPool, tag: &str) -> i64 {
    let username = format!("{tag}-{}", uuid::Uuid::new_v4());
    ripple::repo::users::create(pool, &username, None, "x", tag)
        .await
        .expect("creating test user")
        .id
}

/// An in-memory publisher capturing everything the code under test emits.
pub mod mock_bus {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use ripple::bus::Publisher;
    use ripple::error::Result;

    #[derive(Debug, Clone)]
    pub struct Published {
        pub topic: String,
        pub key: String,
        pub payload: Vec<u8>,
    }

    #[derive(Default)]
    pub struct MockPublisher {
        records: Mutex<Vec<Published>>,
    }

    impl MockPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn records(&self) -> Vec<Published> {
            self.records.lock().unwrap().clone()
        }

        pub fn records_for(&self, topic: &str) -> Vec<Published> {
            self.records()
                .into_iter()
                .filter(|r| r.topic == topic)
                .collect()
        }
    }

    #[async_trait]
    impl Publisher for MockPublisher {
        async fn publish(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<()> {
            self.records.lock().unwrap().push(Published {
                topic: topic.to_string(),
                key: String::from_utf8_lossy(key).into_owned(),
                payload: payload.to_vec(),
            });
            Ok(())
        }
    }
}
