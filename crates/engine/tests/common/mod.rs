#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use engine::{
    DepositCmd, Engine, EngineBuilder, EngineError, Money, NewNotification, Notifier,
    RandomReferences, ReferenceGenerator, ReferencePrefix, ResultEngine, User,
};
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

pub async fn database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_from(|builder| builder).await
}

/// Build an engine on a fresh database, letting the caller tweak the builder.
pub async fn engine_from<F>(configure: F) -> (Engine, DatabaseConnection)
where
    F: FnOnce(EngineBuilder) -> EngineBuilder,
{
    let db = database().await;
    let engine = configure(Engine::builder().database(db.clone()))
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// A migrated SQLite file under `target/test_dbs` behind a pool of several
/// connections, so that concurrent units of work really overlap.
/// `sqlite::memory:` is limited to one pooled connection.
pub async fn file_database() -> (DatabaseConnection, PathBuf) {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let mut options = ConnectOptions::new(format!("sqlite:{}?mode=rwc", path.display()));
    options
        .max_connections(8)
        .map_sqlx_sqlite_opts(|opts| opts.busy_timeout(Duration::from_secs(5)));

    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    (db, path)
}

/// Like [`engine_from`], on a [`file_database`]. The engine is shared so
/// tests can spawn operations onto the runtime.
pub async fn engine_with_file_db<F>(configure: F) -> (Arc<Engine>, DatabaseConnection, PathBuf)
where
    F: FnOnce(EngineBuilder) -> EngineBuilder,
{
    let (db, path) = file_database().await;
    let engine = configure(Engine::builder().database(db.clone()))
        .build()
        .await
        .unwrap();
    (Arc::new(engine), db, path)
}

/// Create a user and deposit `cents` into the account.
pub async fn funded_user(engine: &Engine, name: &str, cents: i64) -> User {
    let user = engine
        .create_user(name, &format!("{name}@example.com"))
        .await
        .unwrap();
    if cents > 0 {
        engine
            .deposit(DepositCmd::new(user.id, Money::new(cents)))
            .await
            .unwrap();
    }
    engine.user(user.id).await.unwrap()
}

pub async fn count_rows(db: &DatabaseConnection, table: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

pub async fn total_balance(db: &DatabaseConnection) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            "SELECT COALESCE(SUM(balance), 0) AS total FROM users".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "total").unwrap()
}

/// Hands out scripted references first, then random ones.
#[derive(Debug, Default)]
pub struct ScriptedReferences {
    script: Mutex<VecDeque<String>>,
}

impl ScriptedReferences {
    pub fn new<I: IntoIterator<Item = &'static str>>(script: I) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(str::to_string).collect()),
        })
    }

    pub fn push(&self, reference: &str) {
        self.script.lock().unwrap().push_back(reference.to_string());
    }
}

impl ReferenceGenerator for ScriptedReferences {
    fn generate(&self, prefix: ReferencePrefix) -> String {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RandomReferences.generate(prefix))
    }
}

/// Always returns the same reference for a prefix.
#[derive(Debug)]
pub struct FixedReferences;

impl ReferenceGenerator for FixedReferences {
    fn generate(&self, prefix: ReferencePrefix) -> String {
        format!("{prefix}0000000000")
    }
}

#[derive(Debug)]
pub struct BrokenNotifier;

#[async_trait]
impl Notifier for BrokenNotifier {
    async fn notify(&self, _notification: NewNotification) -> ResultEngine<()> {
        Err(EngineError::Validation("mail relay unavailable".to_string()))
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<NewNotification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: NewNotification) -> ResultEngine<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}
