//! Recipe persistence behind a swappable store interface
//!
//! Stores publish every change as a [`RecipeEvent`]. Consumers keep their own
//! [`RecipeList`] and fold events into it; nothing reads the store's tables
//! directly except the store itself.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::StoreError;
use crate::models::{Recipe, StoredRecipe};
use crate::retry::RetryPolicy;

/// A change to the stored recipe set
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeEvent {
    Added(StoredRecipe),
    Modified(StoredRecipe),
    Removed(String),
}

/// Persistence for whole recipe documents, keyed by id.
pub trait RecipeStore {
    /// Persist a recipe and return its id. Recipes with an empty id are
    /// assigned a fresh one. An empty name is rejected before anything is written.
    fn save(&mut self, recipe: &Recipe) -> Result<String, StoreError>;

    fn delete(&mut self, id: &str) -> Result<(), StoreError>;

    /// Start receiving change events. The current contents arrive first as
    /// `Added` events, followed by live changes.
    fn subscribe(&mut self) -> Result<Receiver<RecipeEvent>, StoreError>;

    fn get(&self, id: &str) -> Result<StoredRecipe, StoreError>;

    /// All recipes, most recently updated first.
    fn list(&self) -> Result<Vec<StoredRecipe>, StoreError>;
}

/// SQLite-backed recipe store.
///
/// rusqlite is blocking; async callers should go through `spawn_blocking`.
pub struct SqliteRecipeStore {
    conn: Connection,
    subscribers: Vec<Sender<RecipeEvent>>,
}

impl SqliteRecipeStore {
    /// Open (or create) the store at `db_path`, creating parent directories.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create data dir {}: {}", parent.display(), e);
            }
        }
        let conn = Connection::open(db_path)?;
        db::init_schema(&conn)?;
        info!("Opened recipe store at {}", db_path.display());
        Ok(Self::with_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        db::init_schema(&conn)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            subscribers: Vec::new(),
        }
    }

    fn publish(&mut self, event: RecipeEvent) {
        // Receivers that were dropped are forgotten
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl RecipeStore for SqliteRecipeStore {
    fn save(&mut self, recipe: &Recipe) -> Result<String, StoreError> {
        if recipe.name.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }

        let mut document = recipe.clone();
        if document.id.is_empty() {
            document.id = Uuid::new_v4().to_string();
        }

        let existed = db::get_recipe(&self.conn, &document.id)?.is_some();
        let updated_at = Utc::now();
        db::upsert_recipe(&self.conn, &document, updated_at)?;

        info!("Saved recipe '{}' ({})", document.name, document.id);
        let id = document.id.clone();
        let stored = StoredRecipe {
            recipe: document,
            updated_at,
        };
        self.publish(if existed {
            RecipeEvent::Modified(stored)
        } else {
            RecipeEvent::Added(stored)
        });
        Ok(id)
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        if !db::delete_recipe(&self.conn, id)? {
            return Err(StoreError::NotFound(id.to_string()));
        }
        info!("Deleted recipe {}", id);
        self.publish(RecipeEvent::Removed(id.to_string()));
        Ok(())
    }

    fn subscribe(&mut self) -> Result<Receiver<RecipeEvent>, StoreError> {
        let (tx, rx) = mpsc::channel();
        let mut snapshot = db::list_recipes(&self.conn)?;
        // Oldest first, as if each had just been added
        snapshot.reverse();
        for stored in snapshot {
            // The receiver is still in scope, so this cannot fail
            let _ = tx.send(RecipeEvent::Added(stored));
        }
        self.subscribers.push(tx);
        debug!("New recipe subscriber ({} active)", self.subscribers.len());
        Ok(rx)
    }

    fn get(&self, id: &str) -> Result<StoredRecipe, StoreError> {
        db::get_recipe(&self.conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<StoredRecipe>, StoreError> {
        db::list_recipes(&self.conn)
    }
}

/// Async, retrying front for a blocking [`RecipeStore`].
///
/// Each call runs on tokio's blocking pool. A busy or locked database is
/// retried under the store's [`RetryPolicy`]. Dropping a returned future
/// cancels any pending retry; a call already handed to the blocking pool
/// still finishes, but its result is discarded.
pub struct AsyncRecipeStore<S> {
    inner: Arc<Mutex<S>>,
    policy: RetryPolicy<StoreError>,
}

impl<S> Clone for AsyncRecipeStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            policy: self.policy.clone(),
        }
    }
}

impl<S: RecipeStore + Send + 'static> AsyncRecipeStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, RetryPolicy::new(3, Duration::from_millis(100)))
    }

    pub fn with_policy(store: S, policy: RetryPolicy<StoreError>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
            policy,
        }
    }

    pub async fn save(&self, recipe: Recipe) -> Result<String, StoreError> {
        self.call(move |store| store.save(&recipe)).await
    }

    pub async fn delete(&self, id: impl Into<String>) -> Result<(), StoreError> {
        let id = id.into();
        self.call(move |store| store.delete(&id)).await
    }

    pub async fn subscribe(&self) -> Result<Receiver<RecipeEvent>, StoreError> {
        self.call(|store| store.subscribe()).await
    }

    pub async fn get(&self, id: impl Into<String>) -> Result<StoredRecipe, StoreError> {
        let id = id.into();
        self.call(move |store| store.get(&id)).await
    }

    pub async fn list(&self) -> Result<Vec<StoredRecipe>, StoreError> {
        self.call(|store| store.list()).await
    }

    async fn call<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: Fn(&mut S) -> Result<T, StoreError> + Send + Sync + 'static,
    {
        let operation = Arc::new(operation);
        self.policy
            .run(|attempt| {
                let inner = Arc::clone(&self.inner);
                let operation = Arc::clone(&operation);
                async move {
                    debug!("Recipe store call, attempt {}", attempt);
                    tokio::task::spawn_blocking(move || {
                        let mut store = inner
                            .lock()
                            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
                        (*operation)(&mut *store)
                    })
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
                }
            })
            .await
    }
}

/// Local view of the stored recipes, built by folding change events.
#[derive(Debug, Clone, Default)]
pub struct RecipeList {
    entries: Vec<StoredRecipe>,
}

impl RecipeList {
    pub fn apply(&mut self, event: RecipeEvent) {
        match event {
            // Entries stay in write order, so a rewrite moves to the end
            RecipeEvent::Added(stored) | RecipeEvent::Modified(stored) => {
                self.entries.retain(|e| e.recipe.id != stored.recipe.id);
                self.entries.push(stored);
            }
            RecipeEvent::Removed(id) => self.entries.retain(|e| e.recipe.id != id),
        }
    }

    /// Fold every event already waiting on `events` without blocking.
    /// Returns the number of events applied.
    pub fn catch_up(&mut self, events: &Receiver<RecipeEvent>) -> usize {
        let mut applied = 0;
        for event in events.try_iter() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Entries oldest write first.
    pub fn recipes(&self) -> &[StoredRecipe] {
        &self.entries
    }

    /// Entries most recent write first, the order the store lists them in.
    pub fn newest_first(&self) -> impl Iterator<Item = &StoredRecipe> {
        self.entries.iter().rev()
    }

    pub fn get(&self, id: &str) -> Option<&StoredRecipe> {
        self.entries.iter().find(|e| e.recipe.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The recipe to open by default: the one updated last. On equal
    /// timestamps the later entry wins.
    pub fn most_recent(&self) -> Option<&StoredRecipe> {
        self.entries.iter().max_by_key(|e| e.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NumericInput;
    use chrono::TimeZone;

    fn store() -> SqliteRecipeStore {
        SqliteRecipeStore::open_in_memory().unwrap()
    }

    fn stored(id: &str, name: &str, ms: i64) -> StoredRecipe {
        StoredRecipe {
            recipe: Recipe {
                id: id.to_string(),
                ..Recipe::named(name)
            },
            updated_at: Utc.timestamp_millis_opt(ms).unwrap(),
        }
    }

    #[test]
    fn test_save_rejects_empty_name_without_writing() {
        let mut store = store();
        let events = store.subscribe().unwrap();

        let err = store.save(&Recipe::named("   ")).unwrap_err();

        assert!(matches!(err, StoreError::EmptyName));
        assert!(store.list().unwrap().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_save_assigns_id_to_new_recipe() {
        let mut store = store();
        let id = store.save(&Recipe::named("Granola")).unwrap();

        assert!(!id.is_empty());
        let stored = store.get(&id).unwrap();
        assert_eq!(stored.recipe.id, id);
        assert_eq!(stored.recipe.name, "Granola");
    }

    #[test]
    fn test_save_keeps_existing_id() {
        let mut store = store();
        let id = store.save(&Recipe::named("Granola")).unwrap();
        let mut recipe = store.get(&id).unwrap().recipe;
        recipe.name = "Maple granola".to_string();

        assert_eq!(store.save(&recipe).unwrap(), id);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_missing_is_reported() {
        let mut store = store();
        assert!(matches!(store.delete("ghost"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_subscribe_replays_then_streams_changes() {
        let mut store = store();
        let first = store.save(&Recipe::named("Fudge")).unwrap();

        let events = store.subscribe().unwrap();
        let second = store.save(&Recipe::named("Toffee")).unwrap();
        let mut fudge = store.get(&first).unwrap().recipe;
        fudge.batch_yield = 30.0.into();
        store.save(&fudge).unwrap();
        store.delete(&second).unwrap();

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(received.len(), 4);
        assert!(matches!(&received[0], RecipeEvent::Added(s) if s.recipe.id == first));
        assert!(matches!(&received[1], RecipeEvent::Added(s) if s.recipe.id == second));
        assert!(matches!(&received[2], RecipeEvent::Modified(s) if s.recipe.batch_yield == NumericInput::Number(30.0)));
        assert_eq!(received[3], RecipeEvent::Removed(second));
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let mut store = store();
        let events = store.subscribe().unwrap();
        drop(events);

        store.save(&Recipe::named("Brittle")).unwrap();
        assert!(store.subscribers.is_empty());
    }

    #[test]
    fn test_recipe_list_folds_events() {
        let mut list = RecipeList::default();
        list.apply(RecipeEvent::Added(stored("a", "A", 1)));
        list.apply(RecipeEvent::Added(stored("b", "B", 2)));
        list.apply(RecipeEvent::Modified(stored("a", "A2", 3)));
        list.apply(RecipeEvent::Removed("b".to_string()));
        list.apply(RecipeEvent::Removed("unknown".to_string()));

        assert_eq!(list.len(), 1);
        assert_eq!(list.get("a").map(|s| s.recipe.name.as_str()), Some("A2"));
    }

    #[test]
    fn test_most_recent_picks_latest_update() {
        let mut list = RecipeList::default();
        assert!(list.most_recent().is_none());

        list.apply(RecipeEvent::Added(stored("a", "A", 5)));
        list.apply(RecipeEvent::Added(stored("b", "B", 9)));
        list.apply(RecipeEvent::Added(stored("c", "C", 9)));
        list.apply(RecipeEvent::Added(stored("d", "D", 1)));

        assert_eq!(list.most_recent().map(|s| s.recipe.id.as_str()), Some("c"));
    }

    #[test]
    fn test_modified_entry_moves_to_newest() {
        let mut list = RecipeList::default();
        list.apply(RecipeEvent::Added(stored("a", "A", 9)));
        list.apply(RecipeEvent::Added(stored("b", "B", 9)));
        list.apply(RecipeEvent::Modified(stored("a", "A2", 9)));

        assert_eq!(list.most_recent().map(|s| s.recipe.id.as_str()), Some("a"));
        let order: Vec<_> = list.newest_first().map(|s| s.recipe.id.as_str()).collect();
        assert_eq!(order, ["a", "b"]);
    }

    #[test]
    fn test_list_order_matches_store_order() {
        let mut store = store();
        let first = store.save(&Recipe::named("Scones")).unwrap();
        store.save(&Recipe::named("Muffins")).unwrap();
        let scones = store.get(&first).unwrap().recipe;
        store.save(&scones).unwrap();

        let events = store.subscribe().unwrap();
        let mut list = RecipeList::default();
        list.catch_up(&events);

        let from_store: Vec<_> = store.list().unwrap().into_iter().map(|s| s.recipe.id).collect();
        let from_list: Vec<_> = list.newest_first().map(|s| s.recipe.id.clone()).collect();
        assert_eq!(from_list, from_store);
        assert_eq!(from_list[0], first);
    }

    /// Store that reports SQLITE_BUSY for the first few saves.
    struct BusyStore {
        inner: SqliteRecipeStore,
        busy_saves: u32,
        save_calls: Arc<std::sync::atomic::AtomicU32>,
    }

    impl RecipeStore for BusyStore {
        fn save(&mut self, recipe: &Recipe) -> Result<String, StoreError> {
            self.save_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.busy_saves > 0 {
                self.busy_saves -= 1;
                return Err(StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                    None,
                )));
            }
            self.inner.save(recipe)
        }
        fn delete(&mut self, id: &str) -> Result<(), StoreError> {
            self.inner.delete(id)
        }
        fn subscribe(&mut self) -> Result<Receiver<RecipeEvent>, StoreError> {
            self.inner.subscribe()
        }
        fn get(&self, id: &str) -> Result<StoredRecipe, StoreError> {
            self.inner.get(id)
        }
        fn list(&self) -> Result<Vec<StoredRecipe>, StoreError> {
            self.inner.list()
        }
    }

    fn busy_store(busy_saves: u32) -> (AsyncRecipeStore<BusyStore>, Arc<std::sync::atomic::AtomicU32>) {
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let store = BusyStore {
            inner: store(),
            busy_saves,
            save_calls: Arc::clone(&calls),
        };
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        (AsyncRecipeStore::with_policy(store, policy), calls)
    }

    #[tokio::test]
    async fn test_async_save_retries_busy_database() {
        let (store, calls) = busy_store(2);

        let id = store.save(Recipe::named("Biscotti")).await.unwrap();

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(store.get(id).await.unwrap().recipe.name, "Biscotti");
    }

    #[tokio::test]
    async fn test_async_save_gives_up_when_always_busy() {
        let (store, calls) = busy_store(10);

        let err = store.save(Recipe::named("Biscotti")).await.unwrap_err();

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert!(matches!(err, StoreError::Exhausted { attempts: 3, .. }));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_async_validation_error_not_retried() {
        let (store, calls) = busy_store(0);

        let err = store.save(Recipe::named("")).await.unwrap_err();

        assert!(matches!(err, StoreError::EmptyName));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_store_round_trip() {
        let store = AsyncRecipeStore::new(store());
        let events = store.subscribe().await.unwrap();

        let id = store.save(Recipe::named("Madeleines")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
        store.delete(id.clone()).await.unwrap();
        assert!(matches!(store.get(id.clone()).await, Err(StoreError::NotFound(_))));

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1], RecipeEvent::Removed(id));
    }

    #[test]
    fn test_catch_up_drains_pending_events() {
        let mut store = store();
        store.save(&Recipe::named("Scones")).unwrap();
        let events = store.subscribe().unwrap();
        store.save(&Recipe::named("Muffins")).unwrap();

        let mut list = RecipeList::default();
        assert_eq!(list.catch_up(&events), 2);
        assert_eq!(list.catch_up(&events), 0);
        assert_eq!(list.len(), 2);
    }
}
