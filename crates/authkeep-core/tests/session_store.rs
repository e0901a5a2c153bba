use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use authkeep_core::{
    AppCoordinates, BackendType, FilePersistence, InMemoryPersistence, Persistence, Result,
    SessionStore, SharedPersistence, StoreError, User,
};
use serde_json::{json, Value};

const USER_KEY: &str = "firebase:authUser:key123:app1";

fn coords() -> AppCoordinates {
    AppCoordinates::new("key123", "app1")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Get(String),
    Set(String),
    Remove(String),
}

/// In-memory backend that records every call and can be told to fail.
struct Recording {
    backend_type: BackendType,
    data: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<Call>>,
    fail_get: bool,
    fail_set: bool,
    fail_remove: bool,
}

impl Recording {
    fn new(backend_type: BackendType) -> Self {
        Self {
            backend_type,
            data: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_get: false,
            fail_set: false,
            fail_remove: false,
        }
    }

    fn with(self, key: &str, value: Value) -> Self {
        self.data.lock().unwrap().insert(key.to_string(), value);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn peek(&self, key: &str) -> Option<Value> {
        self.data.lock().unwrap().get(key).cloned()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail(&self) -> StoreError {
        StoreError::unavailable(self.backend_type.clone(), "disabled")
    }
}

#[async_trait]
impl Persistence for Recording {
    fn backend_type(&self) -> BackendType {
        self.backend_type.clone()
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.record(Call::Get(key.to_string()));
        if self.fail_get {
            return Err(self.fail());
        }
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.record(Call::Set(key.to_string()));
        if self.fail_set {
            return Err(self.fail());
        }
        self.data.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.record(Call::Remove(key.to_string()));
        if self.fail_remove {
            return Err(self.fail());
        }
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}

fn shared(r: &Arc<Recording>) -> SharedPersistence {
    r.clone()
}

// ── Resolution ──────────────────────────────────────────────────────

#[tokio::test]
async fn resolves_to_first_backend_holding_a_session() {
    let a = Arc::new(Recording::new(BackendType::Local));
    let b = Arc::new(Recording::new(BackendType::Session).with(USER_KEY, json!({"uid": "u1"})));

    let store = SessionStore::<User>::create(coords(), vec![shared(&a), shared(&b)]).await;

    assert_eq!(store.backend_type(), BackendType::Session);
    assert_eq!(a.calls(), vec![Call::Get(USER_KEY.into())]);
    assert_eq!(b.calls(), vec![Call::Get(USER_KEY.into())]);
    assert_eq!(a.peek(USER_KEY), None);
}

#[tokio::test]
async fn later_backends_are_not_probed_after_a_hit() {
    let a = Arc::new(Recording::new(BackendType::Local).with(USER_KEY, json!({"uid": "a"})));
    let b = Arc::new(Recording::new(BackendType::Session).with(USER_KEY, json!({"uid": "b"})));

    let store = SessionStore::<User>::create(coords(), vec![shared(&a), shared(&b)]).await;

    assert_eq!(store.backend_type(), BackendType::Local);
    assert!(b.calls().is_empty());
    assert_eq!(store.current_user().await.unwrap().unwrap().uid, "a");
}

#[tokio::test]
async fn no_hit_falls_back_to_in_memory_without_writes() {
    let a = Arc::new(Recording::new(BackendType::Local));
    let b = Arc::new(Recording::new(BackendType::Session));

    let store = SessionStore::<User>::create(coords(), vec![shared(&a), shared(&b)]).await;

    assert_eq!(store.backend_type(), BackendType::None);
    assert_eq!(store.current_user().await.unwrap(), None);
    for r in [&a, &b] {
        assert!(r.calls().iter().all(|c| matches!(c, Call::Get(_))));
    }
}

#[tokio::test]
async fn empty_hierarchy_yields_volatile_signed_out_store() {
    let store = SessionStore::<User>::create(coords(), Vec::new()).await;
    assert_eq!(store.backend_type(), BackendType::None);
    assert_eq!(store.current_user().await.unwrap(), None);
}

#[tokio::test]
async fn failing_probe_counts_as_miss() {
    let mut broken = Recording::new(BackendType::Local);
    broken.fail_get = true;
    let broken = Arc::new(broken);
    let b = Arc::new(Recording::new(BackendType::Session).with(USER_KEY, json!({"uid": "u1"})));

    let store = SessionStore::<User>::create(coords(), vec![shared(&broken), shared(&b)]).await;

    assert_eq!(store.backend_type(), BackendType::Session);
    assert_eq!(broken.calls(), vec![Call::Get(USER_KEY.into())]);
}

#[tokio::test]
async fn other_apps_sessions_are_invisible() {
    let other = Arc::new(
        Recording::new(BackendType::Local)
            .with("firebase:authUser:key123:app2", json!({"uid": "someone-else"})),
    );
    let store = SessionStore::<User>::create(coords(), vec![shared(&other)]).await;
    assert_eq!(store.backend_type(), BackendType::None);
}

#[tokio::test]
async fn durable_local_session_found_behind_volatile() {
    let dir = tempfile::tempdir().unwrap();
    let local: SharedPersistence = Arc::new(FilePersistence::local(dir.path().join("local.json")));
    local.set(USER_KEY, json!({"uid": "u1"})).await.unwrap();
    let volatile: SharedPersistence = Arc::new(InMemoryPersistence::new());

    let store = SessionStore::<User>::create(coords(), vec![volatile, local]).await;

    assert_eq!(store.backend_type(), BackendType::Local);
    assert_eq!(store.current_user().await.unwrap(), Some(User::new("u1")));
}

#[tokio::test]
async fn stored_null_is_not_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let volatile: SharedPersistence = Arc::new(InMemoryPersistence::new());
    volatile.set(USER_KEY, Value::Null).await.unwrap();
    let local: SharedPersistence = Arc::new(FilePersistence::local(dir.path().join("local.json")));
    local.set(USER_KEY, json!({"uid": "u1"})).await.unwrap();

    let store = SessionStore::<User>::create(coords(), vec![volatile, local]).await;

    assert_eq!(store.backend_type(), BackendType::Local);
    assert_eq!(store.current_user().await.unwrap(), Some(User::new("u1")));
}

#[tokio::test]
async fn stored_null_reads_as_signed_out_and_is_not_migrated() {
    let a = Arc::new(Recording::new(BackendType::Local));
    let b = Arc::new(Recording::new(BackendType::Session));
    let mut store = SessionStore::<User>::create(coords(), Vec::new()).await;
    store.set_persistence(shared(&a)).await.unwrap();
    a.data.lock().unwrap().insert(USER_KEY.to_string(), Value::Null);

    assert_eq!(store.current_user().await.unwrap(), None);

    store.set_persistence(shared(&b)).await.unwrap();
    assert_eq!(store.backend_type(), BackendType::Session);
    assert!(b.calls().is_empty());
    assert_eq!(a.peek(USER_KEY), None);
}

// ── Direct access ───────────────────────────────────────────────────

async fn store_on(backend: &Arc<Recording>) -> SessionStore<User> {
    let mut store = SessionStore::<User>::create(coords(), Vec::new()).await;
    store.set_persistence(shared(backend)).await.unwrap();
    store
}

#[tokio::test]
async fn read_failure_reaches_the_caller() {
    let mut broken = Recording::new(BackendType::Session).with(USER_KEY, json!({"uid": "u1"}));
    broken.fail_get = true;
    let broken = Arc::new(broken);
    let store = store_on(&broken).await;

    let err = store.current_user().await.unwrap_err();
    assert!(
        matches!(&err, StoreError::StorageUnavailable { backend, .. } if *backend == BackendType::Session),
        "{err}"
    );
    let err = store
        .current_user_with(|raw| Ok::<_, authkeep_core::ReviveError>(raw))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(broken.peek(USER_KEY), Some(json!({"uid": "u1"})));
}

#[tokio::test]
async fn redirect_marker_write_failure_reaches_the_caller() {
    let mut broken = Recording::new(BackendType::Session);
    broken.fail_set = true;
    let broken = Arc::new(broken);
    let store = store_on(&broken).await;

    let err = store.save_persistence_for_redirect().await.unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(
        broken.calls(),
        vec![Call::Set("firebase:persistence:key123:app1".into())]
    );
}

#[tokio::test]
async fn direct_access_propagates_unavailable() {
    let a = Arc::new(Recording::new(BackendType::Local).with(USER_KEY, json!({"uid": "u1"})));
    let store = SessionStore::<User>::create(coords(), vec![shared(&a)]).await;

    let mut broken = Recording::new(BackendType::Session);
    broken.fail_set = true;
    broken.fail_remove = true;
    let broken = Arc::new(broken);
    let mut store_on_broken = SessionStore::<User>::create(coords(), Vec::new()).await;
    store_on_broken.set_persistence(shared(&broken)).await.unwrap();

    let err = store_on_broken.set_current_user(&User::new("u2")).await.unwrap_err();
    assert!(err.is_unavailable());
    let err = store_on_broken.remove_current_user().await.unwrap_err();
    assert!(err.is_unavailable());
    assert!(store.current_user().await.unwrap().is_some());
}

#[tokio::test]
async fn set_overwrites_existing_user() {
    let a = Arc::new(Recording::new(BackendType::Local).with(USER_KEY, json!({"uid": "u1"})));
    let store = SessionStore::<User>::create(coords(), vec![shared(&a)]).await;
    store.set_current_user(&User::new("u2")).await.unwrap();
    assert_eq!(a.peek(USER_KEY).unwrap()["uid"], "u2");
}

// ── Migration ───────────────────────────────────────────────────────

#[tokio::test]
async fn switching_to_same_type_is_a_no_op() {
    let a = Arc::new(Recording::new(BackendType::Local).with(USER_KEY, json!({"uid": "u1"})));
    let other_local = Arc::new(Recording::new(BackendType::Local));
    let mut store = SessionStore::<User>::create(coords(), vec![shared(&a)]).await;

    store.set_persistence(shared(&other_local)).await.unwrap();

    assert_eq!(a.peek(USER_KEY), Some(json!({"uid": "u1"})));
    assert!(other_local.calls().is_empty());
    assert_eq!(a.calls(), vec![Call::Get(USER_KEY.into())]);
    assert_eq!(store.backend_type(), BackendType::Local);
}

#[tokio::test]
async fn switching_moves_the_session() {
    let a = Arc::new(Recording::new(BackendType::Local).with(USER_KEY, json!({"uid": "u1"})));
    let b = Arc::new(Recording::new(BackendType::Session));
    let mut store = SessionStore::<User>::create(coords(), vec![shared(&a)]).await;

    store.set_persistence(shared(&b)).await.unwrap();

    assert_eq!(store.backend_type(), BackendType::Session);
    assert_eq!(a.peek(USER_KEY), None);
    assert_eq!(b.peek(USER_KEY), Some(json!({"uid": "u1"})));
    assert_eq!(store.current_user().await.unwrap(), Some(User::new("u1")));
    assert_eq!(
        a.calls(),
        vec![
            Call::Get(USER_KEY.into()),
            Call::Get(USER_KEY.into()),
            Call::Remove(USER_KEY.into()),
        ]
    );
    assert_eq!(b.calls()[0], Call::Set(USER_KEY.into()));
}

#[tokio::test]
async fn switching_without_a_session_writes_nothing() {
    let b = Arc::new(Recording::new(BackendType::Session));
    let mut store = SessionStore::<User>::create(coords(), Vec::new()).await;

    store.set_persistence(shared(&b)).await.unwrap();

    assert_eq!(store.backend_type(), BackendType::Session);
    assert!(b.calls().is_empty());
}

#[tokio::test]
async fn failed_removal_keeps_old_backend_active() {
    let mut a = Recording::new(BackendType::Local).with(USER_KEY, json!({"uid": "u1"}));
    a.fail_remove = true;
    let a = Arc::new(a);
    let b = Arc::new(Recording::new(BackendType::Session));
    let mut store = SessionStore::<User>::create(coords(), vec![shared(&a)]).await;

    let err = store.set_persistence(shared(&b)).await.unwrap_err();

    assert!(err.is_unavailable());
    assert_eq!(store.backend_type(), BackendType::Local);
    assert_eq!(a.peek(USER_KEY), Some(json!({"uid": "u1"})));
    assert!(b.calls().is_empty());
}

#[tokio::test]
async fn failed_write_after_switch_is_reported() {
    let a = Arc::new(Recording::new(BackendType::Local).with(USER_KEY, json!({"uid": "u1"})));
    let mut b = Recording::new(BackendType::Session);
    b.fail_set = true;
    let b = Arc::new(b);
    let mut store = SessionStore::<User>::create(coords(), vec![shared(&a)]).await;

    let err = store.set_persistence(shared(&b)).await.unwrap_err();

    assert!(err.is_unavailable());
    assert_eq!(store.backend_type(), BackendType::Session);
    assert_eq!(a.peek(USER_KEY), None);
}

#[tokio::test]
async fn migration_survives_reresolution_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let local_path = dir.path().join("local.json");
    let session_path = dir.path().join("session.json");
    let hierarchy = || -> Vec<SharedPersistence> {
        let local: SharedPersistence = Arc::new(FilePersistence::local(&local_path));
        let session: SharedPersistence = Arc::new(FilePersistence::session(&session_path));
        vec![local, session]
    };

    let mut store = SessionStore::<User>::create(coords(), hierarchy()).await;
    assert_eq!(store.backend_type(), BackendType::None);
    store.set_persistence(hierarchy().remove(0)).await.unwrap();
    store.set_current_user(&User::new("u1")).await.unwrap();
    store.set_persistence(hierarchy().remove(1)).await.unwrap();

    let reopened = SessionStore::<User>::create(coords(), hierarchy()).await;
    assert_eq!(reopened.backend_type(), BackendType::Session);
    assert_eq!(reopened.current_user().await.unwrap(), Some(User::new("u1")));
}
