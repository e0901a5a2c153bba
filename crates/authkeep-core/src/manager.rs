//! Session store: resolves which backend holds the live session and keeps all
//! reads, writes and migrations pointed at that one backend.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ReviveError, Result};
use crate::key::{AppCoordinates, LogicalKey};
use crate::persistence::{BackendType, InMemoryPersistence, Persistence, SharedPersistence};
use crate::user::UserSnapshot;

/// Owns the active backend for one `(api_key, app_name)` pair.
///
/// Exactly one backend is active at a time. It is replaced only by
/// [`SessionStore::set_persistence`], which takes `&mut self`; callers that
/// share a store between tasks must wrap it in a lock.
pub struct SessionStore<U> {
    persistence: SharedPersistence,
    coordinates: AppCoordinates,
    _snapshot: PhantomData<fn() -> U>,
}

impl<U: UserSnapshot> SessionStore<U> {
    fn new(persistence: SharedPersistence, coordinates: AppCoordinates) -> Self {
        Self {
            persistence,
            coordinates,
            _snapshot: PhantomData,
        }
    }

    /// Resolve the active backend from a priority-ordered `hierarchy`.
    ///
    /// Backends are probed one at a time, in order; the first one holding a
    /// user becomes active and the rest are never touched. A probe that fails
    /// counts as a miss. With no hit (or an empty hierarchy) the store falls
    /// back to a fresh in-memory backend. A stored `null` is not a session.
    /// Resolution never writes.
    pub async fn create(coordinates: AppCoordinates, hierarchy: Vec<SharedPersistence>) -> Self {
        if hierarchy.is_empty() {
            return Self::new(Arc::new(InMemoryPersistence::new()), coordinates);
        }

        let key = coordinates.key(LogicalKey::AuthUser);
        for persistence in hierarchy {
            match persistence.get(&key).await {
                Ok(Some(raw)) if !raw.is_null() => {
                    tracing::debug!(backend = %persistence.backend_type(), %key, "resolved session backend");
                    return Self::new(persistence, coordinates);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        backend = %persistence.backend_type(),
                        error = %e,
                        "skipping unavailable backend during session resolution"
                    );
                }
            }
        }

        tracing::debug!(%key, "no stored session, falling back to in-memory backend");
        Self::new(Arc::new(InMemoryPersistence::new()), coordinates)
    }

    pub fn backend_type(&self) -> BackendType {
        self.persistence.backend_type()
    }

    pub fn persistence(&self) -> &SharedPersistence {
        &self.persistence
    }

    pub fn coordinates(&self) -> &AppCoordinates {
        &self.coordinates
    }

    fn full_key(&self, key: LogicalKey) -> String {
        self.coordinates.key(key)
    }

    pub async fn current_user(&self) -> Result<Option<U>> {
        self.current_user_with(U::revive).await
    }

    /// Read the current user with a caller-supplied reconstruction function.
    ///
    /// A stored JSON `null` reads as no user. A rejected value is reported as [`crate::StoreError::Deserialization`]
    /// and stays in storage.
    pub async fn current_user_with<T, F>(&self, revive: F) -> Result<Option<T>>
    where
        F: FnOnce(Value) -> Result<T, ReviveError>,
    {
        match self.persistence.get(&self.full_key(LogicalKey::AuthUser)).await? {
            Some(raw) if !raw.is_null() => Ok(Some(revive(raw)?)),
            _ => Ok(None),
        }
    }

    pub async fn set_current_user(&self, user: &U) -> Result<()> {
        self.persistence
            .set(&self.full_key(LogicalKey::AuthUser), user.to_stored()?)
            .await
    }

    pub async fn remove_current_user(&self) -> Result<()> {
        self.persistence
            .remove(&self.full_key(LogicalKey::AuthUser))
            .await
    }

    /// Record the active backend's type in that backend, so a later process
    /// (e.g. after a redirect round-trip) can find it again without running
    /// resolution. Read it back with [`redirect_persistence_type`].
    pub async fn save_persistence_for_redirect(&self) -> Result<()> {
        let backend_type = self.persistence.backend_type();
        self.persistence
            .set(
                &self.full_key(LogicalKey::Persistence),
                Value::String(backend_type.as_str().to_string()),
            )
            .await
    }

    pub async fn clear_redirect_marker(&self) -> Result<()> {
        self.persistence
            .remove(&self.full_key(LogicalKey::Persistence))
            .await
    }

    /// Move the live session to `new_persistence`.
    ///
    /// Does nothing when the new backend has the same type as the active one.
    /// Otherwise the user is read from the old backend, removed there, the
    /// active backend is swapped, and the user (if any) is written to the new
    /// one. Each step completes before the next starts. The sequence is not
    /// atomic: between the removal and the final write the session exists in
    /// neither backend. If the removal fails the switch is abandoned and the
    /// old backend stays active.
    pub async fn set_persistence(&mut self, new_persistence: SharedPersistence) -> Result<()> {
        let from = self.persistence.backend_type();
        let to = new_persistence.backend_type();
        if from == to {
            return Ok(());
        }

        let user_key = self.full_key(LogicalKey::AuthUser);
        let current = self
            .persistence
            .get(&user_key)
            .await?
            .filter(|raw| !raw.is_null());
        self.persistence.remove(&user_key).await?;

        self.persistence = new_persistence;
        tracing::debug!(%from, %to, carried_user = current.is_some(), "switched session backend");

        if let Some(raw) = current {
            if let Err(e) = self.persistence.set(&user_key, raw).await {
                tracing::warn!(%from, %to, error = %e, "session lost while migrating backends");
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Read the breadcrumb written by [`SessionStore::save_persistence_for_redirect`]
/// from `persistence`.
pub async fn redirect_persistence_type(
    persistence: &SharedPersistence,
    coordinates: &AppCoordinates,
) -> Result<Option<BackendType>> {
    let raw = persistence.get(&coordinates.key(LogicalKey::Persistence)).await?;
    match raw {
        Some(Value::String(name)) => Ok(Some(BackendType::from_name(&name))),
        Some(other) => Err(ReviveError::new(format!(
            "persistence marker is not a string: {other}"
        ))
        .into()),
        None => Ok(None),
    }
}
