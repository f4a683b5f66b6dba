// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::TokenVerifier;
use crate::config::Settings;
use crate::objectstore::ObjectStore;

/// Shared application state.
///
/// Database, object storage and token verification are each optional: the
/// service starts without them and the affected endpoints degrade the way
/// the health endpoint reports (best-effort audit logging, 500 on storage
/// operations, fail-closed auth).
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: Option<PgPool>,
    pub objects: Option<ObjectStore>,
    pub verifier: Option<Arc<TokenVerifier>>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            db: None,
            objects: None,
            verifier: None,
        }
    }

    pub fn with_db(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }

    pub fn with_object_store(mut self, store: ObjectStore) -> Self {
        self.objects = Some(store);
        self
    }

    pub fn with_verifier(mut self, verifier: TokenVerifier) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }
}
