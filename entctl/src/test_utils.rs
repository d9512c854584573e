//! Test utilities: in-memory identity and owner collaborators plus a test
//! server factory (available with the `test-utils` feature).
//!
//! The in-memory adapter counts calls per method so tests can assert not just
//! outcomes but how the pipeline reached them (e.g. "the role lookup ran
//! exactly once").

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::Utc;
use uuid::Uuid;

use crate::api::models::pagination::PageRequest;
use crate::auth::principal::Role;
use crate::config::Config;
use crate::errors::Error;
use crate::identity::{IdentityAdapter, IdentityError, Owner, OwnerCurator, UserRecord};
use crate::{AppState, build_router, requirement_registry};

#[derive(Clone)]
struct StoredUser {
    password: String,
    roles: Vec<Role>,
}

/// In-memory [`IdentityAdapter`] with per-method call counters.
#[derive(Default)]
pub struct MemoryIdentityAdapter {
    users: Mutex<HashMap<String, StoredUser>>,
    tokens: Mutex<HashMap<String, String>>,
    find_by_login_calls: AtomicUsize,
    validate_user_calls: AtomicUsize,
    find_by_token_calls: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryIdentityAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, username: &str, password: &str, roles: Vec<Role>) {
        self.users.lock().unwrap().insert(
            username.to_string(),
            StoredUser {
                password: password.to_string(),
                roles,
            },
        );
    }

    pub fn add_token(&self, secret: &str, username: &str) {
        self.tokens.lock().unwrap().insert(secret.to_string(), username.to_string());
    }

    /// Make every subsequent call fail, simulating an unreachable store.
    pub fn fail_lookups(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn find_by_login_calls(&self) -> usize {
        self.find_by_login_calls.load(Ordering::SeqCst)
    }

    pub fn validate_user_calls(&self) -> usize {
        self.validate_user_calls.load(Ordering::SeqCst)
    }

    pub fn find_by_token_calls(&self) -> usize {
        self.find_by_token_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), IdentityError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(IdentityError(anyhow::anyhow!("identity store unavailable")))
        } else {
            Ok(())
        }
    }

    fn record(&self, username: &str) -> Option<UserRecord> {
        self.users.lock().unwrap().get(username).map(|stored| UserRecord {
            username: username.to_string(),
            roles: stored.roles.clone(),
        })
    }
}

#[async_trait]
impl IdentityAdapter for MemoryIdentityAdapter {
    async fn find_by_login(&self, username: &str) -> Result<Option<UserRecord>, IdentityError> {
        self.find_by_login_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.record(username))
    }

    async fn validate_user(&self, username: &str, password: &str) -> Result<bool, IdentityError> {
        self.validate_user_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(username)
            .is_some_and(|stored| stored.password == password))
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<UserRecord>, IdentityError> {
        self.find_by_token_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let username = self.tokens.lock().unwrap().get(token).cloned();
        Ok(username.and_then(|username| self.record(&username)))
    }
}

/// In-memory [`OwnerCurator`] mirroring the SQL curator's sorting and slicing
/// behavior, including its sortable-column whitelist.
#[derive(Default)]
pub struct MemoryOwnerCurator {
    owners: Mutex<Vec<Owner>>,
}

impl MemoryOwnerCurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_owner(&self, key: &str, display_name: &str) {
        self.owners.lock().unwrap().push(Owner {
            id: Uuid::new_v4(),
            key: key.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl OwnerCurator for MemoryOwnerCurator {
    async fn list(&self, page: Option<&PageRequest>) -> crate::errors::Result<Vec<Owner>> {
        let mut owners = self.owners.lock().unwrap().clone();

        if let Some(page) = page {
            if let Some(sort_by) = page.sort_by.as_deref() {
                match sort_by {
                    "key" => owners.sort_by(|a, b| a.key.cmp(&b.key)),
                    "display_name" => owners.sort_by(|a, b| a.display_name.cmp(&b.display_name)),
                    "created_at" => owners.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
                    other => {
                        return Err(Error::BadRequest {
                            message: format!("sort_by must be one of: key, display_name, created_at (got {other})"),
                        });
                    }
                }
                if page.order == crate::api::models::pagination::Order::Descending {
                    owners.reverse();
                }
            } else if page.paging {
                owners.sort_by(|a, b| a.key.cmp(&b.key));
            }
            if let (Some(offset), Some(limit)) = (page.offset(), page.limit()) {
                owners = owners.into_iter().skip(offset as usize).take(limit as usize).collect();
            }
        }

        Ok(owners)
    }

    async fn get(&self, key: &str) -> crate::errors::Result<Option<Owner>> {
        Ok(self.owners.lock().unwrap().iter().find(|o| o.key == key).cloned())
    }
}

/// A config with every strategy enabled, suitable for pipeline tests.
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.auth.trusted_header.enabled = true;
    config.auth.client_cert.enabled = true;
    config
}

/// Build a test server over in-memory collaborators.
///
/// Returns the server plus the collaborators so tests can seed data and
/// inspect call counts.
pub fn create_test_app(config: Config) -> (TestServer, Arc<MemoryIdentityAdapter>, Arc<MemoryOwnerCurator>) {
    let identity = Arc::new(MemoryIdentityAdapter::new());
    let owners = Arc::new(MemoryOwnerCurator::new());

    let state = AppState::builder()
        .config(config)
        .identity(identity.clone())
        .owners(owners.clone())
        .registry(Arc::new(requirement_registry()))
        .build();

    let server = TestServer::new(build_router(state)).expect("Failed to create test server");
    (server, identity, owners)
}
