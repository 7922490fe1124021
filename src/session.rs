//! Current account session
//!
//! The identity provider is external; this module only holds which account
//! is signed in and notifies watchers when that changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::models::AccountId;

/// A signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub account: AccountId,
    pub signed_in_at: DateTime<Utc>,
}

/// Shared holder of the current session
///
/// Cloning yields another handle to the same session.
#[derive(Debug, Clone)]
pub struct SessionProvider {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionProvider {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Provider with `account` already signed in
    pub fn signed_in(account: AccountId) -> Self {
        let provider = Self::new();
        provider.sign_in(account);
        provider
    }

    /// Signs `account` in, replacing any current session
    ///
    /// Signing in again with the current account keeps the session as is.
    pub fn sign_in(&self, account: AccountId) -> Session {
        let mut session = None;
        self.tx.send_if_modified(|current| match current {
            Some(existing) if existing.account == account => {
                session = Some(existing.clone());
                false
            }
            _ => {
                let fresh = Session {
                    account: account.clone(),
                    signed_in_at: Utc::now(),
                };
                session = Some(fresh.clone());
                *current = Some(fresh);
                true
            }
        });
        info!(account = %account, "Signed in");
        session.unwrap_or(Session {
            account,
            signed_in_at: Utc::now(),
        })
    }

    /// Clears the session; returns whether one existed
    pub fn sign_out(&self) -> bool {
        let had_session = self.tx.send_if_modified(|current| current.take().is_some());
        if had_session {
            info!("Signed out");
        }
        had_session
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn current_account(&self) -> Option<AccountId> {
        self.tx.borrow().as_ref().map(|s| s.account.clone())
    }

    /// Receiver notified on every sign-in or sign-out
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new()
    }
}
