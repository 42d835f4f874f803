//! Session state holder
//!
//! The session is owned by the application context rather than living in a
//! global. [`channel`] hands out exactly one [`SessionWriter`], which the
//! account service keeps, and any number of [`SessionReader`]s for the
//! presentation layer. Readers observe updates through a `tokio::sync::watch`
//! channel and can never mutate the state.

use tokio::sync::watch;

use crate::models::{ProfileName, SessionSnapshot, SessionState, SignedInUser};

/// Create a fresh signed-out session
pub fn channel() -> (SessionWriter, SessionReader) {
    let (tx, rx) = watch::channel(SessionSnapshot::default());
    (SessionWriter { tx }, SessionReader { rx })
}

/// Exclusive write handle to the session.
///
/// Deliberately not `Clone`: only the account service mutates the session.
#[derive(Debug)]
pub struct SessionWriter {
    tx: watch::Sender<SessionSnapshot>,
}

impl SessionWriter {
    /// Current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    /// The signed-in user, if any
    pub fn signed_in_user(&self) -> Option<SignedInUser> {
        self.tx.borrow().user().cloned()
    }

    /// New read-only subscription
    pub fn subscribe(&self) -> SessionReader {
        SessionReader {
            rx: self.tx.subscribe(),
        }
    }

    pub fn sign_in(&self, user: SignedInUser) {
        self.tx.send_modify(|s| s.state = SessionState::SignedIn(user));
    }

    pub fn sign_out(&self) {
        self.tx.send_modify(|s| s.state = SessionState::SignedOut);
    }

    /// Replace the displayed name of the signed-in user.
    ///
    /// No-op when signed out.
    pub fn update_name(&self, name: ProfileName) {
        self.tx.send_if_modified(|s| match &mut s.state {
            SessionState::SignedIn(user) => {
                user.name = name;
                true
            }
            SessionState::SignedOut => false,
        });
    }

    pub fn set_loading(&self, loading: bool) {
        self.tx.send_if_modified(|s| {
            if s.loading == loading {
                return false;
            }
            s.loading = loading;
            true
        });
    }
}

/// Read-only subscription to the session
#[derive(Debug, Clone)]
pub struct SessionReader {
    rx: watch::Receiver<SessionSnapshot>,
}

impl SessionReader {
    /// Current snapshot
    pub fn current(&self) -> SessionSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return the new snapshot.
    ///
    /// Returns `None` once the writer has been dropped.
    pub async fn changed(&mut self) -> Option<SessionSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
