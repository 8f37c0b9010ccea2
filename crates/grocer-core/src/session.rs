//! # Sessions and Cart Store
//!
//! Explicit context passed to operations instead of process-wide globals.
//!
//! ## Thread Safety
//! The store is an `Arc<Mutex<HashMap>>`: many sessions run concurrently,
//! and each cart operation holds the lock only for the closure it runs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Session { session_id, user_id, role }                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CartStore ── session_id ──► Cart                                       │
//! │     with_cart_mut()   add / remove / set_quantity                       │
//! │     snapshot()        cart handed to checkout                           │
//! │     clear()           customer empties the cart                         │
//! │     end_session()     logout drops the cart                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Carrier,
    Owner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => f.write_str("customer"),
            Role::Carrier => f.write_str("carrier"),
            Role::Owner => f.write_str("owner"),
        }
    }
}

/// The signed-in user of one window or request stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub role: Role,
}

impl Session {
    /// Opens a session with a fresh id.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Session {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            role,
        }
    }

    pub fn require_role(&self, role: Role) -> Result<(), ValidationError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ValidationError::WrongRole {
                required: role.to_string(),
            })
        }
    }
}

/// Carts keyed by session id.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    carts: Arc<Mutex<HashMap<String, Cart>>>,
}

impl CartStore {
    pub fn new() -> Self {
        CartStore::default()
    }

    /// Runs `f` on the session's cart (an empty one if it has none yet).
    pub fn with_cart<F, R>(&self, session_id: &str, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let carts = self.carts.lock();
        match carts.get(session_id) {
            Some(cart) => f(cart),
            None => f(&Cart::new()),
        }
    }

    /// Runs `f` on the session's cart, creating it on first use.
    pub fn with_cart_mut<F, R>(&self, session_id: &str, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut carts = self.carts.lock();
        f(carts.entry(session_id.to_string()).or_default())
    }

    /// Copy of the session's cart.
    pub fn snapshot(&self, session_id: &str) -> Cart {
        self.with_cart(session_id, Cart::clone)
    }

    pub fn clear(&self, session_id: &str) {
        if let Some(cart) = self.carts.lock().get_mut(session_id) {
            cart.clear();
        }
    }

    /// Logout: the cart is dropped with the session.
    pub fn end_session(&self, session_id: &str) {
        self.carts.lock().remove(session_id);
    }

    /// Number of sessions holding a cart.
    pub fn len(&self) -> usize {
        self.carts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.lock().is_empty()
    }
}
