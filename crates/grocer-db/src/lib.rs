//! # grocer-db: SQLite Ledger for GreenGrocer
//!
//! Durable storage for the order core. It uses SQLite with sqlx for async
//! operations and implements the core's [`Ledger`](grocer_core::Ledger) and
//! [`Notifier`](grocer_core::Notifier) ports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        GreenGrocer Data Flow                            │
//! │                                                                         │
//! │  Service / UI (checkout, claim, complete, cancel)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  grocer-core::OrderLifecycle                                            │
//! │       │ Arc<dyn Ledger>            │ Arc<dyn Notifier>                  │
//! │       ▼                            ▼                                    │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     grocer-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │ product/order │    │  (embedded)  │   │   │
//! │  │   │               │    │ coupon/...    │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ SqliteLedger  │    │ 001_initial  │   │   │
//! │  │   │ WAL, busy_to  │    │ MessageNotif. │    │ 002_ratings  │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 SQLite Database (grocer.db)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, order, coupon, rating, ...)
//! - [`ledger`] - `SqliteLedger`, the core's ledger over the repositories
//! - [`notifier`] - `MessageNotifier`, notices into inboxes
//! - [`settings`] - Settings file and environment overrides
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use grocer_core::{OrderLifecycle, SystemClock};
//! use grocer_db::{Database, MessageNotifier, Settings};
//!
//! let settings = Settings::load()?;
//! let db = Database::new(settings.db_config()).await?;
//!
//! let lifecycle = OrderLifecycle::new(
//!     Arc::new(db.ledger()),
//!     Arc::new(MessageNotifier::new(db.messages())),
//!     Arc::new(SystemClock),
//!     settings.rules,
//! );
//! let pending = lifecycle.pending_orders().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod notifier;
pub mod pool;
pub mod repository;
pub mod settings;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ledger::SqliteLedger;
pub use notifier::MessageNotifier;
pub use pool::{Database, DbConfig};
pub use settings::{DatabaseSettings, Settings, SettingsError};

// Repository re-exports for convenience
pub use repository::coupon::CouponRepository;
pub use repository::customer::CustomerRepository;
pub use repository::message::{Message, MessageRepository};
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::rating::RatingRepository;
