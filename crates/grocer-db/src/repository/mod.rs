//! # Repository Module
//!
//! Database repository implementations for GreenGrocer.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  SqliteLedger / seed tool / owner console                               │
//! │       │                                                                 │
//! │       │  db.orders().claim("o-1", "carrier-a")                          │
//! │       ▼                                                                 │
//! │  OrderRepository                                                        │
//! │  ├── insert(&self, order)                                               │
//! │  ├── claim / cancel / complete (guarded UPDATEs)                        │
//! │  └── list_by_status / list_for_customer / list_for_carrier              │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  SQL stays in one place per table; callers see domain types.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog and stock
//! - [`OrderRepository`](order::OrderRepository) - Orders and transitions
//! - [`CouponRepository`](coupon::CouponRepository) - Coupons and assignment
//! - [`CustomerRepository`](customer::CustomerRepository) - Loyalty counters and settings
//! - [`MessageRepository`](message::MessageRepository) - Notification inboxes
//! - [`RatingRepository`](rating::RatingRepository) - Carrier ratings

pub mod coupon;
pub mod customer;
pub mod message;
pub mod order;
pub mod product;
pub mod rating;
