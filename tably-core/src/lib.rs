//! # tably-core
//!
//! Core library for tably - a receipt bill-splitting tool.
//!
//! This library provides:
//! - The domain model for participants, line items, and settlements
//! - The assignment engine and settlement calculator
//! - The session state machine (Home → Capturing → Assigning → Reviewing)
//! - The SQLite history store and the recognizer HTTP client
//! - Configuration and logging infrastructure
//!
//! ## Example
//!
//! ```rust
//! use tably_core::{Session, RawLineItem};
//!
//! let mut session = Session::new();
//! session.start_capture();
//! session.complete_capture(vec![RawLineItem::default()]);
//!
//! let item_id = session.items()[0].id.clone();
//! session.toggle_item(&item_id, tably_core::DEFAULT_PARTICIPANT_ID);
//! session.finish_assigning();
//! let split = session.current_split();
//! assert_eq!(split.grand_total, split.subtotal);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use recognizer::RecognizerClient;
pub use session::{Session, Stage};
pub use settle::{compute_split, parse_amount, TipMode};
pub use types::*;

// Public modules
pub mod assign;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod recognizer;
pub mod session;
pub mod settle;
pub mod types;
