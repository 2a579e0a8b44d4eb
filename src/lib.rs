//! # Licman
//!
//! A school license management server, usable both as a standalone binary and
//! as a library.
//!
//! Staff users authenticate against a credential store and receive short-lived
//! signed session tokens. License operations (assign, revoke, transfer, limit
//! changes) mutate a SQLite ledger and write one audit row per mutation in the
//! same transaction. A daily refresh job re-derives the school/user allocation
//! snapshot from the external collector's raw payload.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use licman::config::ServerConfig;
//! use licman::server::{AppState, create_router};
//! use licman::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/licman.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(
//!     Arc::new(store),
//!     ServerConfig::default(),
//!     b"jwt-secret".to_vec(),
//! ));
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod allocation;
pub mod auth;
pub mod config;
pub mod error;
pub mod license;
pub mod server;
pub mod store;
pub mod sync;
pub mod types;
