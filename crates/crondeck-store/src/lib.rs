//! `crondeck-store`: SQLite persistence for task definitions and run history.
//!
//! Two logical tables share one database file:
//!
//! | Table     | Key                     | Semantics                         |
//! |-----------|-------------------------|-----------------------------------|
//! | `tasks`   | `name`                  | full-replace upsert per task      |
//! | `history` | `id` (autoincrement)    | append-only, pruned per task      |

pub mod db;
pub mod error;
pub mod history;
pub mod tasks;

pub use error::{Result, StoreError};
pub use history::HistoryStore;
pub use tasks::TaskStore;
