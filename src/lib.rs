//! Todo Service
//!
//! Minimal todo-list CRUD web service backed by DynamoDB and SQS. HTTP
//! verbs map directly onto store operations; create requests whose title
//! starts with the reserved `!` marker are redirected to the event queue
//! instead of being persisted. A queue worker listens for the `reset`
//! command and reloads the fixed seed set.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum)                 DynamoDB                   SQS
//! ┌──────────────┐           ┌──────────────┐          ┌──────────────┐
//! │ /api/todo    │──────────▶│ todos        │          │ todos-events │
//! │ /api/init    │           │ (id,title,   │          └──────────────┘
//! │ /api/queue   │           │  completed)  │              ▲      │
//! └──────────────┘           └──────────────┘              │      │
//!        │ "!title"                 ▲                 send │      │ poll
//!        └──────────────────────────┼──────────────────────┘      │
//!                                   │                             ▼
//!                            ┌──────────────┐           ┌──────────────┐
//!                            │ Bulk Reset   │◀──────────│ Queue Worker │
//!                            │ (seed set)   │  "reset"  └──────────────┘
//!                            └──────────────┘
//! ```
//!
//! Non-API GETs serve the page shell; the client bundle and its build
//! pipeline are external artifacts.

pub mod api;
pub mod config;
pub mod queue;
pub mod render;
pub mod reset;
pub mod store;
pub mod worker;

pub use api::{create_router, start_api_server, AppState, NOTIFY_MARKER};
pub use config::Config;
pub use queue::{EventQueue, MemoryQueue, QueueError, QueueMessage, SqsQueue};
pub use render::PageShell;
pub use reset::{seed_todos, ResetReport};
pub use store::{DynamoStore, MemoryStore, RecordStore, StoreError, TodoRecord};
pub use worker::{QueueWorker, RESET_COMMAND};
