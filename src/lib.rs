//! Muninn — concurrent request-processing core with hot reload.
//!
//! The crate wires six pieces into one pipeline: a bounded request
//! queue with configurable backpressure, a fixed worker pool, a genuine
//! LRU response cache, a fair FIFO resource pool bounding backend
//! concurrency, a background growth-metrics updater, and a hot-reload
//! controller that can swap the entire pipeline at runtime while
//! preserving accumulated state and never dropping in-flight work.
//!
//! The text-generation backend and knowledge lookups are collaborators
//! behind the [`LanguageBackend`] and [`KnowledgeSource`] traits; the
//! core never couples to a concrete provider.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use muninn::{BackendError, Fact, LanguageBackend, Muninn};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl LanguageBackend for Echo {
//!     async fn generate(&self, prompt: &str, _context: &[Fact]) -> Result<String, BackendError> {
//!         Ok(format!("echo: {prompt}"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let gateway = Muninn::builder().backend(Arc::new(Echo)).build()?;
//!     let report = gateway.process("ping").await?;
//!     println!("{} ({}ms)", report.response, report.response_time_ms);
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod reload;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use backend::{Fact, KnowledgeSource, LanguageBackend};
pub use cache::{CacheConfig, ResponseCache};
pub use config::{PipelineConfig, SubmitMode};
pub use error::{BackendError, MuninnError, Result};
pub use gateway::{Muninn, MuninnBuilder};
pub use metrics::{GrowthConfig, MetricsSnapshot, SharedMetrics};
pub use pipeline::{Pipeline, RequestHandle, RequestOutcome};
pub use pool::{PoolGuard, PooledHandle, ResourcePool};
pub use reload::{ChangeEvent, ChangeKind, PipelineFactory, ReloadConfig, ReloadState};
pub use types::{ProcessReport, ResponseSource, SystemInfo};
