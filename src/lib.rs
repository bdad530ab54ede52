//! # docfetch
//!
//! Cancellable, sequential fetching of HTML/XML documents.
//!
//! ## Design Philosophy
//!
//! docfetch is designed to be:
//! - **Sequential** - One request per batch at a time, results in input order
//! - **Cancellable** - A shared deadline aborts every attached request at once
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Pluggable** - Transport and parser sit behind traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use docfetch::{CancellationContext, Credential, DocumentFetcher, FetchConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = DocumentFetcher::new(FetchConfig::default())?;
//!
//!     // Every request attached to this context is aborted after 60 seconds
//!     let context = CancellationContext::new(Credential::new().cookie("session", "abc"));
//!     context.arm(Duration::from_secs(60), || eprintln!("deadline reached"))?;
//!
//!     let outcome = fetcher
//!         .batch(vec!["https://example.com/a", "https://example.com/b"])
//!         .context(context.clone())
//!         .on_error(|e| eprintln!("skipped: {e}"))
//!         .run(|doc| {
//!             println!("{:?}", doc.title());
//!             Ok(())
//!         })
//!         .await;
//!
//!     context.cancel_arm();
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Shared deadline and abort bookkeeping for in-flight requests
pub mod context;
/// Parsed documents and the parser seam
pub mod document;
/// Error types
pub mod error;
/// Sequential batch fetching
pub mod fetch;
/// Item record normalization
pub mod item_json;
/// HTTP transport abstraction
pub mod transport;
/// Core types
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::FetchConfig;
pub use context::{AttachedRequest, CancellationContext};
pub use document::{Document, DocumentParser, HtmlDocumentParser};
pub use error::{
    ArmError, AttachError, Error, FetchError, ItemError, ParseError, ProcessorError, Result,
    SelectorError, TransportError,
};
pub use fetch::{Batch, DocumentFetcher};
pub use transport::{DocumentRequest, RawResponse, ReqwestTransport, ResponseType, Transport};
pub use types::{BatchOutcome, BatchStats, Credential, RequestId, UrlList};
