//! Object storage for Ledgerbox transaction files.
//!
//! Account and transaction services store uploaded statements as objects in
//! per-account buckets. They depend on the [`BucketClient`] capability only;
//! this crate provides two implementations of it:
//!
//! - [`S3BucketClient`]: Amazon S3 or any S3-compatible service, with
//!   per-call deadlines, confirmation polling, multipart upload and ranged
//!   download.
//! - [`MemoryBucketClient`]: an in-memory store with the same error
//!   behavior, for tests.
//!
//! Every operation takes a [`Context`](ledgerbox_core::Context) and is bounded
//! by the tighter of the caller's deadline and the client's own timeout.

pub mod body;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod s3;
pub mod wait;

pub use body::{ObjectBody, ObjectReader, WriteAt};
pub use client::BucketClient;
pub use config::StorageConfig;
pub use error::{ErrorKind, Operation, StorageError, StorageResult};
pub use memory::MemoryBucketClient;
pub use s3::S3BucketClient;
