//! Remote-storage client for the auto-shorts pipeline.
//!
//! The pipeline reads sources from and publishes clips to a Drive-style
//! remote store. The [`StorageClient`] trait is the seam; [`DriveClient`]
//! is the Google Drive v3 REST implementation.

pub mod client;
pub mod error;

pub use client::{DriveClient, StorageClient, StoredFile, UploadRequest};
pub use error::{StorageError, StorageResult};
