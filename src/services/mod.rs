//! Collaborator-facing services: blob storage, sentiment, comment persistence.

pub mod azure_blob;
pub mod blob_store;
pub mod comment_store;
pub mod local_store;
pub mod sentiment;
pub mod signing;
