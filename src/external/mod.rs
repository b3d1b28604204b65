//! Outbound collaborators: Microsoft Graph (mail/Teams/files), GitHub, and
//! the document-library abstraction built on top of Graph.

pub mod file_store;
pub mod github;
pub mod graph;
