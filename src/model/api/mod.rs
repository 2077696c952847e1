//! API-friendly types: request bodies and the view models handed to clients.
//!
//! IDs are plain hex strings and datetimes are RFC 3339, never raw storage formats.

pub mod auth;
pub mod ballot;
pub mod candidate;
pub mod election;
pub mod listing;
pub mod notice;
pub mod registry;
pub mod results;
pub mod roll;
