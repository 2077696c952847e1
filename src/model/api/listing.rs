use std::fmt::Display;

use log::warn;
use serde::{Deserialize, Serialize};

use super::notice::Notice;

/// A list for display. If the store could not be read, the list is empty and
/// carries a warning instead of failing the whole request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<Notice>,
}

impl<T> Listing<T> {
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            warning: None,
        }
    }

    /// Degrade a failed read into an empty listing, logging the cause.
    pub fn degrade<E: Display>(result: Result<Vec<T>, E>, what: &str) -> Self {
        match result {
            Ok(items) => Self::complete(items),
            Err(e) => {
                warn!("Degraded read of {what}: {e}");
                Self {
                    items: Vec::new(),
                    warning: Some(Notice::warning(format!("Unable to load {what}."))),
                }
            }
        }
    }
}
