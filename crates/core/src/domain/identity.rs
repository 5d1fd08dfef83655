// Caller identity for Job Store reads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who is reading a job.
///
/// Dispatch is a privileged internal operation and always reads as
/// [`Identity::System`]. Account identities only see jobs they own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    System,
    Account(String),
}

impl Identity {
    /// Whether this identity may read a job with the given owner
    pub fn can_read(&self, owner: Option<&str>) -> bool {
        match self {
            Identity::System => true,
            Identity::Account(name) => owner == Some(name.as_str()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::System => write!(f, "system"),
            Identity::Account(name) => write!(f, "account:{}", name),
        }
    }
}
