//! Location references handed back to API callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TaskId;

/// Where to find a resource (`{"href": "..."}` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }

    /// `base` extended by `segments`, always ending in `/`.
    pub fn child(base: &str, segments: &[&str]) -> Self {
        let mut href = base.trim_end_matches('/').to_string();
        for segment in segments {
            href.push('/');
            href.push_str(segment.trim_matches('/'));
        }
        href.push('/');
        Self { href }
    }

    /// Status link of a task.
    pub fn task(task_id: TaskId) -> Self {
        Self::child("/v2/tasks", &[&task_id.to_string()])
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href)
    }
}
