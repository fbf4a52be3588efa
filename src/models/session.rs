//! Learning session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One study sitting, from start to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningSession {
    /// Session id.
    pub id: i64,
    /// Strategy active when the session started (`bfs` or `dfs`).
    pub strategy: String,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time, `None` while running.
    pub ended_at: Option<DateTime<Utc>>,
    /// Items viewed during the session.
    pub viewed_count: i64,
    /// Items marked learned during the session.
    pub learned_count: i64,
}

impl LearningSession {
    /// Returns `true` until the session is ended.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}
