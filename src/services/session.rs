//! Learning sessions and per-item view accounting.

use super::bookmark::apply_stats_delta;
use crate::cancel::CancellationToken;
use crate::models::LearningSession;
use crate::navigation::StrategyKind;
use crate::storage::Database;
use crate::storage::sqlite::{bookmark_row, session_row};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;

/// Service for learning sessions.
pub struct SessionService {
    db: Arc<Database>,
}

impl SessionService {
    /// Creates a session service over `db`.
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Starts a session with the given initial strategy.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn start_session(&self, strategy: StrategyKind) -> Result<LearningSession> {
        self.start_session_with_cancel(strategy, &CancellationToken::new())
    }

    /// [`start_session`](Self::start_session) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`start_session`](Self::start_session); also
    /// [`Error::Cancelled`].
    pub fn start_session_with_cancel(
        &self,
        strategy: StrategyKind,
        cancel: &CancellationToken,
    ) -> Result<LearningSession> {
        let session = self
            .db
            .transaction("start_session", cancel, |tx| {
                let id = session_row::insert(tx, strategy.as_str(), Utc::now())?;
                load(tx, id)
            })?;
        tracing::info!(session_id = session.id, strategy = %strategy, "Started learning session");
        Ok(session)
    }

    /// Ends a running session, recording how many items were viewed and
    /// learned. Every bookmark whose URN is in `viewed` gets one more study
    /// session; URNs without a bookmark are counted but otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown session,
    /// [`Error::InvalidInput`] if it already ended, or a store error.
    pub fn end_session(
        &self,
        id: i64,
        viewed: &[String],
        learned: &[String],
    ) -> Result<LearningSession> {
        self.end_session_with_cancel(id, viewed, learned, &CancellationToken::new())
    }

    /// [`end_session`](Self::end_session) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`end_session`](Self::end_session); also [`Error::Cancelled`].
    pub fn end_session_with_cancel(
        &self,
        id: i64,
        viewed: &[String],
        learned: &[String],
        cancel: &CancellationToken,
    ) -> Result<LearningSession> {
        let viewed_count = i64::try_from(viewed.len()).unwrap_or(i64::MAX);
        let learned_count = i64::try_from(learned.len()).unwrap_or(i64::MAX);

        let (session, studied) = self.db.transaction("end_session", cancel, |tx| {
            let now = Utc::now();
            if !session_row::finish(tx, id, viewed_count, learned_count, now)? {
                let existing = load(tx, id)?;
                return Err(Error::InvalidInput(format!(
                    "learning session {} already ended",
                    existing.id
                )));
            }

            let bookmarks = bookmark_row::active_ids_by_urn(tx, viewed)?;
            for bookmark_id in &bookmarks {
                apply_stats_delta(tx, *bookmark_id, 0, 1, now)?;
            }
            Ok((load(tx, id)?, bookmarks.len()))
        })?;

        tracing::info!(
            session_id = id,
            viewed = viewed_count,
            learned = learned_count,
            bookmarks = studied,
            "Ended learning session"
        );
        Ok(session)
    }

    /// Fetches a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown session.
    pub fn get_session(&self, id: i64) -> Result<LearningSession> {
        self.db.read("get_session", |conn| load(conn, id))
    }

    /// Counts one view on every bookmark with the given URN and returns how
    /// many bookmarks were touched.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn record_view(&self, urn: &str) -> Result<usize> {
        self.record_view_with_cancel(urn, &CancellationToken::new())
    }

    /// [`record_view`](Self::record_view) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`record_view`](Self::record_view); also [`Error::Cancelled`].
    pub fn record_view_with_cancel(&self, urn: &str, cancel: &CancellationToken) -> Result<usize> {
        let touched = self
            .db
            .transaction("record_view", cancel, |tx| {
                let bookmarks = bookmark_row::active_ids_by_urn(tx, &[urn.to_string()])?;
                let now = Utc::now();
                for bookmark_id in &bookmarks {
                    apply_stats_delta(tx, *bookmark_id, 1, 0, now)?;
                }
                Ok(bookmarks.len())
            })?;
        tracing::debug!(urn, touched, "Recorded view");
        Ok(touched)
    }
}

fn load(conn: &rusqlite::Connection, id: i64) -> Result<LearningSession> {
    session_row::fetch(conn, id)?.ok_or_else(|| Error::not_found("learning_session", id))
}
