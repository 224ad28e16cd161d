//! PostgreSQL implementation of `ParticipantView`

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use chat_core::{ConversationId, LookupResult, ParticipantView, UserId};

use super::error::map_db_error;

/// Reads conversation membership from `conversation_participants`
#[derive(Clone)]
pub struct PgParticipantView {
    pool: PgPool,
}

impl PgParticipantView {
    /// Create a new `PgParticipantView`
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantView for PgParticipantView {
    #[instrument(skip(self))]
    async fn get(
        &self,
        conversation: ConversationId,
        exclude: Option<UserId>,
    ) -> LookupResult<Vec<UserId>> {
        let rows = sqlx::query_scalar::<_, i64>(
            r"
            SELECT user_id
            FROM conversation_participants
            WHERE conversation_id = $1
              AND ($2::BIGINT IS NULL OR user_id <> $2)
            ORDER BY user_id
            ",
        )
        .bind(conversation.into_inner())
        .bind(exclude.map(UserId::into_inner))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().map(UserId::new).collect())
    }
}
