//! Member record store
//!
//! [`MemberStore`] is the capability the pipeline writes members through.
//! [`PgMemberStore`] backs it with the `members` table; tests substitute an
//! in-memory implementation.

use anyhow::Context;
use async_trait::async_trait;
use roster_common::Member;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};

use super::update::{ConditionalUpdate, FieldAssignment, UpdateCondition};
use crate::error::{SyncError, SyncResult};

#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Insert the member, or overwrite every field of the existing one.
    async fn upsert(&self, member: &Member) -> SyncResult<()>;

    /// Apply the field writes atomically if the condition holds.
    ///
    /// Returns the updated member, or [`SyncError::ConditionFailed`] when no
    /// member matches. Never creates a member.
    async fn conditional_update(&self, update: ConditionalUpdate) -> SyncResult<Member>;

    /// Every stored member.
    async fn scan(&self) -> SyncResult<Vec<Member>>;

    /// Cheap connectivity check for health endpoints.
    async fn ping(&self) -> SyncResult<()> {
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    email: String,
    name: Option<String>,
    weight: Option<f64>,
    height: Option<f64>,
    notified: bool,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            email: row.email,
            name: row.name,
            weight: row.weight,
            height: row.height,
            notified: row.notified,
        }
    }
}

const MEMBER_COLUMNS: &str = "email, name, weight, height, notified";

#[derive(Clone)]
pub struct PgMemberStore {
    pool: PgPool,
}

impl PgMemberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberStore for PgMemberStore {
    #[instrument(skip(self, member), fields(email = %member.email))]
    async fn upsert(&self, member: &Member) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO members (email, name, weight, height, notified, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (email) DO UPDATE SET
                name = EXCLUDED.name,
                weight = EXCLUDED.weight,
                height = EXCLUDED.height,
                notified = EXCLUDED.notified,
                updated_at = NOW()
            "#,
        )
        .bind(&member.email)
        .bind(&member.name)
        .bind(member.weight)
        .bind(member.height)
        .bind(member.notified)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert member {}", member.email))?;

        debug!("Member upserted");
        Ok(())
    }

    #[instrument(skip(self, update), fields(email = %update.email))]
    async fn conditional_update(&self, update: ConditionalUpdate) -> SyncResult<Member> {
        if update.is_empty() {
            return Err(SyncError::Input(format!(
                "conditional update for {} sets no fields",
                update.email
            )));
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE members SET ");
        {
            let mut set = builder.separated(", ");
            for assignment in &update.assignments {
                set.push(format!("{} = ", assignment.column()));
                match *assignment {
                    FieldAssignment::Weight(value) | FieldAssignment::Height(value) => {
                        set.push_bind_unseparated(value);
                    }
                    FieldAssignment::Notified(value) => {
                        set.push_bind_unseparated(value);
                    }
                }
            }
            set.push("updated_at = NOW()");
        }

        match update.condition {
            UpdateCondition::KeyExists => {
                builder.push(" WHERE email = ");
                builder.push_bind(update.email.clone());
            }
        }
        builder.push(" RETURNING ");
        builder.push(MEMBER_COLUMNS);

        let row = builder
            .build_query_as::<MemberRow>()
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to update member {}", update.email))?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(SyncError::ConditionFailed(update.email)),
        }
    }

    #[instrument(skip(self))]
    async fn scan(&self) -> SyncResult<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT email, name, weight, height, notified FROM members ORDER BY email",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to scan members")?;

        debug!(count = rows.len(), "Members scanned");
        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn ping(&self) -> SyncResult<()> {
        super::health_check(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}
