use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use super::{EventStore, RevocationStore, TicketStore, UserStore};
use crate::models::{
    CancelOutcome, DeleteOutcome, Event, EventFilter, EventUpdate, NewEvent, NewTicket, NewUser, Page,
    RevokedToken, Role, SalesTotals, Ticket, TicketFilter, TicketUpdate, User,
};
use crate::utils::error::{conflict_on_foreign_key, conflict_on_unique, AppError};

const DUPLICATE_EVENT_NAME: &str = "event name must be unique";
const DUPLICATE_USERNAME: &str = "username is already taken";
const TICKETS_EXIST: &str = "event cannot be deleted because tickets were already sold";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| AppError::InternalServerError(format!("migration failed: {e}")))
    }
}

fn push_event_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    qb.push(" WHERE TRUE");
    if let Some(name) = &filter.name {
        qb.push(" AND name ILIKE ").push_bind(format!("%{name}%"));
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(after) = filter.starts_after {
        qb.push(" AND start_date >= ").push_bind(after);
    }
    if let Some(before) = filter.starts_before {
        qb.push(" AND start_date <= ").push_bind(before);
    }
    if let Some(min) = filter.min_capacity {
        qb.push(" AND capacity >= ").push_bind(min);
    }
}

fn push_ticket_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TicketFilter) {
    qb.push(" WHERE TRUE");
    if let Some(event_id) = filter.event_id {
        qb.push(" AND event_id = ").push_bind(event_id);
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(after) = filter.created_after {
        qb.push(" AND created_at >= ").push_bind(after);
    }
    if let Some(before) = filter.created_before {
        qb.push(" AND created_at <= ").push_bind(before);
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn insert(&self, event: NewEvent) -> Result<Event, AppError> {
        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (name, description, start_date, end_date, capacity, total_capacity, price, status)
            VALUES ($1, $2, $3, $4, $5, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.capacity)
        .bind(event.price)
        .bind(event.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_EVENT_NAME))
    }

    async fn find(&self, id: i64) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list(&self, filter: &EventFilter, page: Page) -> Result<(Vec<Event>, i64), AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events");
        push_event_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM events");
        push_event_filters(&mut select, filter);
        select
            .push(" ORDER BY id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let events = select
            .build_query_as::<Event>()
            .fetch_all(&self.pool)
            .await?;

        Ok((events, total))
    }

    async fn update(&self, id: i64, update: EventUpdate) -> Result<Option<Event>, AppError> {
        // Capacity moves relative to the stored row so a booking that lands
        // between the caller's read and this write is not overwritten.
        sqlx::query_as::<_, Event>(
            r#"
            UPDATE events SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                start_date = COALESCE($4, start_date),
                end_date = COALESCE($5, end_date),
                capacity = capacity + (COALESCE($6, total_capacity) - total_capacity),
                total_capacity = COALESCE($6, total_capacity),
                price = COALESCE($7, price),
                status = COALESCE($8, status),
                updated_at = NOW()
            WHERE id = $1
              AND capacity + (COALESCE($6, total_capacity) - total_capacity) >= 0
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.start_date)
        .bind(update.end_date)
        .bind(update.capacity)
        .bind(update.price)
        .bind(update.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_EVENT_NAME))
    }

    async fn delete(&self, id: i64, now: DateTime<Utc>) -> Result<DeleteOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Same row lock `issue_ticket` takes, so a booking either committed
        // before this point or waits until the row is gone.
        let start_date: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT start_date FROM events WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(start_date) = start_date else {
            tx.rollback().await?;
            return Ok(DeleteOutcome::Missing);
        };
        if start_date <= now {
            tx.rollback().await?;
            return Ok(DeleteOutcome::Started);
        }

        let sold: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tickets WHERE event_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if sold {
            tx.rollback().await?;
            return Ok(DeleteOutcome::HasTickets);
        }

        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_on_foreign_key(e, TICKETS_EXIST))?;
        tx.commit().await?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn is_name_unique(&self, name: &str, exclude_id: Option<i64>) -> Result<bool, AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM events WHERE name = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(!taken)
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn issue_ticket(&self, ticket: NewTicket) -> Result<Option<Ticket>, AppError> {
        let mut tx = self.pool.begin().await?;

        let decremented = sqlx::query(
            r#"
            UPDATE events
            SET capacity = capacity - $2, updated_at = NOW()
            WHERE id = $1 AND capacity >= $2
            "#,
        )
        .bind(ticket.event_id)
        .bind(ticket.quantity)
        .execute(&mut *tx)
        .await?;

        if decremented.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let issued = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (event_id, user_id, quantity, price, status)
            VALUES ($1, $2, $3, $4, 'purchased')
            RETURNING *
            "#,
        )
        .bind(ticket.event_id)
        .bind(ticket.user_id)
        .bind(ticket.quantity)
        .bind(ticket.price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(issued))
    }

    async fn cancel_ticket(&self, id: i64) -> Result<CancelOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let cancelled = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = 'purchased'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(ticket) = cancelled else {
            tx.rollback().await?;
            return Ok(CancelOutcome::NotPurchased);
        };

        let restored = sqlx::query(
            "UPDATE events SET capacity = capacity + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(ticket.event_id)
        .bind(ticket.quantity)
        .execute(&mut *tx)
        .await?;

        if restored.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CancelOutcome::EventMissing);
        }

        tx.commit().await?;
        Ok(CancelOutcome::Cancelled(ticket))
    }

    async fn find(&self, id: i64) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn update_purchased(
        &self,
        id: i64,
        update: TicketUpdate,
    ) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET user_id = COALESCE($2, user_id), updated_at = NOW()
            WHERE id = $1 AND status = 'purchased'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn list(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> Result<(Vec<Ticket>, i64), AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tickets");
        push_ticket_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM tickets");
        push_ticket_filters(&mut select, filter);
        select
            .push(" ORDER BY id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let tickets = select
            .build_query_as::<Ticket>()
            .fetch_all(&self.pool)
            .await?;

        Ok((tickets, total))
    }

    async fn any_for_event(&self, event_id: i64) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tickets WHERE event_id = $1)")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn sales_totals(&self, event_id: Option<i64>) -> Result<SalesTotals, AppError> {
        let (total_tickets_sold, total_quantity, total_revenue): (i64, i64, Decimal) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(quantity), 0)::BIGINT,
                    COALESCE(SUM(price), 0)
                FROM tickets
                WHERE status = 'purchased' AND ($1::BIGINT IS NULL OR event_id = $1)
                "#,
            )
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(SalesTotals {
            total_tickets_sold,
            total_quantity,
            total_revenue,
        })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_USERNAME))
    }

    async fn find(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl RevocationStore for PgStore {
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO revoked_tokens (token, expires_at) VALUES ($1, $2) ON CONFLICT (token) DO NOTHING",
        )
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_revoked(&self, token: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let revoked = sqlx::query_as::<_, RevokedToken>(
            "SELECT token, expires_at FROM revoked_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(revoked.is_some_and(|entry| entry.is_live(now)))
    }
}
