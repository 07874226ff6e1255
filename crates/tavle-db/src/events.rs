//! Event repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

use tavle_core::{
    apply_write_rules, ContactDetails, Error, Event, EventFilter, EventRepository, EventSource,
    EventStatus, OrganizerType, ProgramEntry, Result, UpsertEventRequest, UpsertOutcome,
};

/// Column list shared by every SELECT over the event table.
const EVENT_COLUMNS: &str = "id, title, slug, summary, content, program, \
     status, organizer_type, organizer_name, organizer_url, source, \
     start_at, start_time, end_time, registration_deadline, \
     location, room, floor, \
     show_price_capacity, price, capacity, show_cta, cta_text, cta_url, \
     show_program, show_share, calendar_enabled, \
     image_url, image_path, logo_url, logo_path, \
     contact_name, contact_email, contact_phone, contact_org, \
     published_once, lock_uid, lock_name, lock_email, lock_at, \
     created_at, updated_at";

/// PostgreSQL implementation of EventRepository.
#[derive(Clone)]
pub struct PgEventRepository {
    pool: Pool<Postgres>,
}

impl PgEventRepository {
    /// Create a new PgEventRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Map a database row to an Event. Unknown enum strings fall back to the
/// field default rather than failing the whole read.
pub(crate) fn map_row_to_event(row: sqlx::postgres::PgRow) -> Event {
    let program: serde_json::Value = row.get("program");
    let program: Vec<ProgramEntry> = serde_json::from_value(program).unwrap_or_default();

    let status: String = row.get("status");
    let organizer_type: String = row.get("organizer_type");
    let source: String = row.get("source");

    let lock = match (
        row.get::<Option<String>, _>("lock_uid"),
        row.get::<Option<DateTime<Utc>>, _>("lock_at"),
    ) {
        (Some(uid), Some(at)) => Some(tavle_core::EditLock {
            uid,
            name: row.get::<Option<String>, _>("lock_name").unwrap_or_default(),
            email: row
                .get::<Option<String>, _>("lock_email")
                .unwrap_or_default(),
            at,
        }),
        _ => None,
    };

    Event {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        summary: row.get("summary"),
        content: row.get("content"),
        program,
        status: EventStatus::parse(&status).unwrap_or_default(),
        organizer_type: OrganizerType::parse(&organizer_type).unwrap_or_default(),
        organizer_name: row.get("organizer_name"),
        organizer_url: row.get("organizer_url"),
        source: EventSource::parse(&source).unwrap_or_default(),
        start_at: row.get("start_at"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        registration_deadline: row.get("registration_deadline"),
        location: row.get("location"),
        room: row.get("room"),
        floor: row.get("floor"),
        show_price_capacity: row.get("show_price_capacity"),
        price: row.get("price"),
        capacity: row.get("capacity"),
        show_cta: row.get("show_cta"),
        cta_text: row.get("cta_text"),
        cta_url: row.get("cta_url"),
        show_program: row.get("show_program"),
        show_share: row.get("show_share"),
        calendar_enabled: row.get("calendar_enabled"),
        image_url: row.get("image_url"),
        image_path: row.get("image_path"),
        logo_url: row.get("logo_url"),
        logo_path: row.get("logo_path"),
        contact: ContactDetails {
            name: row.get("contact_name"),
            email: row.get("contact_email"),
            phone: row.get("contact_phone"),
            org: row.get("contact_org"),
        },
        published_once: row.get("published_once"),
        lock,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Write the full record state, creating or replacing by id. The caller
/// computes the state inside its own transaction.
async fn write_event(tx: &mut Transaction<'_, Postgres>, event: &Event) -> Result<()> {
    let program = serde_json::to_value(&event.program)?;
    let (lock_uid, lock_name, lock_email, lock_at) = match &event.lock {
        Some(l) => (
            Some(l.uid.clone()),
            Some(l.name.clone()),
            Some(l.email.clone()),
            Some(l.at),
        ),
        None => (None, None, None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO event (
            id, title, slug, summary, content, program,
            status, organizer_type, organizer_name, organizer_url, source,
            start_at, start_time, end_time, registration_deadline,
            location, room, floor,
            show_price_capacity, price, capacity, show_cta, cta_text, cta_url,
            show_program, show_share, calendar_enabled,
            image_url, image_path, logo_url, logo_path,
            contact_name, contact_email, contact_phone, contact_org,
            published_once, lock_uid, lock_name, lock_email, lock_at,
            created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6,
            $7, $8, $9, $10, $11,
            $12, $13, $14, $15,
            $16, $17, $18,
            $19, $20, $21, $22, $23, $24,
            $25, $26, $27,
            $28, $29, $30, $31,
            $32, $33, $34, $35,
            $36, $37, $38, $39, $40,
            $41, $42
        )
        ON CONFLICT (id) DO UPDATE SET
            title = EXCLUDED.title,
            slug = EXCLUDED.slug,
            summary = EXCLUDED.summary,
            content = EXCLUDED.content,
            program = EXCLUDED.program,
            status = EXCLUDED.status,
            organizer_type = EXCLUDED.organizer_type,
            organizer_name = EXCLUDED.organizer_name,
            organizer_url = EXCLUDED.organizer_url,
            source = EXCLUDED.source,
            start_at = EXCLUDED.start_at,
            start_time = EXCLUDED.start_time,
            end_time = EXCLUDED.end_time,
            registration_deadline = EXCLUDED.registration_deadline,
            location = EXCLUDED.location,
            room = EXCLUDED.room,
            floor = EXCLUDED.floor,
            show_price_capacity = EXCLUDED.show_price_capacity,
            price = EXCLUDED.price,
            capacity = EXCLUDED.capacity,
            show_cta = EXCLUDED.show_cta,
            cta_text = EXCLUDED.cta_text,
            cta_url = EXCLUDED.cta_url,
            show_program = EXCLUDED.show_program,
            show_share = EXCLUDED.show_share,
            calendar_enabled = EXCLUDED.calendar_enabled,
            image_url = EXCLUDED.image_url,
            image_path = EXCLUDED.image_path,
            logo_url = EXCLUDED.logo_url,
            logo_path = EXCLUDED.logo_path,
            contact_name = EXCLUDED.contact_name,
            contact_email = EXCLUDED.contact_email,
            contact_phone = EXCLUDED.contact_phone,
            contact_org = EXCLUDED.contact_org,
            published_once = EXCLUDED.published_once,
            lock_uid = EXCLUDED.lock_uid,
            lock_name = EXCLUDED.lock_name,
            lock_email = EXCLUDED.lock_email,
            lock_at = EXCLUDED.lock_at,
            created_at = EXCLUDED.created_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.slug)
    .bind(&event.summary)
    .bind(&event.content)
    .bind(program)
    .bind(event.status.as_str())
    .bind(event.organizer_type.as_str())
    .bind(&event.organizer_name)
    .bind(&event.organizer_url)
    .bind(event.source.as_str())
    .bind(event.start_at)
    .bind(&event.start_time)
    .bind(&event.end_time)
    .bind(event.registration_deadline)
    .bind(&event.location)
    .bind(&event.room)
    .bind(&event.floor)
    .bind(event.show_price_capacity)
    .bind(event.price)
    .bind(event.capacity)
    .bind(event.show_cta)
    .bind(&event.cta_text)
    .bind(&event.cta_url)
    .bind(event.show_program)
    .bind(event.show_share)
    .bind(event.calendar_enabled)
    .bind(&event.image_url)
    .bind(&event.image_path)
    .bind(&event.logo_url)
    .bind(&event.logo_path)
    .bind(&event.contact.name)
    .bind(&event.contact.email)
    .bind(&event.contact.phone)
    .bind(&event.contact.org)
    .bind(event.published_once)
    .bind(lock_uid)
    .bind(lock_name)
    .bind(lock_email)
    .bind(lock_at)
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        // The only unique constraint on the table is the non-empty slug
        // index; surface a collision as a client fault, not a 500.
        if e.as_database_error()
            .map(|d| d.is_unique_violation())
            .unwrap_or(false)
        {
            Error::InvalidInput(format!("slug '{}' is already in use", event.slug))
        } else {
            Error::Database(e)
        }
    })?;

    Ok(())
}

async fn fetch_for_update(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Event>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM event WHERE id = $1 FOR UPDATE",
        EVENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(row.map(map_row_to_event))
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn list_published(&self, filter: EventFilter, limit: i64) -> Result<Vec<Event>> {
        let mut query = format!(
            "SELECT {} FROM event WHERE status = 'published'",
            EVENT_COLUMNS
        );
        if filter != EventFilter::All {
            query.push_str(" AND organizer_type = $2");
        }
        query.push_str(" ORDER BY start_at ASC NULLS LAST LIMIT $1");

        let mut q = sqlx::query(&query).bind(limit);
        if filter != EventFilter::All {
            q = q.bind(filter.as_str());
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows.into_iter().map(map_row_to_event).collect())
    }

    async fn get_by_slug(&self, slug: &str, include_drafts: bool) -> Result<Option<Event>> {
        let mut query = format!("SELECT {} FROM event WHERE slug = $1", EVENT_COLUMNS);
        if !include_drafts {
            query.push_str(" AND status = 'published'");
        }
        query.push_str(" LIMIT 1");

        let row = sqlx::query(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(map_row_to_event))
    }

    async fn admin_list(
        &self,
        filter: EventFilter,
        status: Option<EventStatus>,
    ) -> Result<Vec<Event>> {
        let mut query = format!("SELECT {} FROM event WHERE TRUE", EVENT_COLUMNS);
        let mut param = 1;
        if filter != EventFilter::All {
            query.push_str(&format!(" AND organizer_type = ${}", param));
            param += 1;
        }
        if status.is_some() {
            query.push_str(&format!(" AND status = ${}", param));
        }
        query.push_str(" ORDER BY start_at ASC NULLS LAST");

        let mut q = sqlx::query(&query);
        if filter != EventFilter::All {
            q = q.bind(filter.as_str());
        }
        if let Some(s) = status {
            q = q.bind(s.as_str());
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows.into_iter().map(map_row_to_event).collect())
    }

    async fn fetch(&self, id: Uuid) -> Result<Event> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM event WHERE id = $1",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(map_row_to_event).ok_or(Error::EventNotFound(id))
    }

    async fn insert(&self, event: Event) -> Result<Uuid> {
        let id = event.id;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        write_event(&mut tx, &event).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(id)
    }

    async fn upsert(&self, req: UpsertEventRequest, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (previous, id) = match req.existing_id() {
            Some(id) => (fetch_for_update(&mut tx, id).await?, id),
            None => (None, Uuid::now_v7()),
        };
        let created = previous.is_none();

        let event = apply_write_rules(&req, previous.as_ref(), id, now);
        write_event(&mut tx, &event).await?;
        tx.commit().await.map_err(Error::Database)?;

        let replaced = |old: &str, new: &str| {
            if !old.is_empty() && old != new {
                Some(old.to_string())
            } else {
                None
            }
        };
        let (replaced_image_path, replaced_logo_path) = previous
            .as_ref()
            .map(|p| {
                (
                    replaced(&p.image_path, &event.image_path),
                    replaced(&p.logo_path, &event.logo_path),
                )
            })
            .unwrap_or((None, None));

        Ok(UpsertOutcome {
            id,
            created,
            replaced_image_path,
            replaced_logo_path,
        })
    }

    async fn delete(&self, id: Uuid) -> Result<Event> {
        let row = sqlx::query(&format!(
            "DELETE FROM event WHERE id = $1 RETURNING {}",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(map_row_to_event).ok_or(Error::EventNotFound(id))
    }

    async fn list_started_before(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, DateTime<Utc>)>> {
        let rows = sqlx::query(
            "SELECT id, start_at FROM event \
             WHERE status = 'published' AND start_at IS NOT NULL AND start_at < $1 \
             ORDER BY start_at ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("id"), r.get("start_at")))
            .collect())
    }

    async fn archive_batch(&self, ids: &[Uuid], now: DateTime<Utc>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE event SET status = 'archived', updated_at = $2 \
             WHERE id = ANY($1) AND status = 'published'",
        )
        .bind(ids)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn referenced_storage_paths(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT image_path, logo_path FROM event")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut paths = HashSet::new();
        for row in rows {
            let image: String = row.get("image_path");
            let logo: String = row.get("logo_path");
            if !image.is_empty() {
                paths.insert(image);
            }
            if !logo.is_empty() {
                paths.insert(logo);
            }
        }
        Ok(paths)
    }
}
