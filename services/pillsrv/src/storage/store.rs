use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use super::schema::SCHEMA;
use crate::domain::{
    Alarm, AlarmId, Medication, MedicationId, NewMedication, PillEvent, PillEventId, SlotIndex,
    TimeOfDay, User, UserId,
};
use crate::error::{PillError, Result};

/// SQLite-backed store for all persisted entities
///
/// Holds no run-time alarm state; alarm rows are only the schedule.
#[derive(Clone)]
pub struct EntityStore {
    pool: SqlitePool,
}

impl EntityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema ready");
        Ok(())
    }

    // ---- users ----

    /// Return the user with this name, creating it on first reference
    pub async fn upsert_user(&self, name: &str) -> Result<User> {
        sqlx::query("INSERT INTO users (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;

        self.find_user_by_name(name)
            .await?
            .ok_or_else(|| PillError::not_found(format!("user {}", name)))
    }

    pub async fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| hydrate_user(&r)).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, name FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(hydrate_user).collect()
    }

    // ---- medications ----

    pub async fn insert_medication(
        &self,
        med: &NewMedication,
        slot: Option<SlotIndex>,
    ) -> Result<Medication> {
        let result = sqlx::query(
            r#"
            INSERT INTO medications
                (user_id, name, frequency_per_day, pills_left, pills_per_dose, slot)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(med.user_id.0)
        .bind(&med.name)
        .bind(i64::from(med.frequency_per_day))
        .bind(i64::from(med.pills_left))
        .bind(i64::from(med.pills_per_dose))
        .bind(slot.map(|s| s.index() as i64))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() && db.message().contains("medications.slot") {
                    return PillError::invalid_input("slot already occupied");
                }
                if db.is_unique_violation() {
                    return PillError::invalid_input(format!(
                        "medication '{}' already exists for this user",
                        med.name
                    ));
                }
            }
            PillError::Store(e)
        })?;

        Ok(Medication {
            id: MedicationId(result.last_insert_rowid()),
            user_id: med.user_id,
            name: med.name.clone(),
            frequency_per_day: med.frequency_per_day,
            pills_left: med.pills_left,
            pills_per_dose: med.pills_per_dose,
            slot,
        })
    }

    pub async fn get_medication(&self, id: MedicationId) -> Result<Medication> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, frequency_per_day, pills_left, pills_per_dose, slot
            FROM medications
            WHERE id = ?
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => hydrate_medication(&row),
            None => Err(PillError::not_found(format!("medication {}", id))),
        }
    }

    pub async fn find_medication(&self, user_id: UserId, name: &str) -> Result<Option<Medication>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, frequency_per_day, pills_left, pills_per_dose, slot
            FROM medications
            WHERE user_id = ? AND name = ?
            "#,
        )
        .bind(user_id.0)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| hydrate_medication(&r)).transpose()
    }

    pub async fn list_medications(&self, user_id: UserId) -> Result<Vec<Medication>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, frequency_per_day, pills_left, pills_per_dose, slot
            FROM medications
            WHERE user_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(hydrate_medication).collect()
    }

    pub async fn set_medication_slot(
        &self,
        id: MedicationId,
        slot: Option<SlotIndex>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE medications SET slot = ? WHERE id = ?")
            .bind(slot.map(|s| s.index() as i64))
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PillError::not_found(format!("medication {}", id)));
        }
        Ok(())
    }

    /// Delete a medication together with its alarms
    pub async fn delete_medication(&self, id: MedicationId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM alarms WHERE med_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM medications WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(PillError::not_found(format!("medication {}", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Persisted slot occupancy, ordered by slot
    pub async fn occupied_slots(&self) -> Result<Vec<(SlotIndex, MedicationId)>> {
        let rows = sqlx::query(
            "SELECT slot, id FROM medications WHERE slot IS NOT NULL ORDER BY slot ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut occupied = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: i64 = row.try_get("slot")?;
            let slot = slot_from_db(raw)?;
            occupied.push((slot, MedicationId(row.try_get("id")?)));
        }
        Ok(occupied)
    }

    // ---- alarms ----

    pub async fn insert_alarm(
        &self,
        user_id: UserId,
        med_id: MedicationId,
        time: TimeOfDay,
    ) -> Result<Alarm> {
        let result = sqlx::query("INSERT INTO alarms (user_id, med_id, time) VALUES (?, ?, ?)")
            .bind(user_id.0)
            .bind(med_id.0)
            .bind(time.to_string())
            .execute(&self.pool)
            .await?;

        Ok(Alarm {
            id: AlarmId(result.last_insert_rowid()),
            user_id,
            med_id,
            time,
        })
    }

    pub async fn list_alarms(&self) -> Result<Vec<Alarm>> {
        let rows = sqlx::query("SELECT id, user_id, med_id, time FROM alarms ORDER BY time, id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(hydrate_alarm).collect()
    }

    /// Alarms scheduled for exactly this minute
    pub async fn alarms_due_at(&self, time: TimeOfDay) -> Result<Vec<Alarm>> {
        let rows = sqlx::query(
            "SELECT id, user_id, med_id, time FROM alarms WHERE time = ? ORDER BY id",
        )
        .bind(time.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(hydrate_alarm).collect()
    }

    /// Returns the number of rows removed (0 or 1)
    pub async fn delete_alarm(&self, id: AlarmId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM alarms WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ---- dose history ----

    /// Append a dose and decrement inventory in one transaction
    ///
    /// `pills_left` is clamped at zero.
    pub async fn record_dose(
        &self,
        user_id: UserId,
        med_id: MedicationId,
        taken_at: DateTime<Utc>,
    ) -> Result<PillEvent> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT name FROM medications WHERE id = ?")
            .bind(med_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let med_name: String = match row {
            Some(row) => row.try_get("name")?,
            None => {
                tx.rollback().await?;
                return Err(PillError::not_found(format!("medication {}", med_id)));
            },
        };

        sqlx::query(
            "UPDATE medications SET pills_left = MAX(0, pills_left - pills_per_dose) WHERE id = ?",
        )
        .bind(med_id.0)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "INSERT INTO pill_events (user_id, med_id, med_name, taken_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id.0)
        .bind(med_id.0)
        .bind(&med_name)
        .bind(format_timestamp(&taken_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PillEvent {
            id: PillEventId(result.last_insert_rowid()),
            user_id,
            med_id,
            med_name,
            taken_at,
        })
    }

    /// Dose history for a user, newest first
    pub async fn list_pill_events(&self, user_id: UserId) -> Result<Vec<PillEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, med_id, med_name, taken_at
            FROM pill_events
            WHERE user_id = ?
            ORDER BY taken_at DESC, id DESC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(hydrate_pill_event).collect()
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn slot_from_db(raw: i64) -> Result<SlotIndex> {
    u8::try_from(raw)
        .ok()
        .and_then(SlotIndex::new)
        .ok_or_else(|| PillError::Store(sqlx::Error::Decode(format!("bad slot {}", raw).into())))
}

fn hydrate_user(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
    })
}

fn hydrate_medication(row: &SqliteRow) -> Result<Medication> {
    let slot: Option<i64> = row.try_get("slot")?;
    Ok(Medication {
        id: MedicationId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        name: row.try_get("name")?,
        frequency_per_day: row.try_get::<i64, _>("frequency_per_day")? as u32,
        pills_left: row.try_get::<i64, _>("pills_left")? as u32,
        pills_per_dose: row.try_get::<i64, _>("pills_per_dose")? as u32,
        slot: slot.map(slot_from_db).transpose()?,
    })
}

fn hydrate_alarm(row: &SqliteRow) -> Result<Alarm> {
    let raw: String = row.try_get("time")?;
    let time = raw.parse::<TimeOfDay>().map_err(|e| {
        PillError::Store(sqlx::Error::Decode(format!("bad alarm time '{}': {}", raw, e).into()))
    })?;
    Ok(Alarm {
        id: AlarmId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        med_id: MedicationId(row.try_get("med_id")?),
        time,
    })
}

fn hydrate_pill_event(row: &SqliteRow) -> Result<PillEvent> {
    let raw: String = row.try_get("taken_at")?;
    let taken_at = DateTime::parse_from_rfc3339(&raw)
        .map_err(|e| {
            PillError::Store(sqlx::Error::Decode(format!("bad timestamp '{}': {}", raw, e).into()))
        })?
        .with_timezone(&Utc);
    Ok(PillEvent {
        id: PillEventId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        med_id: MedicationId(row.try_get("med_id")?),
        med_name: row.try_get("med_name")?,
        taken_at,
    })
}
