//! SQLite schema, created idempotently at startup

pub(super) const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS medications (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id           INTEGER NOT NULL REFERENCES users(id),
        name              TEXT NOT NULL,
        frequency_per_day INTEGER NOT NULL DEFAULT 1 CHECK (frequency_per_day >= 0),
        pills_left        INTEGER NOT NULL DEFAULT 30 CHECK (pills_left >= 0),
        pills_per_dose    INTEGER NOT NULL DEFAULT 1 CHECK (pills_per_dose >= 1),
        slot              INTEGER UNIQUE CHECK (slot IS NULL OR slot BETWEEN 0 AND 4),
        UNIQUE (user_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alarms (
        id      INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        med_id  INTEGER NOT NULL REFERENCES medications(id) ON DELETE CASCADE,
        time    TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_alarms_time ON alarms(time)",
    // No foreign key on med_id: events outlive their medication
    r#"
    CREATE TABLE IF NOT EXISTS pill_events (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id  INTEGER NOT NULL REFERENCES users(id),
        med_id   INTEGER NOT NULL,
        med_name TEXT NOT NULL,
        taken_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_pill_events_user ON pill_events(user_id, taken_at)",
];
