//! Database schema initialization

use rusqlite::{params, Connection, OptionalExtension};

use super::SCHEMA_VERSION;
use crate::core::error::Result;

/// Create the report tables if missing and record the schema version
///
/// Version 1 stores predate `report_policies`; the table is created here and
/// the version bumped in place.
pub(super) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Saved reports, partitioned by container
        CREATE TABLE IF NOT EXISTS reports (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id TEXT NOT NULL UNIQUE,
            container_id TEXT NOT NULL,
            report_key TEXT NOT NULL,
            flags INTEGER NOT NULL DEFAULT 0,
            category_id INTEGER,
            display_order INTEGER NOT NULL DEFAULT 0,
            descriptor BLOB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reports_container ON reports(container_id);
        CREATE INDEX IF NOT EXISTS idx_reports_container_key ON reports(container_id, report_key);
        CREATE INDEX IF NOT EXISTS idx_reports_category ON reports(container_id, category_id);

        -- Role assignments attached to individual reports
        CREATE TABLE IF NOT EXISTS report_policies (
            row_id INTEGER NOT NULL,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,
            PRIMARY KEY (row_id, user_id, role)
        );
        "#,
    )?;

    let current: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match current {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }
        Some(1) => {
            conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![SCHEMA_VERSION],
            )?;
        }
        Some(_) => {}
    }

    Ok(())
}

/// Stored schema version, if any
pub(super) fn schema_version(conn: &Connection) -> Result<Option<i32>> {
    Ok(conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?)
}
