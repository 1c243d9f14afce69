//! SQL for the report and report policy tables
//!
//! Functions here take a bare `&Connection`; transaction boundaries belong to
//! the caller.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::ReportRecord;
use crate::core::error::Result;
use crate::core::identity::{ContainerId, EntityId, UserId};
use crate::core::security::{Role, RoleAssignment};

const SELECT_COLUMNS: &str = "SELECT row_id, entity_id, container_id, report_key, flags, \
     category_id, display_order, descriptor FROM reports";

fn map_row(row: &Row<'_>) -> rusqlite::Result<ReportRecord> {
    let entity_id: String = row.get(1)?;
    let container_id: String = row.get(2)?;
    Ok(ReportRecord {
        row_id: Some(row.get(0)?),
        entity_id: entity_id.parse::<EntityId>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        container_id: container_id.parse::<ContainerId>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        report_key: row.get(3)?,
        flags: row.get(4)?,
        category_id: row.get(5)?,
        display_order: row.get(6)?,
        descriptor_blob: row.get(7)?,
    })
}

pub(super) fn exists(conn: &Connection, row_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT row_id FROM reports WHERE row_id = ?1",
            params![row_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(super) fn select_all_for_container(
    conn: &Connection,
    container: &ContainerId,
) -> Result<Vec<ReportRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE container_id = ?1 ORDER BY row_id",
        SELECT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![container.as_str()], map_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(super) fn select_by_container_and_key(
    conn: &Connection,
    container: &ContainerId,
    key: &str,
) -> Result<Vec<ReportRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE container_id = ?1 AND report_key = ?2 ORDER BY row_id",
        SELECT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![container.as_str(), key], map_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(super) fn select_by_row_id(conn: &Connection, row_id: i64) -> Result<Option<ReportRecord>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE row_id = ?1", SELECT_COLUMNS),
            params![row_id],
            map_row,
        )
        .optional()?)
}

pub(super) fn insert(conn: &Connection, record: &ReportRecord) -> Result<i64> {
    conn.execute(
        r#"INSERT INTO reports
               (entity_id, container_id, report_key, flags, category_id, display_order, descriptor)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        params![
            record.entity_id.to_string(),
            record.container_id.as_str(),
            record.report_key,
            record.flags,
            record.category_id,
            record.display_order,
            record.descriptor_blob,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn update(conn: &Connection, row_id: i64, record: &ReportRecord) -> Result<usize> {
    Ok(conn.execute(
        r#"UPDATE reports
           SET container_id = ?2, report_key = ?3, flags = ?4, category_id = ?5,
               display_order = ?6, descriptor = ?7
           WHERE row_id = ?1"#,
        params![
            row_id,
            record.container_id.as_str(),
            record.report_key,
            record.flags,
            record.category_id,
            record.display_order,
            record.descriptor_blob,
        ],
    )?)
}

pub(super) fn delete(conn: &Connection, container: &ContainerId, row_id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM reports WHERE container_id = ?1 AND row_id = ?2",
        params![container.as_str(), row_id],
    )?;
    Ok(deleted > 0)
}

pub(super) fn count(conn: &Connection) -> Result<usize> {
    Ok(conn.query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?)
}

pub(super) fn replace_policy(
    conn: &Connection,
    row_id: i64,
    assignments: &[RoleAssignment],
) -> Result<()> {
    delete_policy(conn, row_id)?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO report_policies (row_id, user_id, role) VALUES (?1, ?2, ?3)",
    )?;
    for assignment in assignments {
        stmt.execute(params![
            row_id,
            assignment.user.as_str(),
            assignment.role.to_string()
        ])?;
    }
    Ok(())
}

pub(super) fn delete_policy(conn: &Connection, row_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM report_policies WHERE row_id = ?1",
        params![row_id],
    )?)
}

pub(super) fn select_policy(conn: &Connection, row_id: i64) -> Result<Vec<RoleAssignment>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, role FROM report_policies WHERE row_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![row_id], |row| {
        let user: String = row.get(0)?;
        let role: String = row.get(1)?;
        let role = role.parse::<Role>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?;
        Ok(RoleAssignment {
            user: UserId::new(user),
            role,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
