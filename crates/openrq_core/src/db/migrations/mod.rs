//! Project schema steps, applied in order on open.
//!
//! # Invariants
//! - Steps are listed by strictly increasing `version`, starting at 1.
//! - Pending steps are applied together: a project file is either fully
//!   upgraded or left at its previous version.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: [SchemaStep; 2] = [
    SchemaStep {
        version: 1,
        name: "items",
        sql: include_str!("0001_items.sql"),
    },
    SchemaStep {
        version: 2,
        name: "solution_members",
        sql: include_str!("0002_solution_members.sql"),
    },
];

/// Schema version a fully migrated project file carries.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.iter().map(|step| step.version).max().unwrap_or(0)
}

/// Brings `conn` up to `latest_version()`.
///
/// Returns the versions that were applied, oldest first; empty when the
/// file was already current.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    let found = stored_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > found)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for step in &pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    Ok(pending.iter().map(|step| step.version).collect())
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, SCHEMA_STEPS};
    use rusqlite::Connection;

    #[test]
    fn steps_are_numbered_from_one_without_gaps() {
        for (position, step) in SCHEMA_STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, position + 1, "step {}", step.name);
        }
        assert_eq!(latest_version(), SCHEMA_STEPS.len() as u32);
    }

    #[test]
    fn second_run_applies_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(apply_migrations(&mut conn).unwrap(), vec![1, 2]);
        assert!(apply_migrations(&mut conn).unwrap().is_empty());
    }

    #[test]
    fn partially_migrated_file_gets_remaining_steps() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_STEPS[0].sql).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();
        assert_eq!(apply_migrations(&mut conn).unwrap(), vec![2]);
    }
}
