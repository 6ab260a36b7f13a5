// src/db/state.rs

//! Persisted install reasons
//!
//! One row per installed `name.arch`: why it was installed and from which
//! repository. The installed package database itself does not record this.

use crate::error::Result;
use crate::package::Reason;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

/// Reason and origin of one installed `name.arch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageState {
    pub name: String,
    pub arch: String,
    pub reason: Reason,
    pub from_repo: String,
}

impl PackageState {
    pub fn new(name: &str, arch: &str, reason: Reason, from_repo: &str) -> Self {
        Self {
            name: name.to_string(),
            arch: arch.to_string(),
            reason,
            from_repo: from_repo.to_string(),
        }
    }

    pub fn na(&self) -> String {
        format!("{}.{}", self.name, self.arch)
    }

    /// Insert or replace the row for this `name.arch`
    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO system_state (name, arch, reason, from_repo, updated_at)
             VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)
             ON CONFLICT(name, arch) DO UPDATE SET
                reason = excluded.reason,
                from_repo = excluded.from_repo,
                updated_at = excluded.updated_at",
            params![&self.name, &self.arch, self.reason.as_str(), &self.from_repo],
        )?;
        Ok(())
    }

    /// Change only the reason; inserts the row when it is missing
    pub fn set_reason(conn: &Connection, name: &str, arch: &str, reason: Reason) -> Result<()> {
        conn.execute(
            "INSERT INTO system_state (name, arch, reason)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(name, arch) DO UPDATE SET
                reason = excluded.reason,
                updated_at = CURRENT_TIMESTAMP",
            params![name, arch, reason.as_str()],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, name: &str, arch: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM system_state WHERE name = ?1 AND arch = ?2",
            params![name, arch],
        )?;
        Ok(())
    }

    pub fn find(conn: &Connection, name: &str, arch: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, arch, reason, from_repo FROM system_state WHERE name = ?1 AND arch = ?2",
        )?;
        let state = stmt
            .query_row(params![name, arch], |row| {
                let reason: String = row.get(2)?;
                Ok(Self {
                    name: row.get(0)?,
                    arch: row.get(1)?,
                    reason: reason.parse().unwrap_or_default(),
                    from_repo: row.get(3)?,
                })
            })
            .optional()?;
        Ok(state)
    }

    /// Every row keyed by `name.arch`
    pub fn load_all(conn: &Connection) -> Result<HashMap<String, Self>> {
        let mut stmt = conn.prepare("SELECT name, arch, reason, from_repo FROM system_state")?;
        let rows = stmt
            .query_map([], |row| {
                let reason: String = row.get(2)?;
                Ok(Self {
                    name: row.get(0)?,
                    arch: row.get(1)?,
                    reason: reason.parse().unwrap_or_default(),
                    from_repo: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(|s| (s.na(), s)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    #[test]
    fn test_save_update_delete() {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();

        PackageState::new("one", "noarch", Reason::Dependency, "repo1")
            .save(&conn)
            .unwrap();
        PackageState::set_reason(&conn, "one", "noarch", Reason::User).unwrap();

        let state = PackageState::find(&conn, "one", "noarch").unwrap().unwrap();
        assert_eq!(state.reason, Reason::User);
        assert_eq!(state.from_repo, "repo1");

        let all = PackageState::load_all(&conn).unwrap();
        assert!(all.contains_key("one.noarch"));

        PackageState::delete(&conn, "one", "noarch").unwrap();
        assert!(PackageState::find(&conn, "one", "noarch").unwrap().is_none());
    }
}
