// src/db/history.rs

//! Transaction history records

use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::str::FromStr;

/// Outcome of a transaction or of one of its items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryState {
    Started,
    Ok,
    Error,
}

impl HistoryState {
    pub fn as_str(&self) -> &str {
        match self {
            HistoryState::Started => "started",
            HistoryState::Ok => "ok",
            HistoryState::Error => "error",
        }
    }
}

impl FromStr for HistoryState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "started" => Ok(HistoryState::Started),
            "ok" => Ok(HistoryState::Ok),
            "error" => Ok(HistoryState::Error),
            _ => Err(format!("Invalid history state: {s}")),
        }
    }
}

fn parse_state(row: &Row, idx: usize) -> rusqlite::Result<HistoryState> {
    let raw: String = row.get(idx)?;
    raw.parse::<HistoryState>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

/// One package action of a recorded transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    pub id: Option<i64>,
    pub nevra: String,
    pub name: String,
    pub arch: String,
    pub repo_id: String,
    pub action: String,
    pub reason: String,
    pub state: HistoryState,
}

impl HistoryItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            nevra: row.get(1)?,
            name: row.get(2)?,
            arch: row.get(3)?,
            repo_id: row.get(4)?,
            action: row.get(5)?,
            reason: row.get(6)?,
            state: parse_state(row, 7)?,
        })
    }
}

/// A recorded transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryTransaction {
    pub id: Option<i64>,
    /// RFC 3339 start time
    pub dt_begin: String,
    pub dt_end: Option<String>,
    pub rpmdb_version_begin: String,
    pub rpmdb_version_end: Option<String>,
    pub user_id: u32,
    pub description: String,
    pub comment: String,
    pub state: HistoryState,
    pub items: Vec<HistoryItem>,
}

impl HistoryTransaction {
    pub fn new(dt_begin: String, rpmdb_version_begin: String, user_id: u32) -> Self {
        Self {
            id: None,
            dt_begin,
            dt_end: None,
            rpmdb_version_begin,
            rpmdb_version_end: None,
            user_id,
            description: String::new(),
            comment: String::new(),
            state: HistoryState::Started,
            items: Vec::new(),
        }
    }

    /// Insert the transaction and its items
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO trans (dt_begin, dt_end, rpmdb_version_begin, rpmdb_version_end,
                                user_id, description, comment, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &self.dt_begin,
                &self.dt_end,
                &self.rpmdb_version_begin,
                &self.rpmdb_version_end,
                self.user_id,
                &self.description,
                &self.comment,
                self.state.as_str()
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO trans_item (trans_id, nevra, name, arch, repo_id, action, reason, state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for item in &mut self.items {
                stmt.execute(params![
                    id,
                    &item.nevra,
                    &item.name,
                    &item.arch,
                    &item.repo_id,
                    &item.action,
                    &item.reason,
                    item.state.as_str()
                ])?;
                item.id = Some(tx.last_insert_rowid());
            }
        }
        tx.commit()?;

        self.id = Some(id);
        Ok(id)
    }

    /// Record the outcome of the item at `index` as soon as it is known
    pub fn set_item_state(&mut self, conn: &Connection, index: usize, state: HistoryState) -> Result<()> {
        let Some(item) = self.items.get_mut(index) else {
            return Ok(());
        };
        if let Some(id) = item.id {
            conn.execute(
                "UPDATE trans_item SET state = ?1 WHERE id = ?2",
                params![state.as_str(), id],
            )?;
        }
        item.state = state;
        Ok(())
    }

    /// Record the end of the transaction
    ///
    /// Items still `started` take the transaction's final state.
    pub fn finish(
        &mut self,
        conn: &Connection,
        dt_end: String,
        rpmdb_version_end: String,
        state: HistoryState,
    ) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            Error::InitError("Cannot finish a history transaction without ID".to_string())
        })?;
        conn.execute(
            "UPDATE trans SET dt_end = ?1, rpmdb_version_end = ?2, state = ?3 WHERE id = ?4",
            params![&dt_end, &rpmdb_version_end, state.as_str(), id],
        )?;
        conn.execute(
            "UPDATE trans_item SET state = ?1 WHERE trans_id = ?2 AND state = 'started'",
            params![state.as_str(), id],
        )?;
        for item in &mut self.items {
            if item.state == HistoryState::Started {
                item.state = state;
            }
        }
        self.dt_end = Some(dt_end);
        self.rpmdb_version_end = Some(rpmdb_version_end);
        self.state = state;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, dt_begin, dt_end, rpmdb_version_begin, rpmdb_version_end,
                    user_id, description, comment, state
             FROM trans WHERE id = ?1",
        )?;
        let trans = stmt.query_row([id], Self::from_row).optional()?;
        match trans {
            Some(mut t) => {
                t.items = Self::load_items(conn, id)?;
                Ok(Some(t))
            }
            None => Ok(None),
        }
    }

    /// All transactions, newest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, dt_begin, dt_end, rpmdb_version_begin, rpmdb_version_end,
                    user_id, description, comment, state
             FROM trans ORDER BY id DESC",
        )?;
        let mut all = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for trans in &mut all {
            if let Some(id) = trans.id {
                trans.items = Self::load_items(conn, id)?;
            }
        }
        Ok(all)
    }

    fn load_items(conn: &Connection, trans_id: i64) -> Result<Vec<HistoryItem>> {
        let mut stmt = conn.prepare(
            "SELECT id, nevra, name, arch, repo_id, action, reason, state
             FROM trans_item WHERE trans_id = ?1 ORDER BY id",
        )?;
        let items = stmt
            .query_map([trans_id], HistoryItem::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            dt_begin: row.get(1)?,
            dt_end: row.get(2)?,
            rpmdb_version_begin: row.get(3)?,
            rpmdb_version_end: row.get(4)?,
            user_id: row.get(5)?,
            description: row.get(6)?,
            comment: row.get(7)?,
            state: parse_state(row, 8)?,
            items: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    fn item(nevra: &str, action: &str) -> HistoryItem {
        HistoryItem {
            id: None,
            nevra: nevra.to_string(),
            name: nevra.split('-').next().unwrap().to_string(),
            arch: "noarch".to_string(),
            repo_id: "repo1".to_string(),
            action: action.to_string(),
            reason: "user".to_string(),
            state: HistoryState::Started,
        }
    }

    #[test]
    fn test_insert_and_finish() {
        let conn = create_test_db();
        let mut trans = HistoryTransaction::new("2024-01-01T00:00:00Z".into(), "0:abc".into(), 0);
        trans.description = "rpmgoal install one".to_string();
        trans.items = vec![item("one-2-1.noarch", "Upgrade"), item("one-1-1.noarch", "Replaced")];
        let id = trans.insert(&conn).unwrap();

        trans
            .finish(&conn, "2024-01-01T00:00:05Z".into(), "1:def".into(), HistoryState::Ok)
            .unwrap();

        let loaded = HistoryTransaction::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(loaded.state, HistoryState::Ok);
        assert_eq!(loaded.rpmdb_version_end.as_deref(), Some("1:def"));
        assert_eq!(loaded.items.len(), 2);
        assert!(loaded.items.iter().all(|i| i.state == HistoryState::Ok));
        assert_eq!(loaded.items[0].action, "Upgrade");
    }

    #[test]
    fn test_list_newest_first() {
        let conn = create_test_db();
        for n in 0..3 {
            let mut trans = HistoryTransaction::new(format!("t{n}"), "v".into(), 1000);
            trans.insert(&conn).unwrap();
        }
        let all = HistoryTransaction::list_all(&conn).unwrap();
        let begins: Vec<&str> = all.iter().map(|t| t.dt_begin.as_str()).collect();
        assert_eq!(begins, vec!["t2", "t1", "t0"]);
        assert!(HistoryTransaction::find_by_id(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_item_states_survive_failed_finish() {
        let conn = create_test_db();
        let mut trans = HistoryTransaction::new("t0".into(), "v".into(), 0);
        trans.items = vec![item("one-1-1.noarch", "Install"), item("two-1-1.noarch", "Install")];
        let id = trans.insert(&conn).unwrap();

        trans.set_item_state(&conn, 0, HistoryState::Ok).unwrap();
        trans.set_item_state(&conn, 7, HistoryState::Ok).unwrap();
        trans
            .finish(&conn, "t1".into(), "v2".into(), HistoryState::Error)
            .unwrap();

        let loaded = HistoryTransaction::find_by_id(&conn, id).unwrap().unwrap();
        let states: Vec<HistoryState> = loaded.items.iter().map(|i| i.state).collect();
        assert_eq!(states, vec![HistoryState::Ok, HistoryState::Error]);
        assert_eq!(loaded.state, HistoryState::Error);
    }
}
