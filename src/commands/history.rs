// src/commands/history.rs
//! Transaction history

use super::open_session;
use crate::cli::Cli;
use anyhow::Result;
use rpmgoal::db::{self, HistoryTransaction};

/// List recorded transactions, newest first
pub fn cmd_history_list(cli: &Cli) -> Result<()> {
    let (_manager, session) = open_session(cli, false)?;
    let path = session.base()?.config().history_db_path();
    if !path.exists() {
        println!("No transactions recorded");
        return Ok(());
    }

    let conn = db::open(&path)?;
    let transactions = HistoryTransaction::list_all(&conn)?;
    if transactions.is_empty() {
        println!("No transactions recorded");
        return Ok(());
    }

    println!("{:>5}  {:<25}  {:<10}  {:>7}  Description", "ID", "Date", "State", "Altered");
    for trans in transactions {
        println!(
            "{:>5}  {:<25}  {:<10}  {:>7}  {}",
            trans.id.unwrap_or(0),
            trans.dt_begin,
            trans.state.as_str(),
            trans.items.len(),
            trans.description
        );
        if !trans.comment.is_empty() {
            println!("       {}", trans.comment);
        }
    }
    Ok(())
}
