use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{parse_account_type, parse_date_arg, parse_value_arg, today, Session};
use crate::error::{CuratelaError, Result};
use crate::fmt::{format_date_br, money};
use crate::models::NewAccount;
use crate::reports::account_balances;

pub fn add(name: &str, account_type: &str, initial: &str, opened: Option<&str>) -> Result<()> {
    let mut s = Session::open()?;
    let new = NewAccount {
        name: name.to_string(),
        account_type: parse_account_type(account_type)?,
        initial_balance: parse_value_arg(initial)?,
        opened_on: opened.map(parse_date_arg).transpose()?.unwrap_or_else(today),
    };
    let acct = s.state.add_account(&s.store, new)?;
    println!("Added account: {} (id {})", acct.name, acct.id);
    if acct.initial_balance != 0.0 {
        println!("Opening balance: {}", money(acct.initial_balance));
    }
    Ok(())
}

pub fn list() -> Result<()> {
    let s = Session::open()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Opened", "Balance"]);
    let balances = account_balances(&s.state);
    for (acct, bal) in s.state.accounts.iter().zip(&balances) {
        let balance = if bal.balance < 0.0 {
            money(bal.balance).red().to_string()
        } else {
            money(bal.balance).green().to_string()
        };
        table.add_row(vec![
            Cell::new(acct.id),
            Cell::new(&acct.name),
            Cell::new(acct.account_type.as_str()),
            Cell::new(format_date_br(acct.opened_on)),
            Cell::new(balance),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

pub fn update(
    id: i64,
    name: Option<String>,
    account_type: Option<String>,
    opened: Option<String>,
) -> Result<()> {
    let mut s = Session::open()?;
    let mut acct = s
        .state
        .account(id)
        .cloned()
        .ok_or_else(|| CuratelaError::UnknownAccount(id.to_string()))?;
    if let Some(n) = name {
        acct.name = n.trim().to_string();
    }
    if let Some(t) = account_type {
        acct.account_type = parse_account_type(&t)?;
    }
    if let Some(d) = opened {
        acct.opened_on = parse_date_arg(&d)?;
    }
    s.state.update_account(&s.store, acct.clone())?;
    println!("Updated account {id}: {}", acct.name);
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let mut s = Session::open()?;
    let name = s
        .state
        .account(id)
        .map(|a| a.name.clone())
        .ok_or_else(|| CuratelaError::UnknownAccount(id.to_string()))?;
    s.state.delete_account(&s.store, id)?;
    println!("Deleted account: {name}");
    Ok(())
}
