use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::Session;
use crate::error::Result;
use crate::fmt::money;
use crate::reports::{current_month_bounds, dashboard};

fn signed(val: f64) -> String {
    if val < 0.0 {
        money(val).red().to_string()
    } else {
        money(val).green().to_string()
    }
}

pub fn run() -> Result<()> {
    let s = Session::open()?;
    let d = dashboard(&s.state, current_month_bounds());

    let mut balances = Table::new();
    balances.set_header(vec!["Account", "Type", "Balance"]);
    for b in &d.balances {
        balances.add_row(vec![
            Cell::new(&b.name),
            Cell::new(b.account_type.as_str()),
            Cell::new(signed(b.balance)),
        ]);
    }
    balances.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(signed(d.total_balance)),
    ]);
    println!("Balances\n{balances}");

    println!();
    println!("Month {}", d.bounds.label().bold());
    println!("  Income:   {}", money(d.month.income).green());
    println!("  Expenses: {}", money(d.month.expense).red());
    println!("  Net:      {}", signed(d.month.net));

    if !d.expenses_by_category.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Category", "Total", "%", "Count"]);
        for c in &d.expenses_by_category {
            table.add_row(vec![
                Cell::new(&c.name),
                Cell::new(money(c.total)),
                Cell::new(format!("{:.1}%", c.pct)),
                Cell::new(c.count),
            ]);
        }
        println!();
        println!("Expenses by category\n{table}");
    }
    Ok(())
}
