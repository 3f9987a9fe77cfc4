use std::path::PathBuf;

use crate::cli::{parse_date_opt, parse_kind, Session};
use crate::error::Result;
use crate::fmt::format_date_br;
use crate::pdf::render_register;
use crate::reports::{register, RegisterFilter};

fn default_path(data_dir: &str) -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    PathBuf::from(data_dir).join("exports").join(format!("extrato-{date}.pdf"))
}

fn period_label(filter: &RegisterFilter, account: Option<&str>) -> String {
    let period = match (filter.from, filter.to) {
        (Some(f), Some(t)) => format!("{} a {}", format_date_br(f), format_date_br(t)),
        (Some(f), None) => format!("A partir de {}", format_date_br(f)),
        (None, Some(t)) => format!("Até {}", format_date_br(t)),
        (None, None) => "Todo o período".to_string(),
    };
    match account {
        Some(a) => format!("{period} | {a}"),
        None => period,
    }
}

pub fn run(
    output: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
    account: Option<String>,
    kind: Option<String>,
) -> Result<()> {
    let s = Session::open()?;
    let account_name = account
        .as_deref()
        .map(|a| s.state.account_by_name(a).map(|a| (a.id, a.name.clone())))
        .transpose()?;
    let filter = RegisterFilter {
        from: parse_date_opt(&from_date)?,
        to: parse_date_opt(&to_date)?,
        account_id: account_name.as_ref().map(|(id, _)| *id),
        kind: kind.as_deref().map(parse_kind).transpose()?,
    };

    let report = register(&s.state, &filter);
    let subtitle = period_label(&filter, account_name.as_ref().map(|(_, n)| n.as_str()));
    let bytes = render_register(&report, "Extrato de Lançamentos", &subtitle)?;

    let path = output.map(PathBuf::from).unwrap_or_else(|| default_path(&s.settings.data_dir));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, bytes)?;
    log::info!(target: "export", "register exported: {} rows", report.rows.len());
    println!("Wrote {} ({} transactions)", path.display(), report.rows.len());
    Ok(())
}
