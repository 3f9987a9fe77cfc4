use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Every test gets its own HOME (settings file) and data directory.
struct Sandbox {
    home: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            home: TempDir::new().unwrap(),
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.home.path().join("data")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("curatela").unwrap();
        cmd.env("HOME", self.home.path())
            .env("CURATELA_DATA_DIR", self.data_dir())
            .env("NO_COLOR", "1")
            .env_remove("CURATELA_AI_URL")
            .env_remove("CURATELA_AI_KEY");
        cmd
    }

    fn run(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.cmd().args(args).assert()
    }

    fn initialized() -> Self {
        let sb = Self::new();
        sb.run(&["init"])
            .success()
            .stdout(predicate::str::contains("Categories:     17"));
        sb
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.home.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

fn arg(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn commands_need_a_database() {
    let sb = Sandbox::new();
    sb.run(&["accounts", "list"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("curatela init"));
}

#[test]
fn init_and_status() {
    let sb = Sandbox::initialized();
    assert!(sb.data_dir().join("curatela.db").exists());
    assert!(sb.home.path().join(".config/curatela/settings.json").exists());
    sb.run(&["status"])
        .success()
        .stdout(predicate::str::contains("Accounts:      0"))
        .stdout(predicate::str::contains("Categories:    17"));
}

#[test]
fn init_does_not_persist_environment_overrides() {
    let sb = Sandbox::new();
    sb.cmd()
        .env("CURATELA_AI_KEY", "env-secret")
        .env("CURATELA_AI_URL", "http://env.example")
        .args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://env.example"));
    assert!(sb.data_dir().join("curatela.db").exists());

    let saved = std::fs::read_to_string(sb.home.path().join(".config/curatela/settings.json")).unwrap();
    assert!(!saved.contains("env-secret"), "{saved}");
    assert!(!saved.contains("env.example"), "{saved}");

    sb.cmd()
        .env("CURATELA_AI_KEY", "env-secret")
        .args(["init", "--ai-key", "flag-key"])
        .assert()
        .success();
    let saved = std::fs::read_to_string(sb.home.path().join(".config/curatela/settings.json")).unwrap();
    assert!(saved.contains("flag-key"), "{saved}");
    assert!(!saved.contains("env-secret"), "{saved}");
}

#[test]
fn account_and_transaction_flow() {
    let sb = Sandbox::initialized();
    sb.run(&["accounts", "add", "Conta Itaú", "--initial", "1000", "--opened", "01/01/2024"])
        .success()
        .stdout(predicate::str::contains("Added account: Conta Itaú (id 1)"));
    sb.run(&[
        "transactions",
        "add",
        "--description",
        "Remédio",
        "--value",
        "35,90",
        "--account",
        "Conta Itaú",
        "--category",
        "Farmácia",
        "--date",
        "02/03/2024",
    ])
    .success()
    .stdout(predicate::str::contains("Added transaction"));

    sb.run(&["transactions", "list", "--account", "Conta Itaú"])
        .success()
        .stdout(predicate::str::contains("Remédio"))
        .stdout(predicate::str::contains("Saldo inicial"));
    sb.run(&["accounts", "list"])
        .success()
        .stdout(predicate::str::contains("964,10"));
    sb.run(&["dashboard"])
        .success()
        .stdout(predicate::str::contains("Balances"))
        .stdout(predicate::str::contains("Month"));
    sb.run(&["logs"])
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("transaction"));
}

#[test]
fn transaction_with_wrong_category_type_is_rejected() {
    let sb = Sandbox::initialized();
    sb.run(&["accounts", "add", "Poupança", "--type", "POUPANCA"]).success();
    sb.run(&[
        "transactions",
        "add",
        "--description",
        "Aluguel",
        "--value",
        "900",
        "--nature",
        "RECEITA",
        "--account",
        "Poupança",
        "--category",
        "Farmácia",
    ])
    .failure()
    .stderr(predicate::str::contains("Unknown category"));
}

#[test]
fn category_in_use_cannot_be_deleted() {
    let sb = Sandbox::initialized();
    sb.run(&["categories", "add", "Cuidador", "--type", "DESPESA"])
        .success()
        .stdout(predicate::str::contains("Added category: Cuidador"));
    sb.run(&["accounts", "add", "Conta"]).success();
    sb.run(&[
        "transactions",
        "add",
        "--description",
        "Diária",
        "--value",
        "150",
        "--account",
        "Conta",
        "--category",
        "Cuidador",
    ])
    .success();

    sb.run(&["categories", "delete", "18"])
        .failure()
        .stderr(predicate::str::contains("in use"));
    sb.run(&["categories", "add", "cuidador", "--type", "DESPESA"]).failure();
}

#[test]
fn import_reviews_before_writing() {
    let sb = Sandbox::initialized();
    sb.run(&["accounts", "add", "Conta"]).success();
    let csv = sb.write(
        "extrato.csv",
        "Data,Descrição,Categoria,Valor\n\
         01/03/2024,Farmácia Central,Farmácia,\"35,90\"\n\
         05/03/2024,Mercado,Alimentação,\"210,00\"\n\
         05/03/2024,Mercado,Alimentação,\"210,00\"\n\
         ,Sem data,Lazer,10\n",
    );

    sb.run(&["import", arg(&csv), "--account", "Conta"])
        .success()
        .stdout(predicate::str::contains("2 new, 1 duplicate, 1 invalid"))
        .stdout(predicate::str::contains("Review only"));
    sb.run(&["transactions", "list"])
        .success()
        .stdout(predicate::str::contains("Transactions (0 of 0)"));

    sb.run(&["import", arg(&csv), "--account", "Conta", "--exclude", "2", "--yes"])
        .success()
        .stdout(predicate::str::contains("Imported 1 transactions into Conta"));
    sb.run(&["import", arg(&csv), "--account", "Conta", "--yes"])
        .success()
        .stdout(predicate::str::contains("Imported 1 transactions into Conta"));
    sb.run(&["import", arg(&csv), "--account", "Conta", "--yes"])
        .failure()
        .stderr(predicate::str::contains("Nothing to import"));
}

#[test]
fn import_reports_missing_columns() {
    let sb = Sandbox::initialized();
    sb.run(&["accounts", "add", "Conta"]).success();
    let csv = sb.write("ruim.csv", "Data,Valor\n01/03/2024,10\n");
    sb.run(&["import", arg(&csv), "--account", "Conta"])
        .failure()
        .stderr(predicate::str::contains("Missing required columns: descrição, categoria"));
}

#[test]
fn category_import_skips_existing() {
    let sb = Sandbox::initialized();
    let csv = sb.write("categorias.csv", "Nome,Tipo\nCuidador,DESPESA\nFarmácia,DESPESA\nPensão,RECEITA\n");
    sb.run(&["categories", "import", arg(&csv), "--yes"])
        .success()
        .stdout(predicate::str::contains("2 new, 1 duplicate"))
        .stdout(predicate::str::contains("Imported 2 categories"));
    sb.run(&["categories", "list", "--type", "RECEITA"])
        .success()
        .stdout(predicate::str::contains("Pensão"));
}

#[cfg(feature = "pdf")]
#[test]
fn export_writes_pdf() {
    let sb = Sandbox::initialized();
    sb.run(&["accounts", "add", "Conta", "--initial", "500", "--opened", "01/03/2024"])
        .success();
    let out = sb.home.path().join("extrato.pdf");
    sb.run(&["export", "--output", arg(&out), "--from", "01/03/2024", "--to", "31/03/2024"])
        .success()
        .stdout(predicate::str::contains("Wrote"))
        .stdout(predicate::str::contains("(1 transactions)"));
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn ask_without_ai_service_fails() {
    let sb = Sandbox::initialized();
    sb.run(&["ask", "quanto", "gastei?"])
        .failure()
        .stderr(predicate::str::contains("AI endpoint is not configured"));
}
