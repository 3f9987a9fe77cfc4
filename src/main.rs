use clap::Parser;

use curatela::cli::{self, Cli};
use curatela::{logging, settings};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Cli::parse();
    let verbose = args.verbose;
    logging::init(settings::load_settings().log_capacity, verbose);

    let result = cli::run(args.command).await;

    let entries = logging::snapshot();
    if verbose {
        let warnings = logging::warnings(&entries).count();
        eprintln!("-- {} log record(s) kept, {warnings} warning(s) or error(s) --", entries.len());
    } else {
        // Records were not echoed as they arrived; surface the ones that matter.
        for entry in logging::warnings(&entries) {
            eprintln!("{}", logging::format_entry(entry));
        }
    }

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
