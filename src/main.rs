// src/main.rs

use fanout::{cli, logging};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging() {
        eprintln!("fanout: failed to initialise logging: {err:?}");
    }

    match fanout::run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("ERROR: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
