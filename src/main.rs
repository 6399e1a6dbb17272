// src/main.rs

use stackbuild::{cli, errors::Result, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("stackbuild error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}

async fn run_main() -> Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let outcome = run(args).await?;
    Ok(outcome.exit_code)
}
