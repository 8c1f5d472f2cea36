// src/main.rs

use taskweave::errors::TaskweaveError;
use taskweave::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("taskweave error: {err:#}");
        let code = err
            .downcast_ref::<TaskweaveError>()
            .map(TaskweaveError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await?;
    Ok(())
}
