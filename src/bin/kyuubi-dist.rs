use std::process::ExitCode;

use kyuubi_dist::config::{parse_args, usage};
use kyuubi_dist::{pipeline, DistError};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = parse_args(&args).and_then(|config| pipeline::execute(&config));
    match result {
        Ok(outcome) => {
            info!("distribution ready at {}", outcome.dist_dir.display());
            if let Some(archive) = outcome.archive {
                info!("archive written to {}", archive.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            let code = match err.downcast_ref::<DistError>() {
                Some(DistError::Help) => {
                    eprintln!("{}", usage());
                    1
                }
                Some(DistError::Usage(msg)) => {
                    eprintln!("{msg}\n\n{}", usage());
                    1
                }
                Some(classified) => {
                    eprintln!("Error: {err:#}");
                    classified.exit_code()
                }
                None => {
                    eprintln!("Error: {err:#}");
                    1
                }
            };
            ExitCode::from(code.clamp(1, 255) as u8)
        }
    }
}
