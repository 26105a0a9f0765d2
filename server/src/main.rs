use bridge_intake::cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env file is normal outside development
    let _ = dotenvy::dotenv();

    let matches = cli::command().get_matches();
    match cli::run(&matches).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
