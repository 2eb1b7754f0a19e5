use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    anonroom::logging::init_tracing();

    match anonroom::app::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", snafu::Report::from_error(error));
            ExitCode::FAILURE
        }
    }
}
