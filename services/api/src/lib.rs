mod cli;
mod infra;
mod routes;
mod server;

use interview_queue::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
