//! services/api/src/bin/openapi.rs
//!
//! Dumps the relay's OpenAPI document so the extension can generate a typed client.

use api_lib::{error::ApiError, web::rest::openapi_json};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "openapi", about = "Write the relay's OpenAPI document")]
struct Cli {
    /// Destination file.
    #[arg(default_value = "openapi.json")]
    out: PathBuf,
}

fn main() -> Result<(), ApiError> {
    let cli = Cli::parse();
    let document = openapi_json().map_err(|e| ApiError::Internal(e.to_string()))?;
    std::fs::write(&cli.out, document)?;
    println!("Wrote {}", cli.out.display());
    Ok(())
}
