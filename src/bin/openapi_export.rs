// Prints the OpenAPI document served at /api-docs/openapi.json
// Usage: cargo run --bin openapi-export > openapi.json

use anyhow::{Context, Result};
use family_karaoke::api::openapi::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<()> {
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;
    println!("{json}");
    Ok(())
}
