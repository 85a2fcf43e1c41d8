//! `spec` subcommand: export the OpenAPI document.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;
use utoipa::OpenApi;

use crate::openapi::ApiDoc;

/// Failure to render or write the OpenAPI document.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to encode OpenAPI document: {0}")]
    Encode(String),
    #[error("failed to write OpenAPI document: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    fn render(self) -> Result<String, SpecError> {
        let openapi = ApiDoc::openapi();
        match self {
            Self::Json => openapi
                .to_pretty_json()
                .map_err(|err| SpecError::Encode(err.to_string())),
            Self::Yaml => openapi
                .to_yaml()
                .map_err(|err| SpecError::Encode(err.to_string())),
        }
    }
}

/// Writes the OpenAPI document to `output`.
///
/// `None` or `"yaml"` streams YAML to stdout and `"json"` streams JSON.
/// Anything else is a file path whose extension picks the format (YAML
/// unless it ends in `.json`).
///
/// # Errors
/// Returns an error if encoding or writing fails.
pub fn generate_spec(output: Option<&str>) -> Result<(), SpecError> {
    match output {
        None | Some("yaml") => write_stdout(&SpecFormat::Yaml.render()?),
        Some("json") => write_stdout(&SpecFormat::Json.render()?),
        Some(path) => {
            let path = Path::new(path);
            fs::write(path, SpecFormat::for_path(path).render()?)?;
            println!("OpenAPI spec written to {}", path.display());
            Ok(())
        }
    }
}

fn write_stdout(document: &str) -> Result<(), SpecError> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(document.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
