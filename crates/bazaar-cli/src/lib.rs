use std::path::Path;

use anyhow::Context;
use bazaar_uploader::LocalFile;
use serde::Serialize;
use serde_json::Value;

/// Initialize tracing for the CLI.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Parse the `--record` argument. Absent means an empty form.
pub fn parse_record(raw: Option<&str>) -> anyhow::Result<Value> {
    match raw {
        None => Ok(Value::Object(serde_json::Map::new())),
        Some(raw) => {
            let value: Value = serde_json::from_str(raw).context("Parse --record as JSON")?;
            anyhow::ensure!(value.is_object(), "--record must be a JSON object");
            Ok(value)
        }
    }
}

/// Best-effort MIME type from a file extension.
pub fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// Read a file from disk into a [`LocalFile`] named after its final path
/// component.
pub async fn read_local_file(path: &Path) -> anyhow::Result<LocalFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Read {}", path.display()))?;

    let file = LocalFile::new(name.clone(), bytes);
    Ok(match guess_content_type(&name) {
        Some(mime) => file.with_content_type(mime),
        None => file,
    })
}
