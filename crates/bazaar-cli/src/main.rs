//! Bazaar CLI: command-line client for the marketplace admin API.
//!
//! Set BAZAAR_API_URL (or API_URL). Session tokens come from BAZAAR_ACCESS_TOKEN
//! and BAZAAR_REFRESH_TOKEN; `login` prints a fresh pair to export.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bazaar_api_client::{ApiClient, ListQuery, Resource, SessionStore};
use bazaar_cli::{init_tracing, parse_record, print_json, read_local_file};
use bazaar_core::{AcceptFilter, UploadTarget};
use bazaar_uploader::{FileUploader, FormValues};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "bazaar", about = "Marketplace admin API CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the issued token pair
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Exchange the refresh token for a new token pair
    Refresh,
    /// Upload files and print their URLs
    Upload {
        /// Paths of the files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Attach files to a form field and print the resulting form
    Attach {
        /// Form field that receives the URL(s)
        #[arg(long)]
        field: String,
        /// Treat the field as a list of URLs
        #[arg(long)]
        list: bool,
        /// Maximum number of attachments (list fields only)
        #[arg(long, requires = "list")]
        max: Option<usize>,
        /// Existing record as a JSON object
        #[arg(long)]
        record: Option<String>,
        /// Accepted file types, e.g. "image/*,.pdf"; other files are skipped
        #[arg(long)]
        accept: Option<String>,
        /// Paths of the files to attach
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List one page of a collection
    List {
        /// users, sellers, products, sell-offers, referrals, notifications, email-campaigns
        resource: Resource,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        limit: u32,
        #[arg(long)]
        search: Option<String>,
    },
    /// Get a single record by ID
    Get { resource: Resource, id: String },
    /// Delete a record by ID
    Delete { resource: Resource, id: String },
}

/// Log every session transition until the store is dropped.
fn watch_session(session: &SessionStore) {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if rx.borrow_and_update().is_some() {
                tracing::info!("Session updated");
            } else {
                tracing::warn!("Session cleared");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let client = ApiClient::from_env()
        .context("Failed to create API client. Set BAZAAR_API_URL (or API_URL)")?;
    watch_session(client.session());

    let cli = Cli::parse();

    match cli.command {
        Commands::Login { email, password } => {
            let credential = client.login(&email, &password).await?;
            print_json(&credential)?;
        }
        Commands::Refresh => {
            let credential = client
                .refresh()
                .await
                .context("Refresh failed. Set BAZAAR_REFRESH_TOKEN")?;
            print_json(&credential)?;
        }
        Commands::Upload { files } => {
            let mut urls = Vec::with_capacity(files.len());
            for path in &files {
                let url = client
                    .upload_from_disk(path)
                    .await
                    .with_context(|| format!("Upload {}", path.display()))?;
                urls.push(json!({ "file": path.display().to_string(), "url": url }));
            }
            print_json(&urls)?;
        }
        Commands::Attach {
            field,
            list,
            max,
            record,
            accept,
            files,
        } => {
            let target = if list {
                UploadTarget::list(field, max)
            } else {
                UploadTarget::scalar(field)
            };
            let record = parse_record(record.as_deref())?;

            let widget = FileUploader::new(
                target,
                FormValues::from_record(&record),
                Arc::new(client.clone()),
            )
            .with_accept(AcceptFilter::parse(accept.as_deref().unwrap_or_default()));

            let mut selected = Vec::with_capacity(files.len());
            for path in &files {
                let file = read_local_file(path).await?;
                if widget.accepts(&file) {
                    selected.push(file);
                } else {
                    tracing::warn!(
                        file_name = %file.name,
                        accept = ?widget.accept().patterns(),
                        "File type not accepted, skipping"
                    );
                }
            }
            anyhow::ensure!(!selected.is_empty(), "No accepted files to attach");
            let report = widget
                .select_files(selected)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            for failure in &report.failed {
                eprintln!("{}", failure.user_message());
            }

            print_json(&json!({
                "form": widget.form(),
                "attachments": widget.attachments(),
                "failed": report.failed.len(),
            }))?;
        }
        Commands::List {
            resource,
            page,
            limit,
            search,
        } => {
            let mut query = ListQuery::default().page(page).limit(limit);
            if let Some(search) = search {
                query = query.search(search);
            }
            let response = client.list_records::<Value>(resource, &query).await?;
            print_json(&response)?;
        }
        Commands::Get { resource, id } => {
            let response: Value = client.get_record(resource, &id).await?;
            print_json(&response)?;
        }
        Commands::Delete { resource, id } => {
            client.delete_record(resource, &id).await?;
            print_json(&json!({ "deleted": id, "resource": resource }))?;
        }
    }

    Ok(())
}
