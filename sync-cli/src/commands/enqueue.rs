//! Queue a request for later replay.

use anyhow::{Context, Result};
use offline_sync_client::{ClientConfig, QueueStore, SqliteQueueStore, Submission};
use offline_sync_core::FormEncoding;
use offline_sync_types::{ActionId, ActionType, HttpMethod};

/// Arguments of the enqueue command.
#[derive(Debug, Clone)]
pub struct Request {
    /// Target URL.
    pub url: String,
    /// Symbolic action type.
    pub action_type: String,
    /// HTTP method name.
    pub method: String,
    /// `name=value` pairs.
    pub fields: Vec<String>,
    /// `Name: value` pairs.
    pub headers: Vec<String>,
    /// JSON body instead of URL-encoded.
    pub json: bool,
}

/// Run the enqueue command.
pub async fn run(config: &ClientConfig, request: Request) -> Result<ActionId> {
    let method: HttpMethod = request.method.parse()?;

    let encoding = if request.json {
        FormEncoding::Json
    } else {
        FormEncoding::UrlEncoded
    };
    let mut submission = Submission::new(method, &request.url).with_encoding(encoding);
    for field in &request.fields {
        let (name, value) = parse_field(field)?;
        submission = submission.field(name, value);
    }

    let mut action = submission.to_action(ActionType::from(request.action_type.as_str()))?;
    for header in &request.headers {
        let (name, value) = parse_header(header)?;
        action = action.with_header(name, value);
    }

    let store = SqliteQueueStore::new(&config.store.database);
    let id = store
        .append(action)
        .await
        .context("Failed to queue action")?;

    println!("Queued action {} ({} {})", id, method, request.url);
    Ok(id)
}

/// Split `name=value`. The value may itself contain `=`.
fn parse_field(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .with_context(|| format!("Invalid field '{}', expected name=value", raw))
}

/// Split `Name: value`.
fn parse_header(raw: &str) -> Result<(&str, &str)> {
    raw.split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .with_context(|| format!("Invalid header '{}', expected \"Name: value\"", raw))
}
