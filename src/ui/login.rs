use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use log::{error, info};
use serde_json::Value;

use crate::api::client::ApiClient;
use crate::api::models::{TripPlanRequest, TripPlanResponse};
use crate::error::ClientError;
use crate::identity::Identity;
use crate::ui::sidebar::truncate;
use crate::utils::wrap_text;

pub const PLAN_FAILED: &str = "Failed to fetch recommendations. Please try again.";
pub const DEFAULT_USER_NAME: &str = "Vitor";

/// Top bar: product name on the left, avatar letter and name (or a sign-in
/// hint) on the right.
pub fn navbar(identity: Option<&Identity>, width: usize) -> Vec<String> {
    let right = match identity {
        Some(id) => format!("[{}] {} · tripper logout", id.initial(), id.display_name()),
        None => "Log In: tripper login --email <you@example.com>".to_string(),
    };
    let left = "Tripper";
    let pad = width.saturating_sub(left.len() + right.chars().count()).max(1);
    vec![
        truncate(&format!("{left}{}{right}", " ".repeat(pad)), width),
        "─".repeat(width),
    ]
}

/// The landing view shown when nobody is signed in.
pub fn render_landing(width: usize) -> Vec<String> {
    let mut lines = navbar(None, width);
    lines.push(String::new());
    lines.push("Tripper Chatbot".to_string());
    lines.push(String::new());
    lines.push("Perfect Outfits, Every Forecast".to_string());
    lines.extend(wrap_text(
        "Tell us about your trip, and our smart chatbot will suggest exactly what to pack.",
        width,
    ));
    lines.push(String::new());
    lines.push("Get Started: tripper login --email <you@example.com>".to_string());
    lines.push("Quick plan:  tripper plan \"<trip details>\"".to_string());
    lines.push(String::new());
    lines.push(format!(
        "© {} Tripper. All rights reserved.",
        Local::now().year()
    ));
    lines
}

/// One-shot recommendation request. Any failure collapses into the generic
/// retry message.
pub async fn request_plan(
    api: &ApiClient,
    trip_details: &str,
    user_name: &str,
) -> Result<TripPlanResponse, String> {
    let request = TripPlanRequest {
        trip_details: trip_details.to_string(),
        user_name: user_name.to_string(),
        generate_pdf: true,
    };
    api.trip_plan(&request).await.map_err(|e| {
        error!("trip plan request failed: {e}");
        PLAN_FAILED.to_string()
    })
}

pub fn render_plan(plan: &TripPlanResponse, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for (key, value) in &plan.details {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => continue,
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };
        lines.push(format!("{key}:"));
        for line in text.lines() {
            for wrapped in wrap_text(line, width.saturating_sub(2)) {
                lines.push(format!("  {wrapped}"));
            }
        }
    }
    if let Some(name) = &plan.pdf_file_name {
        lines.push(String::new());
        lines.push(format!("PDF ready: tripper download {name}"));
    }
    lines
}

/// Fetch a generated file and store it under `dir` with its original name.
pub async fn download(api: &ApiClient, name: &str, dir: &Path) -> Result<PathBuf, ClientError> {
    let bytes = api.download_file(name).await?;
    // only the final path component is used
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "download.pdf".into());
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    info!("downloaded {name} to {}", path.display());
    Ok(path)
}
