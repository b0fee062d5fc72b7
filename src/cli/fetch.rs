use reqwest::Url;
use serde_json::Value;

use crate::error::{RelayError, Result};

/// Print all scans, or one scan, from a running web server.
pub async fn run_fetch(base_url: &str, scan_id: Option<&str>) -> Result<()> {
    let body = fetch_scans(base_url, scan_id).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// GET `/api/scans` or `/api/scans/{id}` and return the decoded body.
pub async fn fetch_scans(base_url: &str, scan_id: Option<&str>) -> Result<Value> {
    let url = scans_url(base_url, scan_id)?;
    let response = reqwest::get(url).await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RelayError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<Value>().await?)
}

fn scans_url(base_url: &str, scan_id: Option<&str>) -> Result<Url> {
    let invalid = |reason: String| RelayError::InvalidConfig {
        reason: format!("invalid server url {base_url:?}: {reason}"),
    };

    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| invalid("cannot be a base".into()))?;
        segments.pop_if_empty().extend(["api", "scans"]);
        if let Some(id) = scan_id {
            segments.push(id);
        }
    }
    Ok(url)
}
