use std::path::Path;

use reqwest::header::{ACCEPT, AUTHORIZATION};

use crate::error::{Result, ServiceError};

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    token: Option<&str>,
) -> Result<()> {
    tracing::info!(path = %path.display(), %url, "downloading");

    let mut request = client.get(url).header(ACCEPT, "application/octet-stream");
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(ServiceError::Upstream(format!(
            "failed to download {url}: {}",
            response.status()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = response.bytes().await?;
    tokio::fs::write(path, &bytes).await?;
    Ok(())
}

/// Downloads the frozen graph and class list when they are missing locally.
pub async fn ensure_files_exist(
    client: &reqwest::Client,
    files: &[(&Path, Option<&str>)],
    token: Option<&str>,
) -> Result<()> {
    tracing::info!("checking model files");
    for (path, url) in files {
        if path.exists() {
            continue;
        }
        let url = url.ok_or_else(|| {
            ServiceError::Config(format!(
                "{} is missing and no download URL is configured",
                path.display()
            ))
        })?;
        download_file(client, url, path, token).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn existing_files_are_not_downloaded() {
        let path = std::env::temp_dir().join("agro_service_rs_existing_model.pb");
        tokio::fs::write(&path, b"graph").await.unwrap();

        let client = reqwest::Client::new();
        ensure_files_exist(&client, &[(path.as_path(), None)], None)
            .await
            .unwrap();

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_without_url_is_a_config_error() {
        let path = std::env::temp_dir().join("agro_service_rs_missing/class_list.txt");
        let client = reqwest::Client::new();
        let err = ensure_files_exist(&client, &[(path.as_path(), None)], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }
}
