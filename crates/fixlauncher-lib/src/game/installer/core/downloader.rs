use crate::game::installer::config::{
    download_idle_timeout, json_timeout, DOWNLOAD_RETRIES, MAX_REDIRECTS, PROBE_TIMEOUT_SECS,
    USER_AGENT,
};
use crate::game::installer::types::ProgressReporter;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::{create_dir_all, File};
use tokio::io::AsyncWriteExt;

// NOTE: Retry delay is a base value; we apply a simple linear backoff (delay * attempt).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// What `download_to_path` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was already present; nothing was requested.
    Skipped,
    /// The file was fetched; carries the byte count.
    Downloaded(u64),
}

/// Shared HTTP client: bounded redirects, connect timeout, launcher UA.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .context("Failed to create HTTP client")
}

/// Send a GET, giving up when no response headers arrive within `idle`.
async fn send_within(client: &Client, url: &str, idle: Duration) -> Result<reqwest::Response> {
    match tokio::time::timeout(idle, client.get(url).send()).await {
        Ok(response) => Ok(response?),
        Err(_) => anyhow::bail!("No response from {} within {}s", url, idle.as_secs_f32()),
    }
}

/// Next body chunk, or an error when the server stays silent for `idle`.
/// Slow but steady transfers are never cut off.
async fn next_chunk<S, B>(stream: &mut S, url: &str, idle: Duration) -> Result<Option<B>>
where
    S: futures::Stream<Item = reqwest::Result<B>> + Unpin,
{
    match tokio::time::timeout(idle, stream.next()).await {
        Ok(Some(chunk)) => Ok(Some(chunk?)),
        Ok(None) => Ok(None),
        Err(_) => anyhow::bail!("Download of {} stalled for {}s", url, idle.as_secs_f32()),
    }
}

/// Download a file to a path with progress reporting, SHA1 validation, and retry logic.
///
/// Files that already exist are never re-requested or re-hashed.
pub async fn download_to_path(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
    reporter: &dyn ProgressReporter,
) -> Result<DownloadOutcome> {
    if path.exists() {
        log::trace!("Already present, skipping: {:?}", path);
        return Ok(DownloadOutcome::Skipped);
    }

    log::debug!("Downloading: {} -> {:?}", url, path);

    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let mut retries = 0;
    loop {
        match download_with_validation(
            client,
            url,
            path,
            expected_sha1,
            reporter,
            download_idle_timeout(),
        )
        .await
        {
            Ok(bytes) => {
                log::debug!("Download complete: {:?}", path);
                return Ok(DownloadOutcome::Downloaded(bytes));
            }
            Err(e) => {
                retries += 1;
                if retries >= DOWNLOAD_RETRIES || reporter.is_cancelled() {
                    log::error!("Download failed after {} attempts: {:#}", retries, e);
                    return Err(e).with_context(|| {
                        format!("Failed to download {} after {} attempts", url, retries)
                    });
                }
                log::warn!(
                    "Download failed (attempt {}/{}): {:#}. Retrying...",
                    retries,
                    DOWNLOAD_RETRIES,
                    e
                );
                tokio::time::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS * retries as u64))
                    .await;
            }
        }
    }
}

async fn download_with_validation(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
    reporter: &dyn ProgressReporter,
    idle: Duration,
) -> Result<u64> {
    let start = Instant::now();
    let response = send_within(client, url, idle).await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }

    let total_size = response.content_length();

    // Write to a temporary file first, then rename onto the final path so a
    // failed transfer never leaves a file that would pass the existence check.
    let tmp_name = format!(
        "{}.part",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    );
    let tmp_path = path.with_file_name(tmp_name);
    let mut file = File::create(&tmp_path)
        .await
        .with_context(|| format!("Failed to create {:?}", tmp_path))?;
    let mut downloaded: u64 = 0;
    let mut hasher = Sha1::new();

    let mut stream = response.bytes_stream();
    loop {
        let next = next_chunk(&mut stream, url, idle).await;
        if reporter.is_cancelled() {
            drop(file);
            let _ = tokio::fs::remove_file(&tmp_path).await;
            anyhow::bail!("Download cancelled");
        }

        let chunk = match next {
            Ok(Some(c)) => c,
            Ok(None) => break,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e);
            }
        };
        file.write_all(&chunk).await?;
        hasher.update(&chunk);

        downloaded += chunk.len() as u64;
        reporter.update_bytes(downloaded, total_size);
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Some(expected) = expected_sha1 {
        let computed = format!("{:x}", hasher.finalize());
        if !computed.eq_ignore_ascii_case(expected) {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            anyhow::bail!(
                "SHA1 mismatch for {}: expected {}, got {}",
                url,
                expected,
                computed
            );
        }
        log::trace!("SHA1 validated: {}", computed);
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move {:?} into place", tmp_path))?;

    let secs = start.elapsed().as_secs_f64();
    log::debug!(
        "Download stats: url={}, size={} bytes, time={:.2}s, throughput={:.2} MB/s",
        url,
        downloaded,
        secs,
        (downloaded as f64 / 1024.0 / 1024.0) / secs.max(0.001)
    );

    Ok(downloaded)
}

/// Download a file to memory using an existing Client and return the bytes
pub async fn download_to_memory(
    client: &Client,
    url: &str,
    expected_sha1: Option<&str>,
) -> Result<Vec<u8>> {
    let mut retries = 0;
    loop {
        match download_to_memory_internal(client, url, expected_sha1, download_idle_timeout()).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                retries += 1;
                if retries >= DOWNLOAD_RETRIES {
                    return Err(e).with_context(|| {
                        format!("Failed to download {} after {} attempts", url, retries)
                    });
                }
                log::warn!(
                    "Download failed (attempt {}/{}): {:#}. Retrying...",
                    retries,
                    DOWNLOAD_RETRIES,
                    e
                );
                tokio::time::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS * retries as u64))
                    .await;
            }
        }
    }
}

async fn download_to_memory_internal(
    client: &Client,
    url: &str,
    expected_sha1: Option<&str>,
    idle: Duration,
) -> Result<Vec<u8>> {
    log::debug!("Downloading to memory: {}", url);

    let response = send_within(client, url, idle).await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }

    let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();
    while let Some(chunk) = next_chunk(&mut stream, url, idle).await? {
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_sha1 {
        let computed = sha1_hex(&bytes);
        if !computed.eq_ignore_ascii_case(expected) {
            anyhow::bail!(
                "SHA1 mismatch for {}: expected {}, got {}",
                url,
                expected,
                computed
            );
        }
    }

    Ok(bytes)
}

/// Fetch a JSON document. Single-shot: no retry, failures propagate.
pub async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    log::debug!("Fetching JSON: {}", url);
    let response = client
        .get(url)
        .timeout(json_timeout())
        .send()
        .await
        .with_context(|| format!("Request to {} failed", url))?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }

    let data = response
        .json()
        .await
        .with_context(|| format!("Invalid JSON from {}", url))?;
    Ok(data)
}

/// Like `fetch_json` but any failure becomes `None` (logged), with the
/// short probe timeout. For lookups where an absent answer is acceptable.
pub async fn fetch_optional_json<T: DeserializeOwned>(client: &Client, url: &str) -> Option<T> {
    let request = client
        .get(url)
        .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS));
    let result: Result<T> = async {
        let response = request.send().await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP error {}", response.status());
        }
        Ok(response.json().await?)
    }
    .await;

    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Request to {} failed: {:#}", url, e);
            None
        }
    }
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Git blob id of `bytes` (`sha1("blob <len>\0" + bytes)`).
pub fn git_blob_sha(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", bytes.len()).as_bytes());
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::installer::types::SilentProgressReporter;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn downloads_once_then_skips() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lib.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("nested/lib.jar");
        let client = build_client().unwrap();
        let url = format!("{}/lib.jar", server.uri());
        let sha = sha1_hex(b"jar-bytes");

        let first = download_to_path(&client, &url, &dest, Some(&sha), &SilentProgressReporter)
            .await
            .unwrap();
        assert_eq!(first, DownloadOutcome::Downloaded(9));
        assert_eq!(std::fs::read(&dest).unwrap(), b"jar-bytes");

        let second = download_to_path(&client, &url, &dest, Some(&sha), &SilentProgressReporter)
            .await
            .unwrap();
        assert_eq!(second, DownloadOutcome::Skipped);
    }

    #[tokio::test]
    async fn sha_mismatch_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tampered".to_vec()))
            .mount(&server)
            .await;

        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("bad.jar");
        let client = build_client().unwrap();
        let url = format!("{}/bad.jar", server.uri());

        let result = download_to_path(
            &client,
            &url,
            &dest,
            Some("0000000000000000000000000000000000000000"),
            &SilentProgressReporter,
        )
        .await;
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!tmp.path().join("bad.jar.part").exists());
    }

    #[tokio::test]
    async fn follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("{}/new", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let value: serde_json::Value = fetch_json(&client, &format!("{}/old", server.uri()))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn optional_json_swallows_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let value: Option<serde_json::Value> =
            fetch_optional_json(&client, &format!("{}/x", server.uri())).await;
        assert!(value.is_none());
    }

    /// Serve `body` one byte at a time with `gap` between bytes. With
    /// `stall_after` the connection goes silent after that many bytes.
    async fn trickle_server(body: &'static [u8], gap: Duration, stall_after: Option<usize>) -> String {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.set_nodelay(true).unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for (i, byte) in body.iter().enumerate() {
                if stall_after == Some(i) {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                if socket.write_all(&[*byte]).await.is_err() {
                    return;
                }
                tokio::time::sleep(gap).await;
            }
        });
        format!("http://{}/file.bin", addr)
    }

    #[tokio::test]
    async fn slow_steady_transfer_is_not_cut_off() {
        let body: &'static [u8] = b"0123456789";
        let url = trickle_server(body, Duration::from_millis(100), None).await;
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("file.bin");

        // ~1s in total, but never more than 100ms without data
        let written = download_with_validation(
            &build_client().unwrap(),
            &url,
            &dest,
            Some(&sha1_hex(body)),
            &SilentProgressReporter,
            Duration::from_millis(400),
        )
        .await
        .unwrap();
        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn slow_steady_transfer_to_memory() {
        let body: &'static [u8] = b"jdk-archive";
        let url = trickle_server(body, Duration::from_millis(80), None).await;
        let bytes = download_to_memory_internal(
            &build_client().unwrap(),
            &url,
            None,
            Duration::from_millis(400),
        )
        .await
        .unwrap();
        assert_eq!(bytes, body);
    }

    #[tokio::test]
    async fn stalled_transfer_fails_and_cleans_up() {
        let url = trickle_server(b"0123456789", Duration::from_millis(10), Some(3)).await;
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("file.bin");

        let start = Instant::now();
        let result = download_with_validation(
            &build_client().unwrap(),
            &url,
            &dest,
            None,
            &SilentProgressReporter,
            Duration::from_millis(300),
        )
        .await;
        assert!(format!("{:#}", result.unwrap_err()).contains("stalled"));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!dest.exists());
        assert!(!tmp.path().join("file.bin.part").exists());
    }

    #[test]
    fn git_blob_sha_matches_git() {
        // `printf 'hello\n' | git hash-object --stdin`
        assert_eq!(
            git_blob_sha(b"hello\n"),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }
}
