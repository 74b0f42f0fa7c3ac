use anyhow::{Context, Result};
use std::io::Write;

use crate::client::{Client, ListOptions};
use crate::request::RequestOptions;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exponent = (bytes_f64.ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);

    let value = bytes_f64 / 1024_f64.powi(exponent as i32);

    if exponent == 0 {
        format!("{} {}", bytes, UNITS[exponent])
    } else {
        format!("{:.2} {}", value, UNITS[exponent])
    }
}

/// List containers, or blobs in a container page by page
pub async fn cmd_ls(client: &Client, container: Option<&str>, prefix: Option<&str>, recursive: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());

    let Some(container) = container else {
        for entry in client.list_containers().await? {
            writeln!(out, "{:<24} {}/", entry.created.as_deref().unwrap_or("-"), entry.name)?;
        }
        out.flush()?;
        return Ok(());
    };

    let mut options = ListOptions {
        prefix: prefix.map(str::to_string),
        delimiter: if recursive { None } else { Some("/".to_string()) },
        ..Default::default()
    };

    loop {
        let listing = client.list_blobs(container, &options).await?;
        for dir in &listing.dir_names {
            writeln!(out, "{:<24} {:>12} {}", "", "DIR", dir)?;
        }
        for blob in &listing.blobs {
            writeln!(
                out,
                "{:<24} {:>12} {}",
                blob.last_modified.as_deref().unwrap_or("-"),
                format_bytes(blob.size),
                blob.name
            )?;
        }

        // Without a delimiter the last key is the marker; with one, the
        // greater of the last key and the last prefix.
        let last = listing
            .blobs
            .last()
            .map(|b| b.name.clone())
            .into_iter()
            .chain(listing.dir_names.last().cloned())
            .max();
        match last {
            Some(marker) if listing.has_next => options.marker = Some(marker),
            _ => break,
        }
    }

    out.flush()?;
    Ok(())
}

/// Make container command
pub async fn cmd_mb(client: &Client, container: &str) -> Result<()> {
    let status = client.create_container(container).await?;
    if status.already_created {
        println!("Container already exists: {}", status.name);
    } else {
        println!("Container created: {}", status.name);
    }
    Ok(())
}

/// Remove container command
pub async fn cmd_rb(client: &Client, container: &str) -> Result<()> {
    let status = client.delete_container(container).await?;
    if status.not_found {
        println!("Container not found: {}", status.name);
    } else {
        println!("Container removed: {}", status.name);
    }
    Ok(())
}

/// Show blob info
pub async fn cmd_head(client: &Client, container: &str, blob: &str) -> Result<()> {
    let meta = client.head_blob(container, blob).await?;

    println!("Blob: {}/{}", container, blob);
    if let Some(size) = meta.headers.get("content-length").and_then(|s| s.parse::<u64>().ok()) {
        println!("Size: {} ({})", format_bytes(size), size);
    }
    for (label, key) in [("Content-Type", "content-type"), ("Last Modified", "last-modified"), ("ETag", "etag")] {
        if let Some(value) = meta.headers.get(key) {
            println!("{}: {}", label, value);
        }
    }
    for (key, value) in &meta.metadata {
        println!("Meta {}: {}", key, value);
    }
    Ok(())
}

/// Download a blob to a local file
pub async fn cmd_get(client: &Client, container: &str, blob: &str, file: &str) -> Result<()> {
    let mut transfer = client.get_blob_to_file(container, blob, file, &RequestOptions::default())?;
    transfer
        .end()
        .await
        .context("Transfer already started")?
        .with_context(|| format!("Failed to download {}/{}", container, blob))?;

    println!("Downloaded: {}/{} -> {}", container, blob, file);
    Ok(())
}

/// Upload a local file to a blob
pub async fn cmd_put(
    client: &Client,
    container: &str,
    blob: &str,
    file: &str,
    content_type: Option<&str>,
    metadata: &[(String, String)],
) -> Result<()> {
    let mut extra = RequestOptions::default();
    if let Some(content_type) = content_type {
        extra = extra.header("content-type", content_type);
    }
    for (key, value) in metadata {
        extra = extra.metadata(key, value);
    }

    let mut transfer = client.put_blob_from_file(container, blob, file, &extra)?;
    transfer
        .end()
        .await
        .context("Transfer already started")?
        .with_context(|| format!("Failed to upload {} to {}/{}", file, container, blob))?;

    println!("Uploaded: {} -> {}/{}", file, container, blob);
    Ok(())
}

/// Remove blob command
pub async fn cmd_rm(client: &Client, container: &str, blob: &str) -> Result<()> {
    let status = client.delete_blob(container, blob).await?;
    if status.not_found {
        println!("Blob not found: {}/{}", container, status.name);
    } else {
        println!("Removed: {}/{}", container, status.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024 * 3), "3.00 MB");
    }
}
