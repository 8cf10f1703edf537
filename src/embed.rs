//! Conversion of result URLs into inline base64 images.

use crate::error::{NovitaError, Result};
use base64::Engine;
use futures_util::future::try_join_all;

/// Downloads `url` and returns its bytes base64-encoded (standard alphabet,
/// no `data:` prefix).
///
/// Result URLs are pre-signed storage links, so no service headers are sent.
pub async fn read_img_to_base64(http: &reqwest::Client, url: &str) -> Result<String> {
    let response = http.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(NovitaError::new(
            i64::from(status.as_u16()),
            format!("Failed to download image {}: status {}", url, status),
        ));
    }

    let bytes = response.bytes().await?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&bytes))
}

/// Encodes every URL concurrently. The output order matches `urls`
/// whatever order the downloads finish in; the first failure aborts the rest.
pub async fn read_imgs_to_base64(http: &reqwest::Client, urls: &[String]) -> Result<Vec<String>> {
    try_join_all(urls.iter().map(|url| read_img_to_base64(http, url))).await
}
