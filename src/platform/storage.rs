use log::debug;
use reqwest::{header::CONTENT_TYPE, Client, Url};

use crate::error::{AuthError, Error};

#[rocket::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path`, replacing anything already there, and return its public URL.
    async fn upload(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, Error>;

    /// The URL anyone can fetch the object at `path` from.
    fn public_url(&self, path: &str) -> String;
}

/// The hosted platform's storage API, scoped to one bucket.
pub struct HostedStorage {
    client: Client,
    base: Url,
    key: String,
    bucket: String,
}

impl HostedStorage {
    pub fn new(client: Client, base: Url, key: String, bucket: String) -> Self {
        Self {
            client,
            base,
            key,
            bucket,
        }
    }
}

#[rocket::async_trait]
impl ObjectStorage for HostedStorage {
    async fn upload(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, Error> {
        let url = self
            .base
            .join(&format!("storage/v1/object/{}/{path}", self.bucket))
            .map_err(|e| AuthError::Unknown(format!("bad storage path {path}: {e}")))?;
        debug!("Uploading {} bytes to {url}", bytes.len());
        self.client
            .post(url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}storage/v1/object/public/{}/{path}",
            self.base, self.bucket
        )
    }
}
