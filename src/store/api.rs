use crate::model::{NewRecord, Record, RecordKind};
use crate::store::StoreError;
use anyhow::{Context, Result};
use reqwest::{Client, Response, Url};
use std::time::Duration;

/// REST transport for one record collection rooted at `base_url` (e.g. `http://host:3000/stocks/`).
#[derive(Debug, Clone)]
pub struct RecordApi {
    pub http: Client,
    pub kind: RecordKind,
    base_url: Url,
}

impl RecordApi {
    pub fn new(
        kind: RecordKind,
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            kind,
            base_url: normalize_base(base_url)?,
        })
    }

    pub fn collection_url(&self) -> &Url {
        &self.base_url
    }

    pub fn item_url(&self, id: u64) -> Result<Url, StoreError> {
        self.base_url
            .join(&id.to_string())
            .map_err(|e| StoreError::new("UrlError", e.to_string()))
    }

    /// GET `/<type>/`
    pub async fn fetch_all(&self) -> Result<Vec<Record>, StoreError> {
        let resp = self.http.get(self.base_url.clone()).send().await?;
        let resp = check_status(resp).await?;
        resp.json::<Vec<Record>>()
            .await
            .map_err(|e| StoreError::new("DecodeError", e.to_string()))
    }

    /// POST `/<type>/`. The created record is returned when the backend echoes one.
    pub async fn create(&self, record: &NewRecord) -> Result<Option<Record>, StoreError> {
        let resp = self
            .http
            .post(self.base_url.clone())
            .json(record)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(echoed_record(resp).await)
    }

    /// PUT `/<type>/<id>`
    pub async fn update(&self, record: &Record) -> Result<Option<Record>, StoreError> {
        let resp = self
            .http
            .put(self.item_url(record.id)?)
            .json(record)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(echoed_record(resp).await)
    }

    /// DELETE `/<type>/<id>`
    pub async fn delete(&self, id: u64) -> Result<(), StoreError> {
        let resp = self.http.delete(self.item_url(id)?).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

// Item URLs are formed by joining the id, which only works when the base ends with '/'.
fn normalize_base(base_url: &str) -> Result<Url> {
    let mut s = base_url.trim().to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    Url::parse(&s).with_context(|| format!("invalid base url: {base_url}"))
}

async fn check_status(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().clone();
    let body = resp.text().await.unwrap_or_default();
    let mut message = format!("Http failure response for {url}: {status}");
    let body = body.trim();
    if !body.is_empty() {
        message.push_str(" - ");
        message.push_str(&body.chars().take(200).collect::<String>());
    }
    Err(StoreError::new("HttpErrorResponse", message))
}

// Backends differ in what they echo back; anything that is not a record is ignored.
async fn echoed_record(resp: Response) -> Option<Record> {
    let bytes = resp.bytes().await.ok()?;
    serde_json::from_slice::<Record>(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let api = RecordApi::new(
            RecordKind::Stocks,
            "http://localhost:3000/stocks",
            "t",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(api.collection_url().as_str(), "http://localhost:3000/stocks/");
        assert_eq!(
            api.item_url(7).unwrap().as_str(),
            "http://localhost:3000/stocks/7"
        );
    }

    #[test]
    fn rejects_garbage_url() {
        assert!(RecordApi::new(RecordKind::Brokers, "not a url", "t", Duration::from_secs(1)).is_err());
    }
}
