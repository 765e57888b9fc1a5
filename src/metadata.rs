use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const TVDB_API: &str = "https://api4.thetvdb.com/v4";
const USER_AGENT: &str = concat!("immersion-tracker/", env!("CARGO_PKG_VERSION"));
const SUCCESS: &str = "success";

/// Series fields we keep from TheTVDB
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    apikey: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pin: Option<&'a str>,
}

/// TheTVDB wraps every payload as `{ "status": ..., "data": ... }`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

/// Client for TheTVDB v4 API
#[derive(Debug, Clone)]
pub struct TvdbClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    pin: Option<String>,
}

impl TvdbClient {
    pub fn new(base_url: &str, api_key: Option<String>, pin: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("build tvdb http client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            pin,
        })
    }

    /// Exchange the API key for a bearer token
    pub async fn login(&self) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no TVDB API key configured"))?;

        let url = format!("{}/login", self.base_url);
        debug!("TVDB login at {}", url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                apikey: api_key,
                pin: self.pin.as_deref(),
            })
            .send()
            .await
            .context("Failed to reach TVDB login")?;

        if !response.status().is_success() {
            warn!("TVDB login returned {}", response.status());
            return Err(anyhow!("TVDB login failed: {}", response.status()));
        }

        let envelope: Envelope<LoginData> = response.json().await.context("parse TVDB login")?;
        if envelope.status != SUCCESS {
            return Err(anyhow!("TVDB login status: {}", envelope.status));
        }

        envelope
            .data
            .map(|d| d.token)
            .ok_or_else(|| anyhow!("TVDB login returned no token"))
    }

    /// Fetch the name and cover image of a series
    pub async fn series(&self, token: &str, tvdb_id: i64) -> Result<SeriesMetadata> {
        let url = format!("{}/series/{}", self.base_url, tvdb_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach TVDB series lookup")?;

        if !response.status().is_success() {
            warn!("TVDB series {} returned {}", tvdb_id, response.status());
            return Err(anyhow!("TVDB series lookup failed: {}", response.status()));
        }

        let envelope: Envelope<SeriesMetadata> =
            response.json().await.context("parse TVDB series")?;
        if envelope.status != SUCCESS {
            return Err(anyhow!("TVDB series status: {}", envelope.status));
        }

        let series = envelope.data.unwrap_or_default();
        info!(
            "TVDB series {} resolved to {}",
            tvdb_id,
            series.name.as_deref().unwrap_or("<unnamed>")
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_omits_missing_pin() {
        let body = serde_json::to_value(LoginRequest {
            apikey: "key",
            pin: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "apikey": "key" }));
    }

    #[test]
    fn test_series_envelope_with_missing_fields() {
        let envelope: Envelope<SeriesMetadata> =
            serde_json::from_str(r#"{"status":"success","data":{"id":81189,"name":"Breaking Bad"}}"#)
                .unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.name.as_deref(), Some("Breaking Bad"));
        assert!(data.image.is_none());
    }

    #[test]
    fn test_failure_envelope() {
        let envelope: Envelope<LoginData> =
            serde_json::from_str(r#"{"status":"failure","message":"Unauthorized","data":null}"#)
                .unwrap();
        assert_eq!(envelope.status, "failure");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = TvdbClient::new("http://localhost:9/v4/", None, None).unwrap();
        assert_eq!(client.base_url, "http://localhost:9/v4");
    }

    #[tokio::test]
    async fn test_login_without_key_fails() {
        let client = TvdbClient::new(TVDB_API, None, None).unwrap();
        let err = client.login().await.unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}
