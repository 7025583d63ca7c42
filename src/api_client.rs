use entities::song::Song;
use log::{error, info};
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unexpected status code: {0}")]
    UnexpectedStatus(StatusCode),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Client for the external song metadata API.
#[derive(Clone)]
pub struct InfoClient {
    domain: String,
    client: reqwest::Client,
}

impl InfoClient {
    pub fn new(cfg: &ApiConfig) -> Self {
        Self {
            domain: cfg.domain.to_owned(),
            client: reqwest::Client::new(),
        }
    }

    fn info_request(&self, group: &str, song: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/info", self.domain))
            .query(&[("group", group), ("song", song)])
    }

    /// Fetches enrichment data for a song. Any non-200 status, network or
    /// decode failure is a hard error; there is no retry.
    pub async fn get_info(&self, group: &str, song: &str) -> Result<Song, ApiError> {
        info!("Fetching info for {:?} by {:?}", song, group);
        let response = self.info_request(group, song).send().await?;
        if response.status() != StatusCode::OK {
            error!("Info endpoint answered {}", response.status());
            return Err(ApiError::UnexpectedStatus(response.status()));
        }
        Ok(response.json::<Song>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_request_encodes_query_params() {
        let client = InfoClient::new(&ApiConfig {
            domain: "http://example.com".to_string(),
        });
        let request = client
            .info_request("Muse", "Supermassive Black Hole")
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://example.com/info?group=Muse&song=Supermassive+Black+Hole"
        );
    }
}
