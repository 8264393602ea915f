use std::time::Duration;

use thiserror::Error;

use crate::wire::Scoreboard;

/// The feed's season-type code for the NFL regular season.
pub const REGULAR_SEASON: i32 = 2;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("remote returned status {code} for {url}")]
    RemoteStatus { url: String, code: u16 },

    #[error("empty scoreboard payload from {url}")]
    EmptyPayload { url: String },

    #[error("failed to decode scoreboard payload from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Thin client for the external NFL scoreboard endpoint. Never retries;
/// retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct ScoreboardClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl ScoreboardClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch the scoreboard for one week. A response without events counts
    /// as `EmptyPayload`; there is nothing to ingest from it.
    pub async fn get_scoreboard(
        &self,
        week: i32,
        season_type: i32,
    ) -> Result<Scoreboard, ApiError> {
        let url = format!(
            "{}/scoreboard?week={week}&seasontype={season_type}",
            self.base_url
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RemoteStatus {
                url,
                code: status.as_u16(),
            });
        }

        let scoreboard: Scoreboard =
            response
                .json()
                .await
                .map_err(|source| ApiError::Decode {
                    url: url.clone(),
                    source,
                })?;

        match &scoreboard.events {
            Some(events) if !events.is_empty() => Ok(scoreboard),
            _ => Err(ApiError::EmptyPayload { url }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_EVENT: &str = r#"{
        "season": {"year": 2025},
        "week": {"number": 1},
        "events": [{
            "id": "401547401",
            "name": "Dallas Cowboys at Philadelphia Eagles",
            "date": "2025-09-04T17:00Z",
            "competitions": [{
                "date": "2025-09-04T17:00:00Z",
                "competitors": [
                    {"homeAway": "home", "team": {"displayName": "Philadelphia Eagles"}, "score": "24"},
                    {"homeAway": "away", "team": {"displayName": "Dallas Cowboys"}, "score": "20"}
                ]
            }]
        }]
    }"#;

    #[tokio::test]
    async fn fetches_and_decodes_a_scoreboard() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/scoreboard")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("week".into(), "1".into()),
                mockito::Matcher::UrlEncoded("seasontype".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ONE_EVENT)
            .create_async()
            .await;

        let client = ScoreboardClient::new(server.url());
        let scoreboard = client.get_scoreboard(1, REGULAR_SEASON).await.unwrap();

        mock.assert_async().await;
        assert_eq!(scoreboard.season.unwrap().year, Some(2025));
        let events = scoreboard.events.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_deref(), Some("401547401"));
    }

    #[tokio::test]
    async fn non_200_status_is_a_typed_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("^/scoreboard".into()))
            .with_status(503)
            .create_async()
            .await;

        let client = ScoreboardClient::new(server.url());
        let err = client.get_scoreboard(3, REGULAR_SEASON).await.unwrap_err();
        assert!(matches!(err, ApiError::RemoteStatus { code: 503, .. }));
    }

    #[tokio::test]
    async fn missing_events_are_an_empty_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("^/scoreboard".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"events": []}"#)
            .create_async()
            .await;

        let client = ScoreboardClient::new(server.url());
        let err = client.get_scoreboard(1, REGULAR_SEASON).await.unwrap_err();
        assert!(matches!(err, ApiError::EmptyPayload { .. }));
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("^/scoreboard".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{not json")
            .create_async()
            .await;

        let client = ScoreboardClient::new(server.url());
        let err = client.get_scoreboard(1, REGULAR_SEASON).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
