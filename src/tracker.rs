//! Client for the Wise Old Man tracking service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;
use url::Url;

use crate::config::TrackerConfig;
use crate::error::ExternalServiceError;

const SERVICE: &str = "wiseoldman";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAccount {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCompetition {
    pub external_id: i64,
    pub verification_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddParticipantsResult {
    pub count: i64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Progress {
    pub start: i64,
    pub end: i64,
    pub gained: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub account_name: String,
    pub display_name: String,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standings {
    pub title: String,
    pub metric: String,
    /// In the order the service returned them.
    pub participations: Vec<Standing>,
}

#[async_trait]
pub trait TrackingService: Send + Sync {
    async fn get_account(&self, name: &str) -> Result<PlayerAccount, ExternalServiceError>;
    async fn refresh_account(&self, name: &str) -> Result<PlayerAccount, ExternalServiceError>;
    async fn create_competition(
        &self,
        title: &str,
        metric: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<CreatedCompetition, ExternalServiceError>;
    async fn add_participants(
        &self,
        external_id: i64,
        account_names: &[String],
        verification_secret: &str,
    ) -> Result<AddParticipantsResult, ExternalServiceError>;
    async fn get_standings(&self, external_id: i64) -> Result<Standings, ExternalServiceError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCompetitionBody<'a> {
    title: &'a str,
    metric: &'a str,
    starts_at: String,
    ends_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCompetitionResponse {
    competition: CompetitionSummary,
    verification_code: String,
}

#[derive(Deserialize)]
struct CompetitionSummary {
    id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddParticipantsBody<'a> {
    verification_code: &'a str,
    participants: &'a [String],
}

#[derive(Deserialize)]
struct CompetitionDetails {
    title: String,
    metric: String,
    #[serde(default)]
    participations: Vec<ParticipationDetails>,
}

#[derive(Deserialize)]
struct ParticipationDetails {
    player: ParticipantPlayer,
    #[serde(default)]
    progress: Option<Progress>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantPlayer {
    username: String,
    display_name: String,
}

impl From<CompetitionDetails> for Standings {
    fn from(value: CompetitionDetails) -> Self {
        Self {
            title: value.title,
            metric: value.metric,
            participations: value
                .participations
                .into_iter()
                .map(|p| Standing {
                    account_name: p.player.username,
                    display_name: p.player.display_name,
                    progress: p.progress.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

pub struct WiseOldManClient {
    client: Client,
    base_url: Url,
}

impl WiseOldManClient {
    pub fn new(config: &TrackerConfig) -> Result<Self, ExternalServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ExternalServiceError::from_reqwest(SERVICE, &e))?;
        let base_url = Url::parse(&config.base_url).map_err(|e| ExternalServiceError::Unreachable {
            service: SERVICE,
            message: format!("invalid base url: {e}"),
        })?;
        Ok(Self { client, base_url })
    }

    /// Appends percent-encoded path segments to the configured base url.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ExternalServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ExternalServiceError::Unreachable {
                service: SERVICE,
                message: format!("base url {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        missing: impl FnOnce() -> String,
    ) -> Result<T, ExternalServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ExternalServiceError::from_reqwest(SERVICE, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ExternalServiceError::NotFound {
                service: SERVICE,
                what: missing(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExternalServiceError::from_status(
                SERVICE,
                status.as_u16(),
                &body,
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ExternalServiceError::from_reqwest(SERVICE, &e))
    }
}

#[async_trait]
impl TrackingService for WiseOldManClient {
    async fn get_account(&self, name: &str) -> Result<PlayerAccount, ExternalServiceError> {
        debug!(account = name, "fetching player");
        let request = self.client.get(self.endpoint(&["players", name.trim()])?);
        self.send(request, || format!("player {name}")).await
    }

    async fn refresh_account(&self, name: &str) -> Result<PlayerAccount, ExternalServiceError> {
        debug!(account = name, "requesting player update");
        let request = self.client.post(self.endpoint(&["players", name.trim()])?);
        self.send(request, || format!("player {name}")).await
    }

    async fn create_competition(
        &self,
        title: &str,
        metric: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<CreatedCompetition, ExternalServiceError> {
        let body = CreateCompetitionBody {
            title,
            metric,
            starts_at: starts_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ends_at: ends_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        let request = self.client.post(self.endpoint(&["competitions"])?).json(&body);
        let created: CreateCompetitionResponse =
            self.send(request, || "competitions endpoint".to_string()).await?;
        Ok(CreatedCompetition {
            external_id: created.competition.id,
            verification_secret: created.verification_code,
        })
    }

    async fn add_participants(
        &self,
        external_id: i64,
        account_names: &[String],
        verification_secret: &str,
    ) -> Result<AddParticipantsResult, ExternalServiceError> {
        let body = AddParticipantsBody {
            verification_code: verification_secret,
            participants: account_names,
        };
        let id = external_id.to_string();
        let request = self
            .client
            .post(self.endpoint(&["competitions", &id, "participants"])?)
            .json(&body);
        self.send(request, || format!("competition {external_id}"))
            .await
    }

    async fn get_standings(&self, external_id: i64) -> Result<Standings, ExternalServiceError> {
        let id = external_id.to_string();
        let request = self.client.get(self.endpoint(&["competitions", &id])?);
        let details: CompetitionDetails = self
            .send(request, || format!("competition {external_id}"))
            .await?;
        Ok(details.into())
    }
}


#[cfg(test)]
mod tests {
    use super::{CompetitionDetails, CreateCompetitionResponse, Standings, WiseOldManClient};
    use crate::config::TrackerConfig;

    #[test]
    fn competition_details_map_to_standings_in_service_order() {
        let json = r#"{
            "id": 77,
            "title": "Skill of the Week - Woodcutting",
            "metric": "woodcutting",
            "participations": [
                {"playerId": 1, "player": {"username": "lynx titan", "displayName": "Lynx Titan"},
                 "progress": {"start": 10, "end": 50, "gained": 40}},
                {"playerId": 2, "player": {"username": "zezima", "displayName": "Zezima"}}
            ]
        }"#;
        let details: CompetitionDetails = serde_json::from_str(json).expect("decode");
        let standings: Standings = details.into();

        assert_eq!(standings.metric, "woodcutting");
        assert_eq!(standings.participations.len(), 2);
        assert_eq!(standings.participations[0].account_name, "lynx titan");
        assert_eq!(standings.participations[0].progress.gained, 40);
        assert_eq!(standings.participations[1].progress.gained, 0);
    }

    #[test]
    fn create_response_exposes_id_and_code() {
        let json = r#"{"competition": {"id": 5, "title": "t"}, "verificationCode": "111-222-333"}"#;
        let created: CreateCompetitionResponse = serde_json::from_str(json).expect("decode");
        assert_eq!(created.competition.id, 5);
        assert_eq!(created.verification_code, "111-222-333");
    }

    #[test]
    fn endpoints_percent_encode_names() {
        let mut config = TrackerConfig::default();
        config.base_url = "https://api.wiseoldman.net/v2/".to_string();
        let client = WiseOldManClient::new(&config).expect("client");

        let url = client.endpoint(&["players", "Lynx Titan"]).expect("url");
        assert_eq!(url.as_str(), "https://api.wiseoldman.net/v2/players/Lynx%20Titan");

        let url = client.endpoint(&["competitions", "12", "participants"]).expect("url");
        assert_eq!(url.as_str(), "https://api.wiseoldman.net/v2/competitions/12/participants");
    }
}
