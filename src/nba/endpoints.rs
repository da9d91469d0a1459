// NBA API endpoint functions.
// Maps each domain query to an endpoint path plus the parameters the caller supplied.

use serde_json::Value;

use crate::cache::CacheStorage;
use crate::error::Result;

use super::cached_client::CachedNbaClient;

/// Query parameters for the games listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GamesQuery {
  /// `YYYY-MM-DD`
  pub date: Option<String>,
  pub team_id: Option<u64>,
}

impl<S: CacheStorage> CachedNbaClient<S> {
  async fn get(&self, endpoint: &str, params: &[(&str, Value)]) -> Result<Value> {
    self.request(endpoint, params, self.force_refresh()).await
  }

  /// Get all teams.
  pub async fn get_teams(&self) -> Result<Value> {
    self.get("teams", &[]).await
  }

  /// Get a single team.
  pub async fn get_team(&self, team_id: u64) -> Result<Value> {
    self.get(&format!("teams/{}", team_id), &[]).await
  }

  /// Get games, optionally filtered by date and/or team.
  pub async fn get_games(&self, query: &GamesQuery) -> Result<Value> {
    let mut params = Vec::new();
    if let Some(date) = &query.date {
      params.push(("date", Value::from(date.as_str())));
    }
    if let Some(team_id) = query.team_id {
      params.push(("team", Value::from(team_id)));
    }

    self.get("games", &params).await
  }

  pub async fn get_game_details(&self, game_id: u64) -> Result<Value> {
    self.get(&format!("games/{}", game_id), &[]).await
  }

  /// Box score statistics for a game.
  pub async fn get_game_statistics(&self, game_id: u64) -> Result<Value> {
    self.get(&format!("statistics/games/{}", game_id), &[]).await
  }

  /// Get players, optionally filtered by team.
  pub async fn get_players(&self, team_id: Option<u64>) -> Result<Value> {
    let params: Vec<(&str, Value)> = team_id
      .map(|id| ("team", Value::from(id)))
      .into_iter()
      .collect();

    self.get("players", &params).await
  }

  pub async fn get_player(&self, player_id: u64) -> Result<Value> {
    self.get(&format!("players/{}", player_id), &[]).await
  }

  /// Get standings, optionally for one conference ("east" or "west").
  pub async fn get_standings(&self, conference: Option<&str>) -> Result<Value> {
    let params: Vec<(&str, Value)> = conference
      .map(|c| ("conference", Value::from(c)))
      .into_iter()
      .collect();

    self.get("standings", &params).await
  }
}
