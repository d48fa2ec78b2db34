//! The datasets the companion app pulls from the GraphQL API

use super::PlayerContext;
use crate::cache::cache_key;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Tasks,
    Hideout,
    Items,
    Traders,
    Maps,
}

impl DataKind {
    pub const ALL: [DataKind; 5] = [
        DataKind::Tasks,
        DataKind::Hideout,
        DataKind::Items,
        DataKind::Traders,
        DataKind::Maps,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DataKind::Tasks => "tasks",
            DataKind::Hideout => "hideout",
            DataKind::Items => "items",
            DataKind::Traders => "traders",
            DataKind::Maps => "maps",
        }
    }

    /// Default cache lifetime; prices move fast, map layouts barely at all
    pub fn default_ttl(&self) -> Duration {
        match self {
            DataKind::Tasks => Duration::from_secs(10 * 60),
            DataKind::Hideout => Duration::from_secs(30 * 60),
            DataKind::Items => Duration::from_secs(5 * 60),
            DataKind::Traders => Duration::from_secs(15 * 60),
            DataKind::Maps => Duration::from_secs(60 * 60),
        }
    }

    /// Player fields that change the response for this kind
    fn relevant_params(&self) -> &'static [&'static str] {
        match self {
            DataKind::Tasks => &["game_mode", "faction", "level"],
            DataKind::Hideout => &["game_mode", "edition"],
            DataKind::Items | DataKind::Traders => &["game_mode"],
            DataKind::Maps => &[],
        }
    }

    /// Deterministic cache key for this kind under `context`
    pub fn cache_key(&self, context: &PlayerContext) -> String {
        let relevant = self.relevant_params();
        let params = context
            .params()
            .into_iter()
            .filter(|(name, _)| relevant.contains(name));
        cache_key(self.name(), params)
    }

    pub fn query(&self, context: &PlayerContext) -> String {
        let mode = context.game_mode.as_query_arg();
        match self {
            DataKind::Tasks => format!(
                "{{ tasks(gameMode: {mode}) {{ id name minPlayerLevel factionName kappaRequired trader {{ id name }} map {{ id name }} taskRequirements {{ task {{ id }} status }} objectives {{ id type description optional }} }} }}"
            ),
            DataKind::Hideout => format!(
                "{{ hideoutStations(gameMode: {mode}) {{ id name normalizedName levels {{ id level constructionTime itemRequirements {{ item {{ id name }} count }} stationLevelRequirements {{ station {{ id }} level }} }} }} }}"
            ),
            DataKind::Items => format!(
                "{{ items(gameMode: {mode}) {{ id name shortName basePrice avg24hPrice types iconLink }} }}"
            ),
            DataKind::Traders => format!(
                "{{ traders(gameMode: {mode}) {{ id name normalizedName levels {{ level requiredPlayerLevel requiredReputation requiredCommerce }} }} }}"
            ),
            DataKind::Maps => {
                "{ maps { id name normalizedName raidDuration players bosses { name spawnChance } } }"
                    .to_string()
            }
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        DataKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown data kind '{value}', expected one of: {}",
                    DataKind::ALL.map(|k| k.name()).join(", ")
                )
            })
    }
}
