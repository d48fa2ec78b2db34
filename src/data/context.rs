//! Player settings that change what the API returns

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Regular,
    Pve,
}

impl GameMode {
    /// Value of the GraphQL `gameMode` argument
    pub fn as_query_arg(&self) -> &'static str {
        match self {
            GameMode::Regular => "regular",
            GameMode::Pve => "pve",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Usec,
    Bear,
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Faction::Usec => write!(f, "usec"),
            Faction::Bear => write!(f, "bear"),
        }
    }
}

/// Caller context folded into cache keys so different players never share entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerContext {
    pub level: Option<u32>,
    pub faction: Option<Faction>,
    pub edition: Option<String>,
    #[serde(default)]
    pub game_mode: GameMode,
}

impl PlayerContext {
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_faction(mut self, faction: Faction) -> Self {
        self.faction = Some(faction);
        self
    }

    pub fn with_edition(mut self, edition: impl Into<String>) -> Self {
        self.edition = Some(edition.into());
        self
    }

    pub fn with_game_mode(mut self, game_mode: GameMode) -> Self {
        self.game_mode = game_mode;
        self
    }

    /// Every set field as `(name, value)`; unset fields are left out
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("game_mode", self.game_mode.as_query_arg().to_string())];
        if let Some(level) = self.level {
            params.push(("level", level.to_string()));
        }
        if let Some(faction) = self.faction {
            params.push(("faction", faction.to_string()));
        }
        if let Some(edition) = &self.edition {
            params.push(("edition", edition.clone()));
        }
        params
    }
}
