//! Game metadata keyed by (game, version)

use bgs_core::{GameId, GameInfo};
use tracing::{info, instrument};

use crate::collection::{Collection, DocumentId, Query, Stored};
use crate::error::StorageError;
use crate::provision::{GAME_INFOS, create_game_info_collection};
use crate::tables::DocumentStore;

/// Published game versions
#[derive(Debug, Clone)]
pub struct GameInfoStore {
    games: Collection<GameInfo>,
}

impl GameInfoStore {
    pub fn new(games: Collection<GameInfo>) -> Self {
        Self { games }
    }

    /// Provision the collection if needed and wrap it
    pub fn provision(store: &DocumentStore) -> Result<Self, StorageError> {
        Ok(Self::new(create_game_info_collection(store)?))
    }

    /// Open the existing game collection
    pub fn open(store: &DocumentStore) -> Result<Self, StorageError> {
        Ok(Self::new(store.collection(GAME_INFOS)?))
    }

    /// Insert a version, or replace it if (game, version) is already published
    #[instrument(skip(self, info), fields(game = %info.game, version = info.version))]
    pub fn publish(&self, info: &GameInfo) -> Result<DocumentId, StorageError> {
        let key = Query::new()
            .eq("game", info.game.as_str())
            .eq("version", info.version);
        let (id, inserted) = self.games.upsert_one(&key, info)?;
        info!(id = %id, inserted, "Published game info");
        Ok(id)
    }

    /// Highest published version of a game
    pub fn latest(&self, game: &GameId) -> Result<Option<GameInfo>, StorageError> {
        Ok(self
            .games
            .find_one(&Query::new().eq("game", game.as_str()))?
            .map(|stored| stored.document))
    }

    /// Every published version of a game, highest first
    pub fn versions(&self, game: &GameId) -> Result<Vec<Stored<GameInfo>>, StorageError> {
        self.games.find(&Query::new().eq("game", game.as_str()))
    }

    pub fn collection(&self) -> &Collection<GameInfo> {
        &self.games
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(name: &str) -> GameId {
        GameId::new(name).unwrap()
    }

    #[test]
    fn test_latest_is_highest_version() {
        let store = DocumentStore::in_memory().unwrap();
        let games = GameInfoStore::provision(&store).unwrap();

        games.publish(&GameInfo::new(game("carcassonne"), 2, "v2")).unwrap();
        games.publish(&GameInfo::new(game("carcassonne"), 10, "v10")).unwrap();
        games.publish(&GameInfo::new(game("carcassonne"), 1, "v1")).unwrap();
        games.publish(&GameInfo::new(game("azul"), 99, "azul")).unwrap();

        let latest = games.latest(&game("carcassonne")).unwrap().unwrap();
        assert_eq!(latest.version, 10);

        let versions: Vec<_> = games
            .versions(&game("carcassonne"))
            .unwrap()
            .into_iter()
            .map(|s| s.document.version)
            .collect();
        assert_eq!(versions, vec![10, 2, 1]);
        assert!(games.latest(&game("chess")).unwrap().is_none());
    }

    #[test]
    fn test_republish_replaces() {
        let store = DocumentStore::in_memory().unwrap();
        let games = GameInfoStore::provision(&store).unwrap();

        let first = games
            .publish(&GameInfo::new(game("azul"), 1, "Azul").with_players(2, 4))
            .unwrap();
        let second = games
            .publish(
                &GameInfo::new(game("azul"), 1, "Azul")
                    .with_description("Tile drafting")
                    .with_expansion("glazed", "Glazed Pavilion"),
            )
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(games.collection().count().unwrap(), 1);
        let latest = games.latest(&game("azul")).unwrap().unwrap();
        assert_eq!(latest.description, "Tile drafting");
        assert_eq!(latest.expansions.len(), 1);
    }
}
