//! Board persistence.
//!
//! Saves and loads board definitions to/from a JSON file. A board file is a
//! plain list of properties; the classic board is used when no file is given.

pub mod classic;

pub use classic::{classic_board, BOARD_SQUARES};

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{Board, Property};

/// Save a board definition to a JSON file.
pub fn save_board(board: &Board, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(board).context("Failed to serialise board")?;

    std::fs::write(path, &json).context(format!("Failed to write board to {path}"))?;

    debug!(path, properties = board.len(), "Board saved");
    Ok(())
}

/// Load a board definition from a JSON file.
/// Returns None if the file doesn't exist.
pub fn load_board(path: &str) -> Result<Option<Board>> {
    if !Path::new(path).exists() {
        info!(path, "No board file found");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path).context(format!("Failed to read board from {path}"))?;

    let properties: Vec<Property> =
        serde_json::from_str(&json).context(format!("Failed to parse board from {path}"))?;
    validate(&properties).context(format!("Invalid board in {path}"))?;

    let board = Board::new(properties);
    info!(path, properties = board.len(), groups = board.groups().len(), "Board loaded from disk");
    Ok(Some(board))
}

/// The board at `path` when given and present, otherwise the classic board.
pub fn load_board_or_classic(path: Option<&str>) -> Result<Board> {
    match path {
        Some(path) => Ok(load_board(path)?.unwrap_or_else(classic_board)),
        None => Ok(classic_board()),
    }
}

fn validate(properties: &[Property]) -> Result<()> {
    if properties.is_empty() {
        bail!("board has no properties");
    }
    let mut ids = HashSet::new();
    let mut positions = HashSet::new();
    for p in properties {
        if !ids.insert(p.id) {
            bail!("duplicate property id {}", p.id);
        }
        if p.position >= BOARD_SQUARES {
            bail!("{} is on square {}, past the last square {}", p.id, p.position, BOARD_SQUARES - 1);
        }
        if !positions.insert(p.position) {
            bail!("two properties on square {}", p.position);
        }
        if p.price <= 0 || p.house_cost <= 0 {
            bail!("{} must have a positive price and house cost", p.id);
        }
        let mut rents = std::iter::once(p.base_rent)
            .chain(p.house_rents)
            .chain(std::iter::once(p.hotel_rent));
        if rents.any(|rent| rent < 0) {
            bail!("{} has a negative rent", p.id);
        }
        if p.group.is_empty() {
            bail!("{} has no group", p.id);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyId;

    fn temp_path() -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("monopoly_test_board_{}.json", uuid::Uuid::new_v4()));
        p.to_string_lossy().to_string()
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path();
        let board = Board::sample();
        save_board(&board, &path).unwrap();

        let loaded = load_board(&path).unwrap().unwrap();
        assert_eq!(loaded, board);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let loaded = load_board("/tmp/monopoly_nonexistent_board_12345.json").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_missing_file_falls_back_to_classic() {
        let board = load_board_or_classic(Some("/tmp/monopoly_nonexistent_board_12345.json")).unwrap();
        assert_eq!(board.len(), 22);
        assert_eq!(load_board_or_classic(None).unwrap(), board);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let path = temp_path();
        let mut properties: Vec<Property> = Board::sample().into();
        let mut dup = properties[0].clone();
        dup.position = 30;
        properties.push(dup);
        std::fs::write(&path, serde_json::to_string(&properties).unwrap()).unwrap();

        let err = load_board(&path).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate property id"));

        std::fs::remove_file(&path).unwrap();
    }

    fn assert_rejected(properties: &[Property], message: &str) {
        let path = temp_path();
        std::fs::write(&path, serde_json::to_string(properties).unwrap()).unwrap();
        let err = load_board(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(format!("{err:#}").contains(message), "{err:#}");
    }

    #[test]
    fn test_off_board_square_rejected() {
        let mut properties: Vec<Property> = Board::sample().into();
        properties[2].position = BOARD_SQUARES;
        assert_rejected(&properties, "past the last square");
    }

    #[test]
    fn test_negative_rents_rejected() {
        let mut base: Vec<Property> = Board::sample().into();
        base[0].base_rent = -2;
        assert_rejected(&base, "negative rent");

        let mut houses: Vec<Property> = Board::sample().into();
        houses[1].house_rents[3] = -1;
        assert_rejected(&houses, "negative rent");

        let mut hotel: Vec<Property> = Board::sample().into();
        hotel[3].hotel_rent = -450;
        assert_rejected(&hotel, "negative rent");
    }

    #[test]
    fn test_malformed_json_rejected() {
        let path = temp_path();
        std::fs::write(&path, "{ not a board").unwrap();
        assert!(load_board(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_saved_board_is_a_list() {
        let path = temp_path();
        save_board(&Board::sample(), &path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.as_array().map(|a| a.len()), Some(7));
        assert_eq!(raw[0]["id"], serde_json::json!(PropertyId(1).0));
        std::fs::remove_file(&path).unwrap();
    }
}
