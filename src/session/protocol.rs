use serde::{Deserialize, Deserializer, Serialize};

use crate::store::{
    catalog::{SharedAbility, SharedAbilityInput, SharedItem, SharedItemInput},
    characters::{Ability, CharacterSheet, InventoryItem, SheetUpdate},
    chat::ChatMessage,
    npcs::Npc,
    participants::RosterEntry,
};

/// Frames a client may send, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Message {
        content: String,
    },
    DiceRoll {
        #[serde(default)]
        dice_type: Option<String>,
        #[serde(default)]
        character_id: Option<String>,
        #[serde(default, deserialize_with = "positive_bound")]
        custom_value: Option<i64>,
    },
    UpdateCharacter {
        data: SheetUpdate,
    },
    UpdateHealth {
        user_id: String,
        health_points: i64,
        #[serde(default)]
        max_health_points: Option<i64>,
    },
    AddSharedItem {
        item: SharedItemInput,
    },
    UpdateSharedItem {
        item: SharedItemInput,
    },
    DeleteSharedItem {
        item_id: String,
    },
    AddSharedAbility {
        ability: SharedAbilityInput,
    },
    UpdateSharedAbility {
        ability: SharedAbilityInput,
    },
    DeleteSharedAbility {
        ability_id: String,
    },
    AddItemToCharacter {
        user_id: String,
        item: InventoryItem,
    },
    AddAbilityToCharacter {
        user_id: String,
        ability: Ability,
    },
    #[serde(other)]
    Unrecognized,
}

/// Keeps only a positive integer bound; anything else falls back to the default die.
fn positive_bound<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.as_i64()).filter(|bound| *bound > 0))
}

impl ClientMessage {
    /// Tag name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Message { .. } => "message",
            ClientMessage::DiceRoll { .. } => "dice_roll",
            ClientMessage::UpdateCharacter { .. } => "update_character",
            ClientMessage::UpdateHealth { .. } => "update_health",
            ClientMessage::AddSharedItem { .. } => "add_shared_item",
            ClientMessage::UpdateSharedItem { .. } => "update_shared_item",
            ClientMessage::DeleteSharedItem { .. } => "delete_shared_item",
            ClientMessage::AddSharedAbility { .. } => "add_shared_ability",
            ClientMessage::UpdateSharedAbility { .. } => "update_shared_ability",
            ClientMessage::DeleteSharedAbility { .. } => "delete_shared_ability",
            ClientMessage::AddItemToCharacter { .. } => "add_item_to_character",
            ClientMessage::AddAbilityToCharacter { .. } => "add_ability_to_character",
            ClientMessage::Unrecognized => "unrecognized",
        }
    }

    pub fn master_only(&self) -> bool {
        !matches!(
            self,
            ClientMessage::Message { .. }
                | ClientMessage::DiceRoll { .. }
                | ClientMessage::UpdateCharacter { .. }
                | ClientMessage::Unrecognized
        )
    }

    pub fn decode(text: &str) -> Result<ClientMessage, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Frames pushed to clients as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Users(Vec<RosterEntry>),
    Messages(Vec<ChatMessage>),
    Character(CharacterSheet),
    SharedItems(Vec<SharedItem>),
    SharedAbilities(Vec<SharedAbility>),
    Npcs(Vec<Npc>),
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Users(_) => "users",
            ServerMessage::Messages(_) => "messages",
            ServerMessage::Character(_) => "character",
            ServerMessage::SharedItems(_) => "shared_items",
            ServerMessage::SharedAbilities(_) => "shared_abilities",
            ServerMessage::Npcs(_) => "npcs",
        }
    }
}
