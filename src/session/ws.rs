//! One task per open socket: resolve the participant, send the opening
//! snapshots, then process inbound frames strictly in arrival order.

use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::{
    store::{
        catalog::{self, CatalogKind},
        characters, chat,
        chat::DiceAnnotation,
        npcs,
        participants::{self, Participant, Role},
    },
    AppError, Config,
};

use super::{
    broadcast::Broadcaster,
    dice,
    protocol::ClientMessage,
    registry::{ConnectionHandle, Outgoing},
};

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_INTERNAL: u16 = 1011;

/// How a session finished.
#[derive(Debug)]
pub enum SessionEnd {
    /// Unknown participant; never registered.
    Rejected,
    /// The client went away.
    Graceful,
    /// The participant was deleted while connected.
    Removed,
    Abnormal(AppError),
}

#[debug_handler(state = crate::AppState)]
pub async fn session_ws(
    Path(user_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    State(config): State<Arc<Config>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_failed_upgrade(|e| tracing::warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(async move |socket| {
            serve_socket(socket, user_id, db_pool, broadcaster, config.channel_buffer).await;
        })
}

async fn serve_socket(
    socket: WebSocket,
    participant_id: String,
    db_pool: SqlitePool,
    broadcaster: Broadcaster,
    buffer: usize,
) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel(buffer);
    let writer = tokio::spawn(write_frames(sink, rx));

    let end = run_session(&db_pool, &broadcaster, &participant_id, tx, stream).await;
    tracing::info!(participant_id, ?end, "session closed");

    let _ = writer.await;
}

/// Owns the socket sink. Frames are serialised here so pushes never block on
/// the network.
pub async fn write_frames<S>(mut sink: S, mut rx: mpsc::Receiver<Outgoing>)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(outgoing) = rx.recv().await {
        let message = match outgoing {
            Outgoing::Frame(frame) => match serde_json::to_string(&frame) {
                Ok(json) => Message::Text(json.into()),
                Err(e) => {
                    tracing::error!(kind = frame.kind(), error = %e, "frame not serialisable");
                    continue;
                }
            },
            Outgoing::Close { code, reason } => {
                let close = Message::Close(Some(CloseFrame { code, reason: reason.into() }));
                if let Err(e) = sink.send(close).await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                break;
            }
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!(error = %e, "socket write failed");
            break;
        }
    }
}

/// Drives a whole session over `inbound`, queueing everything outbound on
/// `sender`. Returns once the session is closed and deregistered.
pub async fn run_session<S>(
    db_pool: &SqlitePool,
    broadcaster: &Broadcaster,
    participant_id: &str,
    sender: mpsc::Sender<Outgoing>,
    mut inbound: S,
) -> SessionEnd
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let participant = match participants::get(db_pool, participant_id, 0).await {
        Ok(Some(participant)) => participant,
        Ok(None) => {
            tracing::info!(participant_id, "unknown participant, closing");
            let _ = sender.try_send(Outgoing::Close { code: CLOSE_NORMAL, reason: "unknown participant" });
            return SessionEnd::Rejected;
        }
        Err(e) => {
            let _ = sender.try_send(Outgoing::Close { code: CLOSE_INTERNAL, reason: "internal error" });
            return SessionEnd::Abnormal(e.into());
        }
    };

    let handle = ConnectionHandle::new(participant.role(), sender);
    let mut session = Session {
        db_pool,
        broadcaster,
        participant_id,
        handle: handle.clone(),
    };
    broadcaster.registry().register(participant_id, handle).await;
    tracing::info!(participant_id, nickname = %participant.nickname, role = ?participant.role(), "session opened");

    let end = match session.send_snapshots().await {
        Ok(()) => session.receive(&mut inbound).await,
        Err(e) => SessionEnd::Abnormal(e),
    };

    match &end {
        SessionEnd::Abnormal(e) => {
            tracing::error!(participant_id, error = %e, "session failed");
            session.handle.send(participant_id, Outgoing::Close { code: CLOSE_INTERNAL, reason: "internal error" });
        }
        SessionEnd::Removed => {
            session.handle.send(participant_id, Outgoing::Close { code: CLOSE_NORMAL, reason: "participant removed" });
        }
        SessionEnd::Graceful | SessionEnd::Rejected => {}
    }

    broadcaster
        .registry()
        .release(participant_id, session.handle.connection_id)
        .await;
    if let Err(e) = broadcaster.push_roster().await {
        tracing::error!(participant_id, error = %e, "departure roster push failed");
    }

    end
}

struct Session<'a> {
    db_pool: &'a SqlitePool,
    broadcaster: &'a Broadcaster,
    participant_id: &'a str,
    handle: ConnectionHandle,
}

impl Session<'_> {
    fn send_own(&self, outgoing: Outgoing) -> Result<(), AppError> {
        if self.handle.sender.is_closed() {
            return Err(AppError::Channel("outbound queue closed".to_owned()));
        }
        self.handle.send(self.participant_id, outgoing);
        Ok(())
    }

    /// Roster, chat log, own sheet, both catalogs and, for the master, the NPC list.
    async fn send_snapshots(&self) -> Result<(), AppError> {
        let broadcaster = self.broadcaster;

        self.send_own(Outgoing::Frame(broadcaster.roster_view(self.participant_id, self.handle.role).await?))?;
        self.send_own(Outgoing::Frame(broadcaster.chat_log().await?))?;
        if let Some(sheet) = broadcaster.character(self.participant_id).await? {
            self.send_own(Outgoing::Frame(sheet))?;
        }
        self.send_own(Outgoing::Frame(broadcaster.shared_catalog(CatalogKind::Items).await?))?;
        self.send_own(Outgoing::Frame(broadcaster.shared_catalog(CatalogKind::Abilities).await?))?;
        if self.handle.role == Role::Master {
            self.send_own(Outgoing::Frame(broadcaster.npc_roster(self.participant_id).await?))?;
        }
        Ok(())
    }

    async fn receive<S>(&mut self, inbound: &mut S) -> SessionEnd
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        while let Some(frame) = inbound.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => return SessionEnd::Graceful,
                Ok(Message::Binary(_)) => {
                    tracing::debug!(participant_id = self.participant_id, "binary frame ignored");
                    continue;
                }
                Ok(_) => continue,
                Err(e) => return SessionEnd::Abnormal(e.into()),
            };

            let msg = match ClientMessage::decode(text.as_str()) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(participant_id = self.participant_id, error = %e, "malformed frame ignored");
                    continue;
                }
            };

            let participant = match participants::get(self.db_pool, self.participant_id, 0).await {
                Ok(Some(participant)) => participant,
                Ok(None) => return SessionEnd::Removed,
                Err(e) => {
                    tracing::error!(participant_id = self.participant_id, error = %e, "participant lookup failed");
                    continue;
                }
            };
            self.revalidate_role(participant.role()).await;

            if msg.master_only() && self.handle.role != Role::Master {
                tracing::debug!(participant_id = self.participant_id, kind = msg.kind(), "master-only message ignored");
                continue;
            }

            let kind = msg.kind();
            if let Err(e) = self.dispatch(msg, &participant).await {
                tracing::error!(participant_id = self.participant_id, kind, error = %e, "message handling failed");
            }

            if self.handle.sender.is_closed() {
                return SessionEnd::Abnormal(AppError::Channel("outbound queue closed".to_owned()));
            }
        }

        SessionEnd::Graceful
    }

    async fn revalidate_role(&mut self, role: Role) {
        if role != self.handle.role {
            self.handle.role = role;
            self.broadcaster
                .registry()
                .set_role(self.participant_id, self.handle.connection_id, role)
                .await;
        }
    }

    async fn dispatch(&self, msg: ClientMessage, sender: &Participant) -> Result<(), sqlx::Error> {
        let db_pool = self.db_pool;
        let broadcaster = self.broadcaster;

        match msg {
            ClientMessage::Message { content } => {
                chat::create(db_pool, &sender.id, &sender.nickname, &content, None).await?;
                broadcaster.push_chat_log().await?;
            }
            ClientMessage::DiceRoll { dice_type, character_id, custom_value } => {
                let dice_type = dice_type.unwrap_or_else(|| dice::DEFAULT_DIE.to_owned());
                let result = dice::roll(dice::max_value(&dice_type, custom_value));
                let (roller_id, nickname) = self.resolve_roller(sender, character_id.as_deref()).await?;

                participants::add_dice_result(db_pool, &roller_id, result).await?;
                let content = format!("{nickname} rolled {dice_type}: {result}");
                chat::create(db_pool, &sender.id, &nickname, &content, Some(DiceAnnotation { dice_type, result })).await?;

                broadcaster.push_chat_log().await?;
                broadcaster.push_roster().await?;
            }
            ClientMessage::UpdateCharacter { data } => {
                characters::apply_update(db_pool, &sender.id, &data).await?;
                match broadcaster.character(&sender.id).await? {
                    Some(sheet) => {
                        self.handle.send(self.participant_id, Outgoing::Frame(sheet));
                    }
                    None => tracing::warn!(participant_id = %sender.id, "sheet missing after update"),
                }
            }
            ClientMessage::UpdateHealth { user_id, health_points, max_health_points } => {
                participants::update_health(db_pool, &user_id, health_points).await?;
                if let Some(max_health_points) = max_health_points {
                    participants::update_max_health(db_pool, &user_id, max_health_points).await?;
                }
                broadcaster.push_roster().await?;
            }
            ClientMessage::AddSharedItem { item } => {
                catalog::create_item(db_pool, &sender.id, &item).await?;
                broadcaster.push_shared_catalog(CatalogKind::Items).await?;
            }
            ClientMessage::UpdateSharedItem { item } => {
                let Some(item_id) = &item.id else {
                    tracing::debug!("shared item update without id ignored");
                    return Ok(());
                };
                catalog::update_item(db_pool, item_id, &item).await?;
                broadcaster.push_shared_catalog(CatalogKind::Items).await?;
            }
            ClientMessage::DeleteSharedItem { item_id } => {
                catalog::delete_item(db_pool, &item_id).await?;
                broadcaster.push_shared_catalog(CatalogKind::Items).await?;
            }
            ClientMessage::AddSharedAbility { ability } => {
                catalog::create_ability(db_pool, &sender.id, &ability).await?;
                broadcaster.push_shared_catalog(CatalogKind::Abilities).await?;
            }
            ClientMessage::UpdateSharedAbility { ability } => {
                let Some(ability_id) = &ability.id else {
                    tracing::debug!("shared ability update without id ignored");
                    return Ok(());
                };
                catalog::update_ability(db_pool, ability_id, &ability).await?;
                broadcaster.push_shared_catalog(CatalogKind::Abilities).await?;
            }
            ClientMessage::DeleteSharedAbility { ability_id } => {
                catalog::delete_ability(db_pool, &ability_id).await?;
                broadcaster.push_shared_catalog(CatalogKind::Abilities).await?;
            }
            ClientMessage::AddItemToCharacter { user_id, item } => {
                characters::add_item(db_pool, &user_id, &item).await?;
                broadcaster.push_character(&user_id).await?;
            }
            ClientMessage::AddAbilityToCharacter { user_id, ability } => {
                characters::add_ability(db_pool, &user_id, &ability).await?;
                broadcaster.push_character(&user_id).await?;
            }
            ClientMessage::Unrecognized => {
                tracing::debug!(participant_id = %sender.id, "unrecognized message ignored");
            }
        }

        Ok(())
    }

    /// Who a roll belongs to. The master may roll for another participant or
    /// for one of their own NPCs; NPC rolls stay in the master's history.
    async fn resolve_roller(&self, sender: &Participant, character_id: Option<&str>) -> Result<(String, String), sqlx::Error> {
        let own = (sender.id.clone(), sender.nickname.clone());
        let Some(target) = character_id.filter(|target| *target != sender.id) else {
            return Ok(own);
        };
        if self.handle.role != Role::Master {
            return Ok(own);
        }

        if let Some(participant) = participants::get(self.db_pool, target, 0).await? {
            return Ok((participant.id, participant.nickname));
        }
        match npcs::find_card(self.db_pool, target).await? {
            Some(npc) if npc.master_id == sender.id => Ok((sender.id.clone(), npc.nickname)),
            _ => Ok(own),
        }
    }
}
