use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grammers_client::{Client, Config, InitParams};
use grammers_session::Session;
use grammers_tl_types as tl;

use crate::domain::{
    group::{DiscoveredGroup, PeerKind},
    message::GroupMessage,
};

/// The parts of the messaging platform the job talks to.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Public groups and channels matching `query`, in platform order.
    async fn search_groups(&self, query: &str, limit: usize)
        -> anyhow::Result<Vec<DiscoveredGroup>>;

    /// The `limit` most recent messages of `group`, newest first.
    async fn recent_messages(
        &self,
        group: &DiscoveredGroup,
        limit: usize,
    ) -> anyhow::Result<Vec<GroupMessage>>;
}

pub struct TelegramPlatform {
    client: Client,
    session_path: String,
}

impl TelegramPlatform {
    /// Connects with an already authorized session file. Logging in is left
    /// to an interactive run, an unauthorized session is an error here.
    pub async fn connect(session_path: &str, api_id: i32, api_hash: &str) -> anyhow::Result<Self> {
        let session = Session::load_file_or_create(session_path)
            .with_context(|| format!("Failed to open Telegram session {}", session_path))?;

        let client = Client::connect(Config {
            session,
            api_id,
            api_hash: api_hash.to_string(),
            params: InitParams::default(),
        })
        .await
        .context("Failed to connect to Telegram")?;

        if !client.is_authorized().await? {
            bail!(
                "Telegram session {} is not authorized. Log in interactively first.",
                session_path
            );
        }
        log::info!("Connected to Telegram with session {}", session_path);

        Ok(TelegramPlatform {
            client,
            session_path: session_path.to_string(),
        })
    }

    pub fn save_session(&self) {
        if let Err(e) = self.client.session().save_to_file(&self.session_path) {
            log::error!("Failed to save Telegram session: {:?}", e);
        }
    }
}

#[async_trait]
impl MessagingPlatform for TelegramPlatform {
    async fn search_groups(
        &self,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<DiscoveredGroup>> {
        let tl::enums::contacts::Found::Found(found) = self
            .client
            .invoke(&tl::functions::contacts::Search {
                q: query.to_string(),
                limit: clamp_limit(limit),
            })
            .await?;

        Ok(found.chats.into_iter().filter_map(discovered_group).collect())
    }

    async fn recent_messages(
        &self,
        group: &DiscoveredGroup,
        limit: usize,
    ) -> anyhow::Result<Vec<GroupMessage>> {
        let history = self
            .client
            .invoke(&tl::functions::messages::GetHistory {
                peer: input_peer(group)?,
                offset_id: 0,
                offset_date: 0,
                add_offset: 0,
                limit: clamp_limit(limit),
                max_id: 0,
                min_id: 0,
                hash: 0,
            })
            .await?;

        let (messages, users) = match history {
            tl::enums::messages::Messages::Messages(m) => (m.messages, m.users),
            tl::enums::messages::Messages::Slice(m) => (m.messages, m.users),
            tl::enums::messages::Messages::ChannelMessages(m) => (m.messages, m.users),
            tl::enums::messages::Messages::NotModified(_) => (vec![], vec![]),
        };

        Ok(messages
            .into_iter()
            .filter_map(|message| match message {
                tl::enums::Message::Message(m) => Some(GroupMessage {
                    date: message_date(m.date),
                    sender: m.from_id.as_ref().and_then(|peer| sender_name(peer, &users)),
                    text: m.message,
                }),
                _ => None,
            })
            .collect())
    }
}

fn clamp_limit(limit: usize) -> i32 {
    i32::try_from(limit).unwrap_or(i32::MAX)
}

fn discovered_group(chat: tl::enums::Chat) -> Option<DiscoveredGroup> {
    match chat {
        tl::enums::Chat::Channel(channel) => Some(DiscoveredGroup {
            id: channel.id,
            title: channel.title,
            username: channel.username,
            peer: PeerKind::Channel {
                access_hash: channel.access_hash,
            },
        }),
        tl::enums::Chat::Chat(chat) => Some(DiscoveredGroup {
            id: chat.id,
            title: chat.title,
            username: None,
            peer: PeerKind::BasicGroup,
        }),
        _ => None,
    }
}

fn input_peer(group: &DiscoveredGroup) -> anyhow::Result<tl::enums::InputPeer> {
    match group.peer {
        PeerKind::Channel {
            access_hash: Some(access_hash),
        } => Ok(tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: group.id,
            access_hash,
        })),
        PeerKind::Channel { access_hash: None } => Err(anyhow!(
            "Channel {} was returned without an access hash",
            group.id
        )),
        PeerKind::BasicGroup => Ok(tl::enums::InputPeer::Chat(tl::types::InputPeerChat {
            chat_id: group.id,
        })),
    }
}

fn message_date(timestamp: i32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(timestamp), 0).unwrap_or_default()
}

fn sender_name(peer: &tl::enums::Peer, users: &[tl::enums::User]) -> Option<String> {
    let tl::enums::Peer::User(peer_user) = peer else {
        return None;
    };

    users.iter().find_map(|user| match user {
        tl::enums::User::User(u) if u.id == peer_user.user_id => {
            u.username.clone().or_else(|| u.first_name.clone())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::{clamp_limit, input_peer, message_date};
    use crate::domain::group::{DiscoveredGroup, PeerKind};

    #[test]
    fn clamp_limit_saturates() {
        assert_eq!(clamp_limit(10), 10);
        assert_eq!(clamp_limit(usize::MAX), i32::MAX);
    }

    #[test]
    fn input_peer_requires_access_hash_for_channels() {
        let group = DiscoveredGroup {
            id: 7,
            title: "min channel".to_string(),
            username: None,
            peer: PeerKind::Channel { access_hash: None },
        };

        assert!(input_peer(&group).is_err());
    }

    #[test]
    fn input_peer_basic_group() {
        let group = DiscoveredGroup {
            id: 7,
            title: "basic".to_string(),
            username: None,
            peer: PeerKind::BasicGroup,
        };

        assert!(input_peer(&group).is_ok());
    }

    #[test]
    fn message_date_from_unix_seconds() {
        assert_eq!(message_date(0).timestamp(), 0);
        assert_eq!(message_date(1_700_000_000).timestamp(), 1_700_000_000);
    }
}
