use chrono::{DateTime, Utc};
use serde::Serialize;

use super::verdict::Verdict;

const PUBLIC_LINK_PREFIX: &str = "https://t.me/";

/// How a discovered chat has to be addressed when its history is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKind {
    Channel { access_hash: Option<i64> },
    BasicGroup,
}

/// A public group or channel as returned by a platform keyword search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredGroup {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
    pub peer: PeerKind,
}

impl DiscoveredGroup {
    pub fn group_id(&self) -> String {
        self.id.to_string()
    }

    pub fn public_link(&self) -> Option<String> {
        self.username.as_deref().and_then(build_group_link)
    }
}

pub fn build_group_link(username: &str) -> Option<String> {
    let username = username.trim().trim_start_matches('@');
    match username.is_empty() {
        true => None,
        false => Some(format!("{}{}", PUBLIC_LINK_PREFIX, username)),
    }
}

/// Outcome of sampling and classifying one discovered group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedGroup {
    pub group_id: String,
    pub group_name: String,
    pub group_link: Option<String>,
    pub is_relevant: Option<bool>,
    pub why_relevant: String,
}

impl ClassifiedGroup {
    pub fn new(group: &DiscoveredGroup, verdict: Verdict, include_link: bool) -> Self {
        ClassifiedGroup {
            group_id: group.group_id(),
            group_name: group.title.clone(),
            group_link: match include_link {
                true => group.public_link(),
                false => None,
            },
            is_relevant: verdict.is_relevant,
            why_relevant: verdict.explanation,
        }
    }

    pub fn stamp(self, fetched_at: DateTime<Utc>) -> GroupRecord {
        GroupRecord {
            group_id: self.group_id,
            group_name: self.group_name,
            group_link: self.group_link,
            is_relevant: self.is_relevant,
            why_relevant: self.why_relevant,
            last_fetch_time: fetched_at,
        }
    }
}

/// A row of the groups table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub group_id: String,
    pub group_name: String,
    pub group_link: Option<String>,
    pub is_relevant: Option<bool>,
    pub why_relevant: String,
    pub last_fetch_time: DateTime<Utc>,
}

/// A stored group whose link column is still empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkedGroup {
    pub group_id: String,
    pub group_name: String,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{build_group_link, ClassifiedGroup, DiscoveredGroup, PeerKind};
    use crate::domain::verdict::Verdict;

    fn foo_chat() -> DiscoveredGroup {
        DiscoveredGroup {
            id: 1,
            title: "Foo Chat".to_string(),
            username: Some("foochat".to_string()),
            peer: PeerKind::Channel {
                access_hash: Some(42),
            },
        }
    }

    #[test]
    fn build_group_link_valid() {
        assert_eq!(
            build_group_link("foochat"),
            Some("https://t.me/foochat".to_string())
        );
        assert_eq!(
            build_group_link("@foochat"),
            Some("https://t.me/foochat".to_string())
        );
    }

    #[test]
    fn build_group_link_empty_username() {
        assert_eq!(build_group_link(""), None);
        assert_eq!(build_group_link("  "), None);
    }

    #[test]
    fn classified_group_without_link() {
        let verdict = Verdict::new(Some(true), "on-topic");
        let group = ClassifiedGroup::new(&foo_chat(), verdict, false);

        assert_eq!(group.group_id, "1");
        assert_eq!(group.group_link, None);
    }

    #[test]
    fn record_serializes_timestamp_as_iso_8601() {
        let verdict = Verdict::new(Some(true), "on-topic");
        let fetched_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let record = ClassifiedGroup::new(&foo_chat(), verdict, true).stamp(fetched_at);

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["group_link"], "https://t.me/foochat");
        assert_eq!(json["is_relevant"], true);
        assert_eq!(json["why_relevant"], "on-topic");
        assert_eq!(json["last_fetch_time"], "2025-03-01T12:30:00Z");
    }
}
