//! Presence canonicalization
//!
//! Callers describe presence in partial layers (engine default, configured
//! default, per-call patch); this module merges the layers and produces the
//! exact wire shape. Legacy single-activity fields are folded into the
//! activities list.

use serde::{Deserialize, Serialize};

/// Online status values accepted by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    Invisible,
    Offline,
}

/// A partial presence description
///
/// Every field is optional; absent fields fall through to the layer below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresencePatch {
    pub status: Option<PresenceStatus>,
    pub afk: Option<bool>,
    /// Epoch milliseconds since the client went idle
    pub since: Option<i64>,
    pub activities: Option<Vec<Activity>>,
    /// Legacy single-activity field, prepended to `activities`
    pub activity: Option<Activity>,
    /// Legacy game field, prepended after `activity`
    pub game: Option<Activity>,
}

impl PresencePatch {
    /// Shorthand for a status-only patch
    #[must_use]
    pub fn status(status: PresenceStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Canonical wire-format presence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub status: PresenceStatus,
    pub afk: bool,
    pub since: Option<i64>,
    pub activities: Vec<Activity>,
}

impl Default for Presence {
    fn default() -> Self {
        Self {
            status: PresenceStatus::Online,
            afk: false,
            since: None,
            activities: Vec::new(),
        }
    }
}

impl Presence {
    /// Merge presence layers into wire form, later layers winning per field
    ///
    /// Legacy `activity`/`game` fields from the winning layers are prepended
    /// so the final order is `[activity, game, ...activities]`.
    #[must_use]
    pub fn layered(layers: &[&PresencePatch]) -> Self {
        let mut merged = Self::default();
        let mut activity = None;
        let mut game = None;

        for layer in layers {
            if let Some(status) = layer.status {
                merged.status = status;
            }
            if let Some(afk) = layer.afk {
                merged.afk = afk;
            }
            if let Some(since) = layer.since {
                merged.since = Some(since);
            }
            if let Some(activities) = &layer.activities {
                merged.activities = activities.clone();
            }
            if let Some(a) = &layer.activity {
                activity = Some(a.clone());
            }
            if let Some(g) = &layer.game {
                game = Some(g.clone());
            }
        }

        if let Some(game) = game {
            merged.activities.insert(0, game);
        }
        if let Some(activity) = activity {
            merged.activities.insert(0, activity);
        }

        merged
    }
}

/// A single activity entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<ActivityAssets>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<ActivityParty>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<ActivitySecrets>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<ActivityTimestamps>,
}

impl Activity {
    /// Create a bare activity with the required fields
    #[must_use]
    pub fn new(name: impl Into<String>, kind: u8) -> Self {
        Self {
            name: name.into(),
            kind,
            url: None,
            details: None,
            state: None,
            assets: None,
            party: None,
            secrets: None,
            timestamps: None,
        }
    }
}

/// Artwork shown alongside an activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

/// Party membership for an activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityParty {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `[current_size, max_size]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<[u32; 2]>,
}

/// Join/spectate secrets for an activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySecrets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectate: Option<String>,
}

/// Start/end timestamps for an activity (epoch milliseconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}
