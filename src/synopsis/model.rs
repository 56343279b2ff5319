//! Synopsis profile, dialogue and session data models.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::research::ResearchPayload;

/// One of the canonical sections a complete synopsis must contain.
///
/// Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynopsisField {
    Title,
    GroupDetails,
    ObjectiveScope,
    ProcessDescription,
    ResourcesLimitations,
    Conclusion,
    References,
}

impl SynopsisField {
    /// All canonical fields in display order.
    pub const ALL: [SynopsisField; 7] = [
        Self::Title,
        Self::GroupDetails,
        Self::ObjectiveScope,
        Self::ProcessDescription,
        Self::ResourcesLimitations,
        Self::Conclusion,
        Self::References,
    ];

    /// Wire/storage key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::GroupDetails => "group_details",
            Self::ObjectiveScope => "objective_scope",
            Self::ProcessDescription => "process_description",
            Self::ResourcesLimitations => "resources_limitations",
            Self::Conclusion => "conclusion",
            Self::References => "references",
        }
    }

    /// Human-readable label for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Title => "Project Title",
            Self::GroupDetails => "Team Details",
            Self::ObjectiveScope => "Objectives & Scope",
            Self::ProcessDescription => "Methodology",
            Self::ResourcesLimitations => "Resources",
            Self::Conclusion => "Expected Outcomes",
            Self::References => "References",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl std::fmt::Display for SynopsisField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Structured extraction of the conversation into canonical fields.
///
/// Values are always non-empty trimmed text; an absent key means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Profile {
    fields: BTreeMap<SynopsisField, String>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: SynopsisField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn is_filled(&self, field: SynopsisField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Set a field. Blank values are rejected and leave the field untouched.
    ///
    /// Returns `true` if the stored value changed.
    pub fn set(&mut self, field: SynopsisField, value: &str) -> bool {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }
        if self.get(field) == Some(trimmed) {
            return false;
        }
        self.fields.insert(field, trimmed.to_string());
        true
    }

    /// Builder-style `set`, mostly for tests and seeding.
    pub fn with(mut self, field: SynopsisField, value: &str) -> Self {
        self.set(field, value);
        self
    }

    /// Filled fields in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (SynopsisField, &str)> {
        self.fields.iter().map(|(f, v)| (*f, v.as_str()))
    }

    pub fn filled_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decode a profile supplied by a client. Anything that isn't a JSON
    /// object decodes to an empty profile.
    pub fn from_client_value(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring malformed client profile");
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

impl<'de> Deserialize<'de> for Profile {
    /// Lenient: unknown keys, non-string values and blank strings are dropped
    /// instead of failing the whole profile.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut profile = Profile::default();
        for (key, value) in raw {
            let (Some(field), Some(text)) = (SynopsisField::from_key(&key), value.as_str()) else {
                continue;
            };
            profile.set(field, text);
        }
        Ok(profile)
    }
}

/// Bookkeeping bits kept beside the profile. Never counted as sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFlags {
    /// The one-time readiness notice has been shown.
    pub ready_notice_shown: bool,
    /// Automatic research has run (or been attempted) for this session.
    pub auto_research_done: bool,
}

/// Who said a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub role: Speaker,
    pub content: String,
}

impl DialogueTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::Assistant,
            content: content.into(),
        }
    }
}

/// Everything the core knows about one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub profile: Profile,
    /// Turns the extractor is allowed to see.
    pub history: Vec<DialogueTurn>,
    /// Turns shown to the user, including annotations.
    pub display: Vec<DialogueTurn>,
    pub flags: SessionFlags,
    /// Last automatic research payload, kept for document generation.
    pub research: Option<ResearchPayload>,
    /// Store revision this record was loaded at. 0 = never persisted.
    pub revision: u64,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Rebuild a record from its persisted JSON columns.
    ///
    /// Each column decodes independently; a corrupt column resets to its
    /// default and the rest of the session survives.
    pub fn from_stored(stored: &crate::store::StoredSession) -> Self {
        let id = stored.session_id.as_str();
        Self {
            session_id: stored.session_id.clone(),
            profile: decode_or_default(id, "profile", &stored.profile),
            history: decode_or_default(id, "history", &stored.history),
            display: decode_or_default(id, "display", &stored.display),
            flags: decode_or_default(id, "flags", &stored.flags),
            research: stored
                .research
                .as_deref()
                .and_then(|raw| decode_or_default::<Option<ResearchPayload>>(id, "research", raw)),
            revision: stored.revision,
        }
    }

    /// Encode into persisted JSON columns.
    pub fn to_stored(&self) -> Result<crate::store::StoredSession, serde_json::Error> {
        Ok(crate::store::StoredSession {
            session_id: self.session_id.clone(),
            revision: self.revision,
            profile: serde_json::to_string(&self.profile)?,
            history: serde_json::to_string(&self.history)?,
            display: serde_json::to_string(&self.display)?,
            flags: serde_json::to_string(&self.flags)?,
            research: self.research.as_ref().map(serde_json::to_string).transpose()?,
        })
    }
}

/// Decode one persisted piece of session state, falling back to its default.
pub fn decode_or_default<T: DeserializeOwned + Default>(session_id: &str, piece: &str, raw: &str) -> T {
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(
                session_id = %session_id,
                piece = piece,
                error = %e,
                "Malformed stored session state, resetting to default"
            );
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoredSession;

    #[test]
    fn field_keys_round_trip() {
        for field in SynopsisField::ALL {
            assert_eq!(SynopsisField::from_key(field.key()), Some(field));
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.key()));
        }
        assert_eq!(SynopsisField::from_key("synopsis_offer_shown"), None);
    }

    #[test]
    fn set_rejects_blank_and_trims() {
        let mut p = Profile::new();
        assert!(!p.set(SynopsisField::Title, "   "));
        assert!(!p.is_filled(SynopsisField::Title));

        assert!(p.set(SynopsisField::Title, "  Smart Irrigation  "));
        assert_eq!(p.get(SynopsisField::Title), Some("Smart Irrigation"));

        // Same value after trimming is not a change
        assert!(!p.set(SynopsisField::Title, "Smart Irrigation\n"));
        // Blank never clears a filled field
        assert!(!p.set(SynopsisField::Title, ""));
        assert_eq!(p.get(SynopsisField::Title), Some("Smart Irrigation"));
    }

    #[test]
    fn profile_deserialize_is_lenient() {
        let raw = serde_json::json!({
            "title": "Crop disease detection",
            "objective_scope": "   ",
            "references": ["not", "a", "string"],
            "auto_research_done": true,
            "synopsis_offer_shown": true
        });
        let p: Profile = serde_json::from_value(raw).unwrap();
        assert_eq!(p.filled_count(), 1);
        assert_eq!(p.get(SynopsisField::Title), Some("Crop disease detection"));
    }

    #[test]
    fn profile_serializes_as_flat_map() {
        let p = Profile::new()
            .with(SynopsisField::GroupDetails, "Asha, Ravi")
            .with(SynopsisField::Title, "Library bot");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"title": "Library bot", "group_details": "Asha, Ravi"})
        );
    }

    #[test]
    fn client_value_not_an_object_is_empty() {
        let v = serde_json::json!("definitely not a profile");
        assert!(Profile::from_client_value(Some(&v)).is_empty());
        assert!(Profile::from_client_value(None).is_empty());
    }

    #[test]
    fn iteration_is_canonical_order() {
        let p = Profile::new()
            .with(SynopsisField::References, "IEEE paper")
            .with(SynopsisField::Title, "T")
            .with(SynopsisField::Conclusion, "C");
        let order: Vec<_> = p.iter().map(|(f, _)| f).collect();
        assert_eq!(
            order,
            vec![SynopsisField::Title, SynopsisField::Conclusion, SynopsisField::References]
        );
    }

    #[test]
    fn stored_round_trip_preserves_record() {
        let mut record = SessionRecord::new("s-1");
        record.profile.set(SynopsisField::Title, "Parking finder");
        record.history.push(DialogueTurn::user("I want to build a parking finder"));
        record.display.push(DialogueTurn::user("I want to build a parking finder"));
        record.flags.auto_research_done = true;
        record.revision = 4;

        let stored = record.to_stored().unwrap();
        let back = SessionRecord::from_stored(&stored);
        assert_eq!(back, record);
    }

    #[test]
    fn corrupt_column_resets_only_that_piece() {
        let stored = StoredSession {
            session_id: "s-2".into(),
            revision: 2,
            profile: "{not json".into(),
            history: r#"[{"role":"user","content":"hello"}]"#.into(),
            display: "42".into(),
            flags: r#"{"ready_notice_shown":true}"#.into(),
            research: Some("[[[".into()),
        };
        let record = SessionRecord::from_stored(&stored);
        assert!(record.profile.is_empty());
        assert_eq!(record.history, vec![DialogueTurn::user("hello")]);
        assert!(record.display.is_empty());
        assert!(record.flags.ready_notice_shown);
        assert!(!record.flags.auto_research_done);
        assert!(record.research.is_none());
        assert_eq!(record.revision, 2);
    }
}
