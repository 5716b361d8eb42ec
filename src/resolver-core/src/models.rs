use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Streaming quality tier selectable by the user.
///
/// The host's config UI stores the tier as a combo-box index, so both the
/// index (`0`, `1`, `2`) and the tier name are accepted when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quality {
    Low,
    #[default]
    Normal,
    High,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::Low, Quality::Normal, Quality::High];

    /// Bitrate in kbps advertised by the service for this tier.
    pub fn bitrate(&self) -> u32 {
        match self {
            Quality::Low => 64,
            Quality::Normal => 192,
            Quality::High => 320,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Quality::Low => 0,
            Quality::Normal => 1,
            Quality::High => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Normal => "normal",
            Quality::High => "high",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" | "64" => Some(Quality::Low),
            "normal" | "192" => Some(Quality::Normal),
            "high" | "320" => Some(Quality::High),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} kbps)", self.as_str(), self.bitrate())
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Index(u8),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Index(index) => Quality::from_index(index).ok_or_else(|| {
                serde::de::Error::custom(format!("quality index {index} out of range"))
            }),
            Repr::Name(name) => Quality::from_name(&name).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown quality tier: {name}"))
            }),
        }
    }
}

/// Account settings supplied by the host. Immutable until the host saves a
/// new configuration.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub quality: Quality,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>, quality: Quality) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            quality,
        }
    }

    /// Both email and password are required before any login is attempted.
    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("quality", &self.quality)
            .finish()
    }
}

/// A track as handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "HostTrack", from = "HostTrack")]
pub struct TrackRecord {
    pub artist: String,
    pub album: String,
    pub title: String,
    /// Bitrate in kbps of the configured quality tier.
    pub bitrate: u32,
    pub duration_seconds: Option<u32>,
    /// Internal resolver URL, passed back into stream URL resolution.
    pub url: String,
}

/// Wire shape of a track result in the host's schema.
#[derive(Serialize, Deserialize)]
struct HostTrack {
    artist: String,
    album: String,
    track: String,
    title: String,
    bitrate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<u32>,
    url: String,
    #[serde(default = "default_checked")]
    checked: bool,
    #[serde(rename = "type", default = "default_result_type")]
    result_type: String,
}

fn default_checked() -> bool {
    true
}

fn default_result_type() -> String {
    "track".into()
}

impl From<TrackRecord> for HostTrack {
    fn from(record: TrackRecord) -> Self {
        Self {
            artist: record.artist,
            album: record.album,
            track: record.title.clone(),
            title: record.title,
            bitrate: record.bitrate,
            duration: record.duration_seconds,
            url: record.url,
            checked: true,
            result_type: default_result_type(),
        }
    }
}

impl From<HostTrack> for TrackRecord {
    fn from(track: HostTrack) -> Self {
        Self {
            artist: track.artist,
            album: track.album,
            title: track.title,
            bitrate: track.bitrate,
            duration_seconds: track.duration,
            url: track.url,
        }
    }
}

/// Internal identifier of the form `<scheme>://<kind>/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverUrl {
    pub scheme: String,
    pub kind: String,
    pub id: String,
}

impl ResolverUrl {
    pub fn track(scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            kind: "track".into(),
            id: id.into(),
        }
    }

    /// Parses `url` when it uses `scheme`. The kind must be lowercase ASCII
    /// letters and the id must be non-empty; anything else yields `None`.
    pub fn parse(url: &str, scheme: &str) -> Option<Self> {
        let rest = url.strip_prefix(scheme)?.strip_prefix("://")?;
        let (kind, id) = rest.split_once('/')?;
        if kind.is_empty() || !kind.bytes().all(|b| b.is_ascii_lowercase()) || id.is_empty() {
            return None;
        }
        Some(Self {
            scheme: scheme.to_string(),
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }
}

impl fmt::Display for ResolverUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.kind, self.id)
    }
}

/// Stream URL returned by a resolver. The host is responsible for reading and
/// decoding the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUrl(pub String);

impl StreamUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }
}

impl AsRef<str> for StreamUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for StreamUrl {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Artist/track pair the host asks a resolver to find.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveQuery {
    pub artist: String,
    pub track: String,
    #[serde(default)]
    pub album: Option<String>,
}

impl ResolveQuery {
    /// Free-text query used for typeahead search.
    pub fn search_text(&self) -> String {
        [self.artist.trim(), self.track.trim()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_index_round_trips() {
        for quality in Quality::ALL {
            assert_eq!(Quality::from_index(quality.index()), Some(quality));
        }
        assert_eq!(Quality::from_index(3), None);
    }

    #[test]
    fn quality_accepts_index_and_names() {
        let from_index: Quality = serde_json::from_str("2").unwrap();
        assert_eq!(from_index, Quality::High);
        let from_name: Quality = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(from_name, Quality::Low);
        let from_bitrate: Quality = serde_json::from_str("\"192\"").unwrap();
        assert_eq!(from_bitrate, Quality::Normal);
        assert!(serde_json::from_str::<Quality>("7").is_err());
    }

    #[test]
    fn credentials_require_email_and_password() {
        assert!(Credentials::new("a@b.c", "pw", Quality::Normal).is_complete());
        assert!(!Credentials::new("", "pw", Quality::Normal).is_complete());
        assert!(!Credentials::new("a@b.c", "", Quality::Normal).is_complete());
        assert!(!Credentials::new("   ", "pw", Quality::Normal).is_complete());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("a@b.c", "hunter2", Quality::High);
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("a@b.c"));
    }

    #[test]
    fn track_record_uses_host_schema() {
        let record = TrackRecord {
            artist: "Artist".into(),
            album: "Album".into(),
            title: "Song".into(),
            bitrate: 192,
            duration_seconds: Some(215),
            url: "rhap://track/Tra.123".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["track"], "Song");
        assert_eq!(json["title"], "Song");
        assert_eq!(json["duration"], 215);
        assert_eq!(json["checked"], true);
        assert_eq!(json["type"], "track");

        let back: TrackRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn resolver_url_parses_track_urls() {
        let url = ResolverUrl::parse("rhap://track/Tra.5678", "rhap").unwrap();
        assert_eq!(url.kind, "track");
        assert_eq!(url.id, "Tra.5678");
        assert_eq!(url.to_string(), "rhap://track/Tra.5678");
        assert_eq!(ResolverUrl::track("rhap", "Tra.1").to_string(), "rhap://track/Tra.1");
    }

    #[test]
    fn resolver_url_rejects_foreign_urls() {
        assert!(ResolverUrl::parse("http://example.com/a.mp3", "rhap").is_none());
        assert!(ResolverUrl::parse("rhap://Track/1", "rhap").is_none());
        assert!(ResolverUrl::parse("rhap://track/", "rhap").is_none());
        assert!(ResolverUrl::parse("rhap://track", "rhap").is_none());
    }

    #[test]
    fn resolve_query_joins_artist_and_track() {
        let query = ResolveQuery {
            artist: "Daft Punk".into(),
            track: "One More Time".into(),
            album: None,
        };
        assert_eq!(query.search_text(), "Daft Punk One More Time");
    }
}
