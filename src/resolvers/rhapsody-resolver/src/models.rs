use serde::{Deserialize, Deserializer};

/// Account/token bundle returned by the user account endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthBundle {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub country: String,
    #[serde(rename = "rhapsodyAccessToken")]
    pub access_token: String,
}

impl std::fmt::Debug for AuthBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthBundle")
            .field("user_id", &self.user_id)
            .field("country", &self.country)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Server-side playback context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaybackSession {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct TrackMediaResponse {
    #[serde(rename = "stationTrack")]
    pub station_track: StationTrack,
}

#[derive(Debug, Deserialize)]
pub struct StationTrack {
    #[serde(default)]
    pub medias: Vec<Media>,
}

/// One encoding of a track.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Media {
    /// Bitrate in kbps; the service sends numbers or numeric strings.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub bitrate: Option<u32>,
    pub location: String,
}

/// One entry of a typeahead search response.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchEntry {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub duration: Option<u32>,
    #[serde(default)]
    pub artist: Option<NamedRef>,
    #[serde(default)]
    pub album: Option<NamedRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(u64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Repr>::deserialize(deserializer)? {
        Some(Repr::Int(v)) => u32::try_from(v).ok(),
        Some(Repr::Float(v)) if v.is_finite() && v >= 0.0 => Some(v.round() as u32),
        Some(Repr::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
