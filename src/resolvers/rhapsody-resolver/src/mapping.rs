use crate::models::{Media, SearchEntry};
use resolver_core::models::{Quality, ResolverUrl, TrackRecord};
use resolver_core::resolver::{ResolverError, ResolverResult};

/// Scheme of the internal track URLs handed to the host.
pub const URL_SCHEME: &str = "rhap";

/// Container tag the streaming server expects in front of the file segment.
const CONTAINER_TAG: &str = "mp4:";

/// Index of the file segment in a `/`-split media location
/// (`rtmp:`, ``, host, app, instance, file...).
const FILE_SEGMENT: usize = 5;

pub fn map_track(entry: &SearchEntry, quality: Quality) -> TrackRecord {
    TrackRecord {
        artist: entry
            .artist
            .as_ref()
            .map(|a| a.name.clone())
            .unwrap_or_default(),
        album: entry
            .album
            .as_ref()
            .map(|a| a.name.clone())
            .unwrap_or_default(),
        title: entry.name.clone(),
        bitrate: quality.bitrate(),
        duration_seconds: entry.duration,
        url: ResolverUrl::track(URL_SCHEME, &entry.id).to_string(),
    }
}

/// Picks the media variant encoded at exactly the requested tier. There is
/// no fallback to a neighbouring tier.
pub fn select_media(medias: &[Media], quality: Quality) -> ResolverResult<&Media> {
    medias
        .iter()
        .find(|m| m.bitrate == Some(quality.bitrate()))
        .ok_or_else(|| ResolverError::LookupFailed {
            message: format!(
                "no {} kbps media among {} variant(s)",
                quality.bitrate(),
                medias.len()
            ),
        })
}

/// Marks the file segment of a media location with the container tag.
pub fn rewrite_location(location: &str) -> ResolverResult<String> {
    let segments: Vec<&str> = location.split('/').collect();
    if segments.len() <= FILE_SEGMENT {
        return Err(ResolverError::LookupFailed {
            message: format!(
                "media location has {} segment(s), expected at least {}",
                segments.len(),
                FILE_SEGMENT + 1
            ),
        });
    }
    let rewritten: Vec<String> = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            if index == FILE_SEGMENT {
                format!("{CONTAINER_TAG}{segment}")
            } else {
                segment.to_string()
            }
        })
        .collect();
    Ok(rewritten.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NamedRef;

    fn media(bitrate: u32, location: &str) -> Media {
        Media {
            bitrate: Some(bitrate),
            location: location.to_string(),
        }
    }

    #[test]
    fn maps_search_entry_to_track_record() {
        let entry = SearchEntry {
            id: "Tra.12345".into(),
            name: "Around the World".into(),
            duration: Some(429),
            artist: Some(NamedRef {
                id: Some("Art.1".into()),
                name: "Daft Punk".into(),
            }),
            album: Some(NamedRef {
                id: None,
                name: "Homework".into(),
            }),
        };
        let record = map_track(&entry, Quality::High);
        assert_eq!(record.artist, "Daft Punk");
        assert_eq!(record.album, "Homework");
        assert_eq!(record.title, "Around the World");
        assert_eq!(record.bitrate, 320);
        assert_eq!(record.duration_seconds, Some(429));
        assert_eq!(record.url, "rhap://track/Tra.12345");
    }

    #[test]
    fn selects_exact_bitrate() {
        let medias = vec![media(64, "low"), media(192, "mid"), media(320, "high")];
        assert_eq!(select_media(&medias, Quality::Normal).unwrap().location, "mid");
        assert_eq!(select_media(&medias, Quality::Low).unwrap().location, "low");
    }

    #[test]
    fn missing_tier_is_a_lookup_failure() {
        let medias = vec![media(64, "low"), media(320, "high")];
        let err = select_media(&medias, Quality::Normal).unwrap_err();
        assert!(matches!(err, ResolverError::LookupFailed { .. }));
    }

    #[test]
    fn rewrites_only_the_file_segment() {
        let rewritten =
            rewrite_location("rtmp://stream.example.com/ondemand/vod/song.m4a").unwrap();
        assert_eq!(rewritten, "rtmp://stream.example.com/ondemand/vod/mp4:song.m4a");
    }

    #[test]
    fn keeps_trailing_segments() {
        let rewritten = rewrite_location("rtmp://h/a/b/c/d/e").unwrap();
        assert_eq!(rewritten, "rtmp://h/a/b/mp4:c/d/e");
    }

    #[test]
    fn short_location_is_rejected() {
        let err = rewrite_location("http://h/file.mp3").unwrap_err();
        assert!(matches!(err, ResolverError::LookupFailed { .. }));
    }

    #[test]
    fn five_segment_location_is_rejected() {
        let err = rewrite_location("rtmp://h/a/b").unwrap_err();
        assert!(matches!(err, ResolverError::LookupFailed { .. }));
    }

    #[test]
    fn missing_artist_and_album_stay_empty() {
        let entry = SearchEntry {
            id: "Tra.9".into(),
            name: "Untitled".into(),
            duration: None,
            artist: None,
            album: None,
        };
        let record = map_track(&entry, Quality::Normal);
        assert_eq!(record.artist, "");
        assert_eq!(record.album, "");
        assert_eq!(record.url, "rhap://track/Tra.9");
    }
}
