//! Media extension classification
//!
//! The set of accepted containers is closed. Classification decides whether
//! the extraction stage has to pull an audio track out of a video container.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Accepted input container types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaExtension {
    Mp3,
    Wav,
    Flac,
    M4a,
    Aac,
    Ogg,
    Mp4,
    Mov,
    Mkv,
}

impl MediaExtension {
    /// Every supported extension
    pub const ALL: [MediaExtension; 9] = [
        MediaExtension::Mp3,
        MediaExtension::Wav,
        MediaExtension::Flac,
        MediaExtension::M4a,
        MediaExtension::Aac,
        MediaExtension::Ogg,
        MediaExtension::Mp4,
        MediaExtension::Mov,
        MediaExtension::Mkv,
    ];

    /// Classify a file by its extension (case-insensitive)
    ///
    /// Returns `None` for missing or unsupported extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    /// Lowercase extension without leading dot
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaExtension::Mp3 => "mp3",
            MediaExtension::Wav => "wav",
            MediaExtension::Flac => "flac",
            MediaExtension::M4a => "m4a",
            MediaExtension::Aac => "aac",
            MediaExtension::Ogg => "ogg",
            MediaExtension::Mp4 => "mp4",
            MediaExtension::Mov => "mov",
            MediaExtension::Mkv => "mkv",
        }
    }

    /// True for containers that carry video alongside audio
    pub fn has_video(&self) -> bool {
        matches!(
            self,
            MediaExtension::Mp4 | MediaExtension::Mov | MediaExtension::Mkv
        )
    }
}

impl FromStr for MediaExtension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim_start_matches('.').to_ascii_lowercase();
        MediaExtension::ALL
            .into_iter()
            .find(|ext| ext.as_str() == normalized)
            .ok_or_else(|| format!("unsupported media extension: {}", s))
    }
}

impl fmt::Display for MediaExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_case_insensitively() {
        assert_eq!(
            MediaExtension::from_path(Path::new("Song.MP3")),
            Some(MediaExtension::Mp3)
        );
        assert_eq!(
            MediaExtension::from_path(Path::new("clip.MkV")),
            Some(MediaExtension::Mkv)
        );
    }

    #[test]
    fn rejects_unknown_and_missing_extensions() {
        assert_eq!(MediaExtension::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaExtension::from_path(Path::new("README")), None);
        assert_eq!(MediaExtension::from_path(Path::new("archive.mp3.zip")), None);
    }

    #[test]
    fn only_containers_with_video_need_extraction() {
        let video: Vec<_> = MediaExtension::ALL
            .into_iter()
            .filter(MediaExtension::has_video)
            .collect();
        assert_eq!(
            video,
            vec![MediaExtension::Mp4, MediaExtension::Mov, MediaExtension::Mkv]
        );
    }

    #[test]
    fn parses_with_or_without_dot() {
        assert_eq!(".flac".parse::<MediaExtension>(), Ok(MediaExtension::Flac));
        assert_eq!("OGG".parse::<MediaExtension>(), Ok(MediaExtension::Ogg));
        assert!("webm".parse::<MediaExtension>().is_err());
    }
}
