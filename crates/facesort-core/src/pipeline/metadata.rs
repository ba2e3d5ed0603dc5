//! Capture-timestamp extraction.
//!
//! Order of preference: EXIF `DateTimeOriginal`, then EXIF `DateTime`, then an
//! OS extended attribute written by a prior facesort run on the same file.
//! Filesystem mtime is never consulted — it reflects when a file was copied
//! or touched, not when the photo was taken.

use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Reader, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const XATTR_NAME: &str = "user.facesort.captured_at";

/// Extracts capture timestamps from image files.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract the best-available capture instant for a file.
    ///
    /// Returns `None` if no tier yields a parseable timestamp; callers route
    /// such images to the `UnknownSubjects` / manual-review category rather
    /// than substituting any other clock.
    pub fn extract_captured_at(path: &Path) -> Option<DateTime<Utc>> {
        Self::from_exif(path)
            .or_else(|| Self::from_xattr(path))
    }

    /// Record a capture instant as an extended attribute, so a later run over
    /// a re-encoded copy (EXIF stripped) can still recover it.
    pub fn remember_captured_at(path: &Path, captured_at: DateTime<Utc>) {
        let _ = xattr::set(path, XATTR_NAME, captured_at.to_rfc3339().as_bytes());
    }

    fn from_exif(path: &Path) -> Option<DateTime<Utc>> {
        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(file);
        let exif = Reader::new().read_from_container(&mut reader).ok()?;

        let raw = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))
            .map(|f| f.display_value().to_string())?;

        Self::parse_exif_datetime(&raw)
    }

    fn from_xattr(path: &Path) -> Option<DateTime<Utc>> {
        let bytes = xattr::get(path, XATTR_NAME).ok()??;
        let text = std::str::from_utf8(&bytes).ok()?;
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// EXIF datetimes are "YYYY:MM:DD HH:MM:SS" in an unspecified local
    /// timezone. We parse naively and treat it as UTC: the clusterer only
    /// ever compares two such instants against each other, so a shared offset
    /// error cancels out.
    fn parse_exif_datetime(raw: &str) -> Option<DateTime<Utc>> {
        let cleaned = raw.trim_matches('"');
        NaiveDateTime::parse_from_str(cleaned, "%Y:%m:%d %H:%M:%S")
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_missing_file() {
        let result = MetadataExtractor::extract_captured_at(Path::new("/nonexistent/file.jpg"));
        assert!(result.is_none());
    }

    #[test]
    fn test_parse_exif_datetime() {
        let parsed = MetadataExtractor::parse_exif_datetime("2024:03:15 14:30:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-15T14:30:00+00:00");
    }

    #[test]
    fn test_parse_exif_datetime_rejects_garbage() {
        assert!(MetadataExtractor::parse_exif_datetime("not a date").is_none());
    }
}
