use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::FieldDefaults;
use crate::extract::{ExtractStatus, ExtractedRecord};

/// Candidate filename layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConstructStyle {
    /// Human-readable dash form: `artist - title ft. F (M) [S].ext`
    #[default]
    Simple,
    /// Bracketed canonical form: `[artist][title][F][M][S].ext`
    Block,
}

impl fmt::Display for ConstructStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Block => write!(f, "block"),
        }
    }
}

impl FromStr for ConstructStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "block" => Ok(Self::Block),
            other => Err(format!(
                "unknown construction style '{other}' (expected 'simple' or 'block')"
            )),
        }
    }
}

/// Renders candidate filenames from an extracted record.
///
/// Construction is pure: the caller decides whether to rename anything.
/// Unset fields render as the configured default placeholder, never as an
/// empty string, so bracket/field counts stay stable for re-parsing.
pub struct Constructor<'a> {
    defaults: &'a FieldDefaults,
    style: ConstructStyle,
}

impl<'a> Constructor<'a> {
    pub fn new(defaults: &'a FieldDefaults, style: ConstructStyle) -> Self {
        Self { defaults, style }
    }

    /// All candidate filenames for a record, least detailed first.
    /// `Unmatched` records have nothing to construct and yield an empty list.
    pub fn candidates(&self, record: &ExtractedRecord) -> Vec<String> {
        if record.status == ExtractStatus::Unmatched {
            return Vec::new();
        }

        let artist = record.artist.as_deref().unwrap_or(&self.defaults.artist);
        let title = record.title.as_deref().unwrap_or(&self.defaults.title);
        let features = if record.features.is_empty() {
            self.defaults.features.clone()
        } else {
            record.features.join(", ")
        };
        let misc = if record.misc.is_empty() {
            self.defaults.misc.clone()
        } else {
            record.misc.join(", ")
        };
        let source_id = record
            .source_id
            .as_deref()
            .unwrap_or(&self.defaults.source_id);
        let ext = record
            .file_extension
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.defaults.filetype);

        match self.style {
            ConstructStyle::Simple => vec![
                format!("{artist} - {title}.{ext}"),
                format!("{artist} - {title} ft. {features}.{ext}"),
                format!("{artist} - {title} ({misc}).{ext}"),
                format!("{artist} - {title} [{source_id}].{ext}"),
                format!("{artist} - {title} ft. {features} ({misc}).{ext}"),
                format!("{artist} - {title} ft. {features} [{source_id}].{ext}"),
                format!("{artist} - {title} ft. {features} ({misc}) [{source_id}].{ext}"),
            ],
            ConstructStyle::Block => vec![
                format!("[{artist}][{title}][{features}].{ext}"),
                format!("[{artist}][{title}][{features}][{misc}].{ext}"),
                format!("[{artist}][{title}][{features}][{misc}][{source_id}].{ext}"),
            ],
        }
    }

    /// The single most detailed candidate (the last of `candidates`).
    pub fn auto(&self, record: &ExtractedRecord) -> Option<String> {
        self.candidates(record).pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ExtractedRecord {
        ExtractedRecord {
            original_filename: "orig.mp3".to_string(),
            artist: Some("A".to_string()),
            title: Some("B".to_string()),
            features: vec!["C".to_string()],
            misc: vec!["D".to_string()],
            source_id: Some("E".to_string()),
            file_extension: Some("mp3".to_string()),
            status: ExtractStatus::Matched,
        }
    }

    #[test]
    fn test_block_auto_most_detailed() {
        let defaults = FieldDefaults::default();
        let c = Constructor::new(&defaults, ConstructStyle::Block);
        assert_eq!(c.auto(&record()).as_deref(), Some("[A][B][C][D][E].mp3"));
    }

    #[test]
    fn test_block_candidates_progressive() {
        let defaults = FieldDefaults::default();
        let c = Constructor::new(&defaults, ConstructStyle::Block);
        assert_eq!(
            c.candidates(&record()),
            vec![
                "[A][B][C].mp3",
                "[A][B][C][D].mp3",
                "[A][B][C][D][E].mp3",
            ]
        );
    }

    #[test]
    fn test_simple_candidates_progressive() {
        let defaults = FieldDefaults::default();
        let c = Constructor::new(&defaults, ConstructStyle::Simple);
        assert_eq!(
            c.candidates(&record()),
            vec![
                "A - B.mp3",
                "A - B ft. C.mp3",
                "A - B (D).mp3",
                "A - B [E].mp3",
                "A - B ft. C (D).mp3",
                "A - B ft. C [E].mp3",
                "A - B ft. C (D) [E].mp3",
            ]
        );
    }

    #[test]
    fn test_multiple_features_joined() {
        let defaults = FieldDefaults::default();
        let mut r = record();
        r.features = vec!["X".to_string(), "Y".to_string()];
        let c = Constructor::new(&defaults, ConstructStyle::Block);
        assert_eq!(c.auto(&r).as_deref(), Some("[A][B][X, Y][D][E].mp3"));
    }

    #[test]
    fn test_unset_fields_render_placeholders() {
        let defaults = FieldDefaults::default();
        let mut r = record();
        r.features = Vec::new();
        r.misc = Vec::new();
        r.source_id = None;
        let c = Constructor::new(&defaults, ConstructStyle::Block);
        assert_eq!(c.auto(&r).as_deref(), Some("[A][B][None][None][None].mp3"));
    }

    #[test]
    fn test_missing_extension_uses_default() {
        let defaults = FieldDefaults::default();
        let mut r = record();
        r.file_extension = None;
        let c = Constructor::new(&defaults, ConstructStyle::Simple);
        assert_eq!(c.candidates(&r)[0], "A - B.mp3");
    }

    #[test]
    fn test_unmatched_yields_nothing() {
        let defaults = FieldDefaults::default();
        let mut r = record();
        r.status = ExtractStatus::Unmatched;
        let c = Constructor::new(&defaults, ConstructStyle::Simple);
        assert!(c.candidates(&r).is_empty());
        assert_eq!(c.auto(&r), None);
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("simple".parse::<ConstructStyle>(), Ok(ConstructStyle::Simple));
        assert_eq!("Block".parse::<ConstructStyle>(), Ok(ConstructStyle::Block));
        assert!("fancy".parse::<ConstructStyle>().is_err());
    }
}
