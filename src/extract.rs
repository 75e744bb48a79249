use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

use crate::config::AppConfig;

/// Outcome of one extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractStatus {
    /// Every identity field was parsed from the filename itself.
    Matched,
    /// Artist or title fell back to a configured default.
    DefaultFilled,
    /// No structural pattern applied; all semantic fields are unset.
    Unmatched,
}

/// Structured result of parsing one filename.
///
/// Created fresh per extraction call and never mutated afterwards.
/// `original_filename` always holds the basename of the input verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    pub original_filename: String,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub features: Vec<String>,
    pub misc: Vec<String>,
    pub source_id: Option<String>,
    pub file_extension: Option<String>,
    pub status: ExtractStatus,
}

impl ExtractedRecord {
    fn unmatched(name: &str) -> Self {
        Self {
            original_filename: name.to_string(),
            artist: None,
            title: None,
            features: Vec::new(),
            misc: Vec::new(),
            source_id: None,
            file_extension: None,
            status: ExtractStatus::Unmatched,
        }
    }
}

// Tier 2: fully bracketed layouts, the system's own round-trip output.
// Anchored so a junk prefix can never smuggle a partial block through.
static BLOCK5_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(.+?)\]\[(.+?)\]\[(.+?)\]\[(.+?)\]\[(.+?)\]\.(\w+)$").unwrap()
});
static BLOCK4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(.+?)\]\[(.+?)\]\[(.+?)\]\[(.+?)\]\.(\w+)$").unwrap()
});
static BLOCK3_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.+?)\]\[(.+?)\]\[(.+?)\]\.(\w+)$").unwrap());

// Tier 3: feature notation, in decreasing priority. Each entry is
// (pattern, name group, terminator group). The regex crate has no lookahead,
// so bare forms capture their terminating delimiter and removal stops just
// before it. A bare span with no terminator before end-of-string does not
// match at all.
static FEATURE_RULES: LazyLock<Vec<(Regex, usize, Option<usize>)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"\([fF]t[. |](.+?)\)").unwrap(), 1, None),
        (
            Regex::new(r#"(?:[fF]t[. |]|[wW]/)(.+?)([-'"().\[])"#).unwrap(),
            1,
            Some(2),
        ),
        (Regex::new(r"\([fF]eat[. |](.+?)\)").unwrap(), 1, None),
        (
            Regex::new(r#"[fF]eat[. |](.+?)([-'"().\[])"#).unwrap(),
            1,
            Some(2),
        ),
    ]
});

// Tier 4: parenthesized/bracketed annotations and producer credits.
static MISC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\(.+?\))|(\[.+?\])|([pP]rod\.? ?[bB]y \w+)").unwrap());

// A bracketed span of exactly 11 id characters is a source identifier,
// not free-text misc.
static SOURCE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

// Tier 5: ARTIST - TITLE split. The dash needs a space on at least one side,
// otherwise hyphenated names would shatter.
static DASH_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?) ?- (.+?)\.(\w+)$").unwrap());
static DASH_SPLIT_LOOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?) -(.+?)\.(\w+)$").unwrap());
static SINGLE_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\.(\w+)$").unwrap());

// Tier 6: a title hiding inside the artist segment as a quoted span or a
// colon/bullet suffix (full-width forms included).
static TITLE_IN_ARTIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(["'“”＂].+?["'“”＂])|([：:•].+)"#).unwrap());

/// Delimiter characters stripped from both ends of artist/title values.
const EDGE_DELIMITERS: &[char] = &['-', '：', ':', '•', '＂', '"', '\'', '“', '”'];

fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || EDGE_DELIMITERS.contains(&c))
}

/// Title casing: first letter of each alphabetic run uppercased, the rest
/// lowercased. Any non-letter resets the run, so "don't" becomes "Don'T",
/// matching the catalog's historical casing.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Apply the feature rules in priority order against the working string.
/// Each rule fires at most once; its span is removed before the next rule
/// runs, so later rules always see the already-trimmed string.
fn extract_features(work: &mut String) -> Vec<String> {
    let mut features = Vec::new();
    for (re, name_group, term_group) in FEATURE_RULES.iter() {
        let Some(caps) = re.captures(work) else {
            continue;
        };
        let whole = caps.get(0).unwrap();
        let end = (*term_group)
            .and_then(|g| caps.get(g))
            .map(|m| m.start())
            .unwrap_or(whole.end());
        let name = caps
            .get(*name_group)
            .map(|m| m.as_str())
            .unwrap_or("")
            .trim()
            .trim_end_matches(['-', '[', '('])
            .trim()
            .to_string();
        work.replace_range(whole.start()..end, "");
        if !name.is_empty() {
            features.push(name);
        }
    }
    features
}

/// Exhaustive left-to-right scan for misc spans. Every span found is removed
/// from the working string; bracketed spans that look like an external video
/// id become the source id instead of a misc entry.
fn extract_misc(work: &mut String, source_id: &mut Option<String>) -> Vec<String> {
    let snapshot = work.clone();
    let mut misc = Vec::new();
    for caps in MISC_RE.captures_iter(&snapshot) {
        let span = caps.get(0).unwrap().as_str();
        let Some(pos) = work.find(span) else {
            continue;
        };
        work.replace_range(pos..pos + span.len(), "");
        while work.contains("  ") {
            let collapsed = work.replace("  ", " ");
            *work = collapsed;
        }
        let entry = span.trim_matches(|c: char| "()[] ".contains(c)).to_string();
        if entry.is_empty() {
            continue;
        }
        if caps.get(2).is_some() && source_id.is_none() && SOURCE_ID_RE.is_match(&entry) {
            *source_id = Some(entry);
        } else {
            misc.push(entry);
        }
    }
    misc
}

struct SplitParts {
    artist: String,
    title: Option<String>,
    extension: String,
}

fn split_artist_title(work: &str) -> Option<SplitParts> {
    for re in [&*DASH_SPLIT_RE, &*DASH_SPLIT_LOOSE_RE] {
        if let Some(c) = re.captures(work) {
            return Some(SplitParts {
                artist: c[1].trim().to_string(),
                title: Some(c[2].trim().to_string()),
                extension: c[3].to_string(),
            });
        }
    }
    SINGLE_SEGMENT_RE.captures(work).map(|c| SplitParts {
        artist: c[1].trim().to_string(),
        title: None,
        extension: c[2].to_string(),
    })
}

/// Filename extraction engine: an ordered cascade of structural patterns,
/// most specific first. Holds only a borrowed configuration; no state is
/// retained between calls.
pub struct Extractor<'a> {
    config: &'a AppConfig,
}

impl<'a> Extractor<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }

    /// Parse a filename into a structured record. Total: never fails, never
    /// panics; unparseable input comes back as `Unmatched`. Any directory
    /// prefix is stripped before matching.
    pub fn extract(&self, filename: &str) -> ExtractedRecord {
        let name = Path::new(filename)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);

        // Tier 1: extension gate
        let Some((_, ext)) = name.rsplit_once('.') else {
            return ExtractedRecord::unmatched(name);
        };
        if !self.extension_allowed(ext) {
            return ExtractedRecord::unmatched(name);
        }

        // Tier 2: block layouts short-circuit the whole cascade
        if let Some(rec) = self.try_block(name) {
            return rec;
        }

        self.standard_cascade(name)
    }

    /// Whether an extension passes the configured allow-list.
    pub fn extension_allowed(&self, ext: &str) -> bool {
        if self.config.case_insensitive_extensions {
            let ext = ext.to_lowercase();
            self.config
                .extensions
                .iter()
                .any(|e| e.to_lowercase() == ext)
        } else {
            self.config.extensions.iter().any(|e| e == ext)
        }
    }

    /// Block-formatted names are our own output; values are taken verbatim
    /// (trimmed only, no recasing) so a round trip reproduces the record
    /// exactly. Missing trailing groups stay unset.
    fn try_block(&self, name: &str) -> Option<ExtractedRecord> {
        if let Some(c) = BLOCK5_RE.captures(name) {
            return Some(ExtractedRecord {
                original_filename: name.to_string(),
                artist: Some(c[1].trim().to_string()),
                title: Some(c[2].trim().to_string()),
                features: split_block_group(&c[3]),
                misc: split_block_group(&c[4]),
                source_id: Some(c[5].trim().to_string()),
                file_extension: Some(c[6].to_string()),
                status: ExtractStatus::Matched,
            });
        }
        if let Some(c) = BLOCK4_RE.captures(name) {
            return Some(ExtractedRecord {
                original_filename: name.to_string(),
                artist: Some(c[1].trim().to_string()),
                title: Some(c[2].trim().to_string()),
                features: split_block_group(&c[3]),
                misc: split_block_group(&c[4]),
                source_id: None,
                file_extension: Some(c[5].to_string()),
                status: ExtractStatus::Matched,
            });
        }
        if let Some(c) = BLOCK3_RE.captures(name) {
            return Some(ExtractedRecord {
                original_filename: name.to_string(),
                artist: Some(c[1].trim().to_string()),
                title: Some(c[2].trim().to_string()),
                features: split_block_group(&c[3]),
                misc: Vec::new(),
                source_id: None,
                file_extension: Some(c[4].to_string()),
                status: ExtractStatus::Matched,
            });
        }
        None
    }

    fn standard_cascade(&self, name: &str) -> ExtractedRecord {
        let mut work = name.to_string();

        // Tier 3: features first, so their parens don't pollute misc
        let raw_features = extract_features(&mut work);

        // Tier 4: everything parenthesized/bracketed that's left
        let mut source_id = None;
        let misc = extract_misc(&mut work, &mut source_id);

        // Tier 5: artist/title split; terminal failure if nothing applies
        let Some(parts) = split_artist_title(&work) else {
            return ExtractedRecord::unmatched(name);
        };
        let SplitParts {
            mut artist,
            mut title,
            extension,
        } = parts;

        // Tier 6: some sources put the title inside the artist segment
        if title.is_none() {
            if let Some(caps) = TITLE_IN_ARTIST_RE.captures(&artist) {
                let span = caps.get(1).or_else(|| caps.get(2)).unwrap();
                let span_text = span.as_str().to_string();
                artist = artist.replacen(&span_text, "", 1).trim().to_string();
                title = Some(span_text);
            }
        }

        // Tier 7: normalization and default fill
        let defaults = &self.config.defaults;
        let mut used_default = false;

        let artist = {
            let cleaned = title_case(trim_edges(&artist));
            if cleaned.is_empty() {
                used_default = true;
                defaults.artist.clone()
            } else {
                cleaned
            }
        };
        let title = match title.as_deref().map(trim_edges).filter(|t| !t.is_empty()) {
            Some(t) => title_case(t),
            None => {
                used_default = true;
                defaults.title.clone()
            }
        };
        let features: Vec<String> = raw_features
            .iter()
            .map(|f| title_case(trim_edges(f)))
            .filter(|f| !f.is_empty())
            .collect();

        ExtractedRecord {
            original_filename: name.to_string(),
            artist: Some(artist),
            title: Some(title),
            features,
            misc,
            source_id,
            file_extension: Some(extension),
            status: if used_default {
                ExtractStatus::DefaultFilled
            } else {
                ExtractStatus::Matched
            },
        }
    }
}

fn split_block_group(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn extract(name: &str) -> ExtractedRecord {
        let config = AppConfig::default();
        Extractor::new(&config).extract(name)
    }

    // === Extension gate ===

    #[test]
    fn test_gate_rejects_unlisted_extension() {
        let r = extract("randomfile.txt");
        assert_eq!(r.status, ExtractStatus::Unmatched);
        assert_eq!(r.original_filename, "randomfile.txt");
        assert_eq!(r.artist, None);
        assert_eq!(r.title, None);
        assert!(r.features.is_empty());
        assert!(r.misc.is_empty());
        assert_eq!(r.source_id, None);
        assert_eq!(r.file_extension, None);
    }

    #[test]
    fn test_gate_rejects_no_extension() {
        assert_eq!(extract("README").status, ExtractStatus::Unmatched);
    }

    #[test]
    fn test_gate_empty_input() {
        assert_eq!(extract("").status, ExtractStatus::Unmatched);
    }

    #[test]
    fn test_gate_case_insensitive_by_default() {
        let r = extract("Artist - Title.MP3");
        assert_eq!(r.status, ExtractStatus::Matched);
        // stored extension keeps its original case
        assert_eq!(r.file_extension.as_deref(), Some("MP3"));
    }

    #[test]
    fn test_gate_case_sensitive_when_configured() {
        let mut config = AppConfig::default();
        config.case_insensitive_extensions = false;
        let r = Extractor::new(&config).extract("Artist - Title.MP3");
        assert_eq!(r.status, ExtractStatus::Unmatched);
    }

    #[test]
    fn test_directory_prefix_stripped() {
        let r = extract("some/dir/Artist - Title.mp3");
        assert_eq!(r.original_filename, "Artist - Title.mp3");
        assert_eq!(r.artist.as_deref(), Some("Artist"));
    }

    // === Block tier ===

    #[test]
    fn test_block5_verbatim() {
        let r = extract("[Artist][Title][Feat][Misc][abc123DEF45].mp3");
        assert_eq!(r.status, ExtractStatus::Matched);
        assert_eq!(r.artist.as_deref(), Some("Artist"));
        assert_eq!(r.title.as_deref(), Some("Title"));
        assert_eq!(r.features, vec!["Feat"]);
        assert_eq!(r.misc, vec!["Misc"]);
        assert_eq!(r.source_id.as_deref(), Some("abc123DEF45"));
        assert_eq!(r.file_extension.as_deref(), Some("mp3"));
    }

    #[test]
    fn test_block_short_circuits_later_tiers() {
        // feature/misc markers inside brackets survive verbatim, proof that
        // the feature and misc tiers never ran
        let r = extract("[A ft. B][Title (Live)][C][D][abc123DEF45].mp3");
        assert_eq!(r.artist.as_deref(), Some("A ft. B"));
        assert_eq!(r.title.as_deref(), Some("Title (Live)"));
        assert_eq!(r.status, ExtractStatus::Matched);
    }

    #[test]
    fn test_block4_without_source_id() {
        let r = extract("[A][B][C][D].flac");
        assert_eq!(r.status, ExtractStatus::Matched);
        assert_eq!(r.source_id, None);
        assert_eq!(r.misc, vec!["D"]);
        assert_eq!(r.file_extension.as_deref(), Some("flac"));
    }

    #[test]
    fn test_block3_minimal() {
        let r = extract("[A][B][C].mp3");
        assert_eq!(r.status, ExtractStatus::Matched);
        assert_eq!(r.features, vec!["C"]);
        assert!(r.misc.is_empty());
        assert_eq!(r.source_id, None);
    }

    #[test]
    fn test_block_trims_whitespace() {
        let r = extract("[ A ][ B ][ C ][ D ][ E ].mp3");
        assert_eq!(r.artist.as_deref(), Some("A"));
        assert_eq!(r.title.as_deref(), Some("B"));
        assert_eq!(r.source_id.as_deref(), Some("E"));
    }

    #[test]
    fn test_block_splits_joined_features() {
        let r = extract("[A][B][X, Y][D][E].mp3");
        assert_eq!(r.features, vec!["X", "Y"]);
    }

    #[test]
    fn test_block_requires_full_bracketing() {
        // junk prefix before the brackets must not reach the block tier
        let r = extract("01 [A][B][C].mp3");
        assert_ne!(r.artist.as_deref(), Some("A"));
    }

    // === Standard cascade ===

    #[test]
    fn test_standard_full_form() {
        let r = extract("Artist Name - Song Title ft. Feature Guy (Remix).mp3");
        assert_eq!(r.status, ExtractStatus::Matched);
        assert_eq!(r.artist.as_deref(), Some("Artist Name"));
        assert_eq!(r.title.as_deref(), Some("Song Title"));
        assert_eq!(r.features, vec!["Feature Guy"]);
        assert_eq!(r.misc, vec!["Remix"]);
        assert_eq!(r.source_id, None);
        assert_eq!(r.file_extension.as_deref(), Some("mp3"));
    }

    #[test]
    fn test_parenthesized_ft() {
        let r = extract("Artist - Title (ft. Guest).mp3");
        assert_eq!(r.features, vec!["Guest"]);
        assert_eq!(r.title.as_deref(), Some("Title"));
        assert_eq!(r.status, ExtractStatus::Matched);
    }

    #[test]
    fn test_parenthesized_feat() {
        let r = extract("Artist - Title (feat. Guest).mp3");
        assert_eq!(r.features, vec!["Guest"]);
    }

    #[test]
    fn test_w_slash_feature() {
        let r = extract("Artist - Title w/Guest (Live).mp3");
        assert_eq!(r.features, vec!["Guest"]);
        assert_eq!(r.misc, vec!["Live"]);
    }

    #[test]
    fn test_multiple_feature_rules_accumulate() {
        let r = extract("A - B (ft. X) feat. Y.mp3");
        assert_eq!(r.features, vec!["X", "Y"]);
        assert_eq!(r.title.as_deref(), Some("B"));
    }

    #[test]
    fn test_feature_extraction_idempotent() {
        let mut work = "Artist - Title ft. Guest (Remix).mp3".to_string();
        let first = extract_features(&mut work);
        assert_eq!(first, vec!["Guest"]);
        let mut second_input = work.clone();
        let again = extract_features(&mut second_input);
        assert!(again.is_empty(), "second pass found {:?} in {:?}", again, work);
    }

    #[test]
    fn test_multiple_misc_spans_in_scan_order() {
        let r = extract("Artist - Title (Remix) [Official Video].mp3");
        assert_eq!(r.misc, vec!["Remix", "Official Video"]);
    }

    #[test]
    fn test_prod_by_span() {
        let r = extract("Artist - Title prod. by Someone.mp3");
        assert_eq!(r.misc, vec!["prod. by Someone"]);
        assert_eq!(r.title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_bracketed_source_id() {
        let r = extract("Artist - Title ft. Guest (Remix) [dQw4w9WgXcQ].mp3");
        assert_eq!(r.source_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(r.misc, vec!["Remix"]);
        assert_eq!(r.status, ExtractStatus::Matched);
    }

    #[test]
    fn test_bracketed_text_is_misc_not_source_id() {
        let r = extract("Artist - Title [Official Video].mp3");
        assert_eq!(r.source_id, None);
        assert_eq!(r.misc, vec!["Official Video"]);
    }

    #[test]
    fn test_artist_only_default_filled() {
        let r = extract("OnlyArtistName.mp3");
        assert_eq!(r.status, ExtractStatus::DefaultFilled);
        assert_eq!(r.artist.as_deref(), Some("Onlyartistname"));
        assert_eq!(r.title.as_deref(), Some("Unknown Title"));
        assert_eq!(r.file_extension.as_deref(), Some("mp3"));
    }

    #[test]
    fn test_quoted_title_in_artist() {
        let r = extract("Artist 'Song Name'.mp3");
        assert_eq!(r.artist.as_deref(), Some("Artist"));
        assert_eq!(r.title.as_deref(), Some("Song Name"));
        assert_eq!(r.status, ExtractStatus::Matched);
    }

    #[test]
    fn test_colon_title_in_artist() {
        let r = extract("Artist: Song Name.mp3");
        assert_eq!(r.artist.as_deref(), Some("Artist"));
        assert_eq!(r.title.as_deref(), Some("Song Name"));
    }

    #[test]
    fn test_fullwidth_quoted_title_in_artist() {
        let r = extract("Artist ＂Song Name＂.mp3");
        assert_eq!(r.artist.as_deref(), Some("Artist"));
        assert_eq!(r.title.as_deref(), Some("Song Name"));
    }

    #[test]
    fn test_residual_delimiters_trimmed() {
        let r = extract("Artist - Title-.mp3");
        assert_eq!(r.title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_hyphenated_name_not_split() {
        // dash without surrounding space is part of the name
        let r = extract("Jay-Z.mp3");
        assert_eq!(r.artist.as_deref(), Some("Jay-Z"));
        assert_eq!(r.status, ExtractStatus::DefaultFilled);
    }

    #[test]
    fn test_no_structure_at_all() {
        assert_eq!(extract(".mp3").status, ExtractStatus::Unmatched);
    }

    // === Round trip ===

    #[test]
    fn test_block5_round_trip() {
        use crate::construct::{ConstructStyle, Constructor};
        let config = AppConfig::default();
        let extractor = Extractor::new(&config);
        let constructor = Constructor::new(&config.defaults, ConstructStyle::Block);

        let first = extractor.extract("[Artist][Title][Feat][Misc][abc123DEF45].mp3");
        let rebuilt = constructor.auto(&first).unwrap();
        assert_eq!(rebuilt, "[Artist][Title][Feat][Misc][abc123DEF45].mp3");
        let second = extractor.extract(&rebuilt);
        assert_eq!(first, second);
    }

    #[test]
    fn test_simple_output_round_trips() {
        use crate::construct::{ConstructStyle, Constructor};
        let config = AppConfig::default();
        let extractor = Extractor::new(&config);
        let constructor = Constructor::new(&config.defaults, ConstructStyle::Simple);

        let first = extractor.extract("Artist - Title ft. Guest (Remix) [dQw4w9WgXcQ].mp3");
        let rebuilt = constructor.auto(&first).unwrap();
        let second = extractor.extract(&rebuilt);
        assert_eq!(second.artist, first.artist);
        assert_eq!(second.title, first.title);
        assert_eq!(second.features, first.features);
        assert_eq!(second.misc, first.misc);
        assert_eq!(second.source_id, first.source_id);
    }

    // === Helpers ===

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("OnlyArtistName"), "Onlyartistname");
        assert_eq!(title_case("artist name"), "Artist Name");
        assert_eq!(title_case("don't"), "Don'T");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_trim_edges() {
        assert_eq!(trim_edges("  -Title- "), "Title");
        assert_eq!(trim_edges("：Song："), "Song");
        assert_eq!(trim_edges("\"Quoted\""), "Quoted");
    }
}
