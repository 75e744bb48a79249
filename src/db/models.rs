use crate::extract::{ExtractStatus, ExtractedRecord};

/// Data for inserting or merging one track (ingest phase).
/// Field lists are flattened to comma-joined text; empty lists become NULL so
/// the null-preserving merge can fill them in later.
#[derive(Debug, Clone)]
pub struct NewTrackData {
    pub artist: String,
    pub title: String,
    pub features: Option<String>,
    pub misc: Option<String>,
    pub source_id: Option<String>,
    pub file_extension: Option<String>,
}

impl NewTrackData {
    /// Build ingest data from an extraction. `Unmatched` records carry no
    /// trustworthy fields and yield `None`.
    pub fn from_record(record: &ExtractedRecord) -> Option<Self> {
        if record.status == ExtractStatus::Unmatched {
            return None;
        }
        let artist = record.artist.clone()?;
        let title = record.title.clone()?;
        Some(Self {
            artist,
            title,
            features: join_nonempty(&record.features),
            misc: join_nonempty(&record.misc),
            source_id: record.source_id.clone(),
            file_extension: record.file_extension.clone(),
        })
    }
}

fn join_nonempty(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// An artist row with its track count.
#[derive(Debug, Clone)]
pub struct ArtistRow {
    pub id: i64,
    pub name: String,
    pub track_count: i64,
}

/// A track row read from the database (joined with its artist).
#[derive(Debug, Clone)]
pub struct TrackRow {
    pub id: i64,
    pub artist: String,
    pub title: String,
    pub features: Option<String>,
    pub misc: Option<String>,
    pub source_id: Option<String>,
    pub file_extension: Option<String>,
}

/// What happened to one record during ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New artist and first track for it.
    InsertedNewArtist,
    /// New track for an existing artist.
    Inserted,
    /// Existing track gained at least one previously-missing field.
    Updated,
    /// Existing track already had every field the record offers.
    Unchanged,
    /// Record was `Unmatched`, nothing to store.
    Skipped,
}

/// Counters accumulated over a batch of ingests.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub new_artists: u64,
    pub new_tracks: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub skipped: u64,
}

impl IngestStats {
    pub fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::InsertedNewArtist => {
                self.new_artists += 1;
                self.new_tracks += 1;
            }
            IngestOutcome::Inserted => self.new_tracks += 1,
            IngestOutcome::Updated => self.updated += 1,
            IngestOutcome::Unchanged => self.unchanged += 1,
            IngestOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Catalog statistics for the `stats` command.
#[derive(Debug)]
pub struct LibraryStats {
    pub total_artists: i64,
    pub total_tracks: i64,
    pub tracks_with_source_id: i64,
    pub extensions: Vec<(String, i64)>,
}
