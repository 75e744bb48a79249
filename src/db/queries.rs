use rusqlite::{OptionalExtension, params};

use super::models::{ArtistRow, IngestOutcome, LibraryStats, NewTrackData, TrackRow};
use super::{Database, Result};

fn track_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackRow> {
    Ok(TrackRow {
        id: row.get(0)?,
        artist: row.get(1)?,
        title: row.get(2)?,
        features: row.get(3)?,
        misc: row.get(4)?,
        source_id: row.get(5)?,
        file_extension: row.get(6)?,
    })
}

const TRACK_COLUMNS: &str =
    "t.id, a.name, t.title, t.features, t.misc, t.source_id, t.file_extension";

impl Database {
    /// Upsert one extracted record into the catalog.
    ///
    /// Artists are unique case-insensitively; tracks are unique per
    /// (artist, title), also case-insensitively. When the track already
    /// exists, only columns that are currently NULL are filled in; a later,
    /// possibly less complete extraction never clobbers stored values.
    pub fn ingest(&self, data: &NewTrackData) -> Result<IngestOutcome> {
        let artist_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM artists WHERE name = ?1",
                params![data.artist],
                |row| row.get(0),
            )
            .optional()?;

        let (artist_id, new_artist) = match artist_id {
            Some(id) => (id, false),
            None => {
                self.conn.execute(
                    "INSERT INTO artists (name) VALUES (?1)",
                    params![data.artist],
                )?;
                (self.conn.last_insert_rowid(), true)
            }
        };

        type TrackGaps = (i64, Option<String>, Option<String>, Option<String>, Option<String>);
        let existing: Option<TrackGaps> = self
            .conn
            .query_row(
                "SELECT id, features, misc, source_id, file_extension
                 FROM tracks WHERE artist_id = ?1 AND title = ?2",
                params![artist_id, data.title],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((track_id, features, misc, source_id, file_extension)) = existing else {
            self.conn.execute(
                "INSERT INTO tracks (artist_id, title, features, misc, source_id, file_extension)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    artist_id,
                    data.title,
                    data.features,
                    data.misc,
                    data.source_id,
                    data.file_extension,
                ],
            )?;
            return Ok(if new_artist {
                IngestOutcome::InsertedNewArtist
            } else {
                IngestOutcome::Inserted
            });
        };

        // Fill only the gaps
        let mut changed = false;
        let gaps: [(&str, &Option<String>, Option<String>); 4] = [
            ("features", &data.features, features),
            ("misc", &data.misc, misc),
            ("source_id", &data.source_id, source_id),
            ("file_extension", &data.file_extension, file_extension),
        ];
        for (column, incoming, stored) in gaps {
            if stored.is_none() && incoming.is_some() {
                let sql = format!("UPDATE tracks SET {column} = ?1 WHERE id = ?2");
                self.conn.execute(&sql, params![incoming, track_id])?;
                changed = true;
            }
        }

        if changed {
            self.conn.execute(
                "UPDATE tracks SET updated_at = datetime('now') WHERE id = ?1",
                params![track_id],
            )?;
            Ok(IngestOutcome::Updated)
        } else {
            Ok(IngestOutcome::Unchanged)
        }
    }

    /// All artists with their track counts, alphabetical.
    pub fn list_artists(&self) -> Result<Vec<ArtistRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.name, COUNT(t.id)
             FROM artists a
             LEFT JOIN tracks t ON t.artist_id = a.id
             GROUP BY a.id
             ORDER BY a.name",
        )?;
        let artists = stmt
            .query_map([], |row| {
                Ok(ArtistRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    track_count: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(artists)
    }

    /// All tracks belonging to one artist, by title.
    pub fn tracks_for_artist(&self, artist_id: i64) -> Result<Vec<TrackRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS}
             FROM tracks t JOIN artists a ON a.id = t.artist_id
             WHERE t.artist_id = ?1
             ORDER BY t.title"
        ))?;
        let tracks = stmt
            .query_map(params![artist_id], track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Substring search on artist name.
    pub fn search_tracks_by_artist(&self, pattern: &str) -> Result<Vec<TrackRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS}
             FROM tracks t JOIN artists a ON a.id = t.artist_id
             WHERE a.name LIKE ?1
             ORDER BY a.name, t.title"
        ))?;
        let tracks = stmt
            .query_map(params![format!("%{pattern}%")], track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Substring search on track title.
    pub fn search_tracks_by_title(&self, pattern: &str) -> Result<Vec<TrackRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS}
             FROM tracks t JOIN artists a ON a.id = t.artist_id
             WHERE t.title LIKE ?1
             ORDER BY a.name, t.title"
        ))?;
        let tracks = stmt
            .query_map(params![format!("%{pattern}%")], track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Substring search on source id.
    pub fn search_tracks_by_source_id(&self, pattern: &str) -> Result<Vec<TrackRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS}
             FROM tracks t JOIN artists a ON a.id = t.artist_id
             WHERE t.source_id LIKE ?1
             ORDER BY a.name, t.title"
        ))?;
        let tracks = stmt
            .query_map(params![format!("%{pattern}%")], track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Catalog statistics.
    pub fn stats(&self) -> Result<LibraryStats> {
        let total_artists: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM artists", [], |row| row.get(0))?;
        let total_tracks: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        let tracks_with_source_id: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE source_id IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT file_extension, COUNT(*)
             FROM tracks
             WHERE file_extension IS NOT NULL
             GROUP BY file_extension
             ORDER BY COUNT(*) DESC",
        )?;
        let extensions = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(LibraryStats {
            total_artists,
            total_tracks,
            tracks_with_source_id,
            extensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(artist: &str, title: &str) -> NewTrackData {
        NewTrackData {
            artist: artist.to_string(),
            title: title.to_string(),
            features: None,
            misc: None,
            source_id: None,
            file_extension: Some("mp3".to_string()),
        }
    }

    #[test]
    fn test_ingest_new_artist_and_track() {
        let db = Database::open_in_memory().unwrap();
        let outcome = db.ingest(&data("Artist", "Song")).unwrap();
        assert_eq!(outcome, IngestOutcome::InsertedNewArtist);

        let artists = db.list_artists().unwrap();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].name, "Artist");
        assert_eq!(artists[0].track_count, 1);
    }

    #[test]
    fn test_ingest_second_track_same_artist() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&data("Artist", "One")).unwrap();
        let outcome = db.ingest(&data("Artist", "Two")).unwrap();
        assert_eq!(outcome, IngestOutcome::Inserted);
        assert_eq!(db.list_artists().unwrap()[0].track_count, 2);
    }

    #[test]
    fn test_ingest_artist_dedupe_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&data("Artist Name", "One")).unwrap();
        let outcome = db.ingest(&data("ARTIST NAME", "Two")).unwrap();
        assert_eq!(outcome, IngestOutcome::Inserted);
        assert_eq!(db.list_artists().unwrap().len(), 1);
    }

    #[test]
    fn test_ingest_title_dedupe_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&data("Artist", "Song Title")).unwrap();
        let outcome = db.ingest(&data("Artist", "SONG TITLE")).unwrap();
        assert_eq!(outcome, IngestOutcome::Unchanged);
    }

    #[test]
    fn test_merge_fills_only_null_columns() {
        let db = Database::open_in_memory().unwrap();

        let mut first = data("Artist", "Song");
        first.features = Some("X".to_string());
        db.ingest(&first).unwrap();

        let mut second = data("Artist", "Song");
        second.features = Some("Y".to_string());
        second.misc = Some("Z".to_string());
        let outcome = db.ingest(&second).unwrap();
        assert_eq!(outcome, IngestOutcome::Updated);

        let tracks = db.search_tracks_by_title("Song").unwrap();
        assert_eq!(tracks.len(), 1);
        // stored features survive; only the missing misc was filled
        assert_eq!(tracks[0].features.as_deref(), Some("X"));
        assert_eq!(tracks[0].misc.as_deref(), Some("Z"));
    }

    #[test]
    fn test_merge_with_nothing_to_fill_is_unchanged() {
        let db = Database::open_in_memory().unwrap();

        let mut first = data("Artist", "Song");
        first.features = Some("X".to_string());
        db.ingest(&first).unwrap();

        let mut second = data("Artist", "Song");
        second.features = Some("Y".to_string());
        second.file_extension = None;
        let outcome = db.ingest(&second).unwrap();
        assert_eq!(outcome, IngestOutcome::Unchanged);
    }

    #[test]
    fn test_search_by_artist_substring() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&data("Alpha Band", "One")).unwrap();
        db.ingest(&data("Beta", "Two")).unwrap();

        let hits = db.search_tracks_by_artist("Alpha").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].artist, "Alpha Band");
        assert_eq!(hits[0].title, "One");
    }

    #[test]
    fn test_search_by_source_id() {
        let db = Database::open_in_memory().unwrap();
        let mut d = data("Artist", "Song");
        d.source_id = Some("dQw4w9WgXcQ".to_string());
        db.ingest(&d).unwrap();

        assert_eq!(db.search_tracks_by_source_id("dQw4").unwrap().len(), 1);
        assert!(db.search_tracks_by_source_id("zzzz").unwrap().is_empty());
    }

    #[test]
    fn test_tracks_for_artist() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&data("Artist", "B Side")).unwrap();
        db.ingest(&data("Artist", "A Side")).unwrap();

        let artist = &db.list_artists().unwrap()[0];
        let tracks = db.tracks_for_artist(artist.id).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title, "A Side");
    }

    #[test]
    fn test_stats() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&data("A", "One")).unwrap();
        let mut d = data("B", "Two");
        d.source_id = Some("abc123DEF45".to_string());
        d.file_extension = Some("flac".to_string());
        db.ingest(&d).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_artists, 2);
        assert_eq!(stats.total_tracks, 2);
        assert_eq!(stats.tracks_with_source_id, 1);
        assert_eq!(stats.extensions.len(), 2);
    }
}
