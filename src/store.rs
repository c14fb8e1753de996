//! CSV-backed record store.
//!
//! Holds the whole catalog in memory, in file order, and rewrites the backing
//! file after every mutation. Reads share a lock; each mutation holds the
//! write lock across both the in-memory change and the file rewrite, so
//! readers never observe a half-applied write.

use crate::error::{Result, StoreError};
use crate::field::{Field, FieldValue};
use crate::serie::{Serie, SerieRow};
use csv::{ReaderBuilder, Trim};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tempfile::NamedTempFile;

/// Field name to value mapping, as received in a request body.
pub type Fields = Map<String, Value>;

/// The series record store.
///
/// # Ordering
///
/// Records keep the order they had in the backing file; created records are
/// appended. Ids are never renumbered after a delete.
///
/// # Durability
///
/// Every mutation rewrites the file through a temporary sibling that is
/// renamed into place. If the rewrite fails the mutation is rolled back and
/// [`StoreError::Persist`] is returned, so memory and disk never diverge.
#[derive(Debug)]
pub struct SeriesStore {
    /// Backing CSV file.
    path: PathBuf,

    /// Records in file order.
    records: RwLock<Vec<Serie>>,
}

impl SeriesStore {
    /// Loads the store from a CSV file.
    ///
    /// Any failure, from a missing file to a malformed row, is reported as
    /// [`StoreError::Load`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let load_error = |reason: String| StoreError::Load {
            path: path.clone(),
            reason,
        };

        let file = File::open(&path).map_err(|e| load_error(e.to_string()))?;
        let records = read_records(BufReader::new(file)).map_err(|e| load_error(e.to_string()))?;

        info!("Loaded {} series from {}", records.len(), path.display());
        Ok(SeriesStore {
            path,
            records: RwLock::new(records),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live records.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Clone of every record, in order.
    pub fn snapshot(&self) -> Result<Vec<Serie>> {
        Ok(self.read()?.clone())
    }

    /// Returns the first `limit` records in store order.
    pub fn list(&self, limit: usize) -> Result<Vec<Serie>> {
        let records = self.read()?;
        Ok(records.iter().take(limit).cloned().collect())
    }

    /// Looks a record up by id. Absence is `Ok(None)`, not an error.
    pub fn get_by_id(&self, id: u64) -> Result<Option<Serie>> {
        let records = self.read()?;
        Ok(records.iter().find(|s| s.id == id).cloned())
    }

    /// Returns every record whose fields equal all of the given criteria.
    ///
    /// Fails with [`StoreError::InvalidField`] naming every key outside the
    /// schema. An empty mapping matches everything; no match is an empty
    /// vector, not an error.
    pub fn filter(&self, criteria: &Fields) -> Result<Vec<Serie>> {
        let criteria = resolve_fields(criteria)?;

        let records = self.read()?;
        let matched: Vec<Serie> = records
            .iter()
            .filter(|serie| {
                criteria
                    .iter()
                    .all(|(field, expected)| serie.get(*field).matches(expected))
            })
            .cloned()
            .collect();

        debug!(
            "Filter on {} field(s) matched {} of {} series",
            criteria.len(),
            matched.len(),
            records.len()
        );
        Ok(matched)
    }

    /// Creates a record from the given fields and assigns it the next id.
    ///
    /// Unknown fields are rejected, as are missing required fields. A
    /// supplied `id` is ignored.
    pub fn insert(&self, fields: &Fields) -> Result<Serie> {
        let resolved = resolve_fields(fields)?;

        let missing: Vec<String> = Field::REQUIRED
            .iter()
            .filter(|field| fields.get(field.name()).map_or(true, Value::is_null))
            .map(|field| field.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::MissingField { fields: missing });
        }

        let mut serie = Serie::empty(0);
        for (field, value) in coerce_all(&resolved)? {
            serie.set(field, value);
        }

        let mut records = self.write()?;
        serie.id = next_id(&records)?;
        records.push(serie.clone());

        if let Err(e) = self.persist(&records) {
            records.pop();
            return Err(e);
        }

        info!("Created serie {} ({})", serie.id, serie.title);
        Ok(serie)
    }

    /// Overwrites the given fields on the record with `id`.
    ///
    /// Unknown fields and `id` are ignored. Values are all validated before
    /// any of them is applied.
    pub fn update(&self, id: u64, fields: &Fields) -> Result<Serie> {
        let known: Vec<(Field, &Value)> = fields
            .iter()
            .filter_map(|(key, value)| match key.parse::<Field>() {
                Ok(field) => Some((field, value)),
                Err(_) => {
                    debug!("Update of serie {}: ignoring unknown field '{}'", id, key);
                    None
                }
            })
            .collect();
        let changes = coerce_all(&known)?;

        let mut records = self.write()?;
        let index = position(&records, id)?;
        let original = records[index].clone();

        for (field, value) in changes {
            records[index].set(field, value);
        }

        if let Err(e) = self.persist(&records) {
            records[index] = original;
            return Err(e);
        }

        info!("Updated serie {}", id);
        Ok(records[index].clone())
    }

    /// Removes the record with `id`, returning it. Surviving records keep
    /// their ids and relative order.
    pub fn delete(&self, id: u64) -> Result<Serie> {
        let mut records = self.write()?;
        let index = position(&records, id)?;
        let removed = records.remove(index);

        if let Err(e) = self.persist(&records) {
            records.insert(index, removed);
            return Err(e);
        }

        info!("Deleted serie {} ({})", id, removed.title);
        Ok(removed)
    }

    /// Rewrites the backing file from `records`.
    ///
    /// Writes a temporary file in the same directory, syncs it and renames it
    /// over the backing file.
    fn persist(&self, records: &[Serie]) -> Result<()> {
        self.write_atomically(records).map_err(|source| {
            warn!("Failed to persist {}: {}", self.path.display(), source);
            StoreError::Persist {
                path: self.path.clone(),
                source,
            }
        })
    }

    fn write_atomically(&self, records: &[Serie]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        write_csv(records, tmp.as_file_mut())?;
        if let Ok(metadata) = fs::metadata(&self.path) {
            tmp.as_file().set_permissions(metadata.permissions())?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!("Persisted {} series to {}", records.len(), self.path.display());
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Serie>>> {
        self.records
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Serie>>> {
        self.records
            .write()
            .map_err(|_| StoreError::LockPoisoned("write"))
    }
}

/// Reads records from CSV, trusting the header row for column names.
///
/// Rows that fail to parse, or repeat an earlier id, fail the whole read.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<Serie>> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    for header in headers.iter() {
        if !is_known_column(header) {
            debug!("Ignoring unknown column '{}'", header);
        }
    }

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (row_idx, result) in csv_reader.deserialize::<SerieRow>().enumerate() {
        let row_num = row_idx + 2; // 1-indexed, accounting for header row

        let raw = result.map_err(|e| StoreError::InvalidRecord {
            row: row_num,
            message: e.to_string(),
        })?;
        let serie = raw.parse().map_err(|message| StoreError::InvalidRecord {
            row: row_num,
            message,
        })?;

        if !seen.insert(serie.id) {
            return Err(StoreError::DuplicateId {
                id: serie.id,
                row: row_num,
            });
        }
        records.push(serie);
    }

    Ok(records)
}

/// Writes records as CSV with the canonical header.
pub fn write_records<W: Write>(records: &[Serie], writer: W) -> Result<()> {
    write_csv(records, writer)?;
    Ok(())
}

fn write_csv<W: Write>(records: &[Serie], writer: W) -> csv::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(Field::ALL.iter().map(|field| field.name()))?;
    for serie in records {
        csv_writer.write_record(serie.to_csv_row())?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn is_known_column(header: &str) -> bool {
    const LEGACY: [&str; 10] = [
        "titulo",
        "nome",
        "ordem",
        "ano_estreia",
        "ano_encerramento",
        "episodios",
        "classificacao_indicativa",
        "nota_imdb",
        "popularidade",
        "atores",
    ];
    header.parse::<Field>().is_ok() || LEGACY.contains(&header)
}

/// Maps request keys to schema fields, reporting every unknown key at once.
fn resolve_fields(fields: &Fields) -> Result<Vec<(Field, &Value)>> {
    let mut resolved = Vec::with_capacity(fields.len());
    let mut invalid = Vec::new();

    for (key, value) in fields {
        match key.parse::<Field>() {
            Ok(field) => resolved.push((field, value)),
            Err(name) => invalid.push(name),
        }
    }

    if invalid.is_empty() {
        Ok(resolved)
    } else {
        Err(StoreError::InvalidField { fields: invalid })
    }
}

/// Coerces request values to field types, skipping `id`.
fn coerce_all(fields: &[(Field, &Value)]) -> Result<Vec<(Field, FieldValue)>> {
    fields
        .iter()
        .filter(|(field, _)| *field != Field::Id)
        .map(|(field, value)| {
            FieldValue::coerce(*field, value)
                .map(|coerced| (*field, coerced))
                .map_err(|message| StoreError::InvalidValue {
                    field: field.name().to_string(),
                    message,
                })
        })
        .collect()
}

/// Next id after the current maximum. Ids stay within `i64` so they load
/// back through the integer cell parser.
fn next_id(records: &[Serie]) -> Result<u64> {
    let next = match records.iter().map(|s| s.id).max() {
        None => 1,
        Some(max) => max.checked_add(1).ok_or(StoreError::IdExhausted)?,
    };
    if next > i64::MAX as u64 {
        return Err(StoreError::IdExhausted);
    }
    Ok(next)
}

fn position(records: &[Serie], id: u64) -> Result<usize> {
    records.iter().position(|s| s.id == id).ok_or_else(|| {
        debug!("Serie {} not found", id);
        StoreError::NotFound { id }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"id,title,order,premiere_year,end_year,episodes,rating,score,link,popularity,cast
1,Breaking Bad,1,2008,2013,62,18,9.5,https://www.imdb.com/title/tt0903747/,98.5,Bryan Cranston|Aaron Paul
2,Dark,2,2017,2020,26,16,8.7,https://www.imdb.com/title/tt5753856/,80.1,
3,The Office,3,2005,2013,201,0,9.0,https://www.imdb.com/title/tt0386676/,95.0,Steve Carell"#;

    fn store_from(csv: &str) -> (TempDir, SeriesStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("series.csv");
        fs::write(&path, csv).unwrap();
        let store = SeriesStore::load(&path).unwrap();
        (dir, store)
    }

    fn fields(value: Value) -> Fields {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_read_records() {
        let records = read_records(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title, "Breaking Bad");
        assert_eq!(records[1].cast, Vec::<String>::new());
        assert_eq!(records[2].rating, 0);
    }

    #[test]
    fn test_read_legacy_headers() {
        let csv = r#"id,titulo,ordem,ano_estreia,ano_encerramento,episodios,classificacao_indicativa,nota_imdb,link,popularidade
1,Breaking Bad,1,2008,2013.0,62,18,9.5,https://www.imdb.com/title/tt0903747/,98.5
2,Chaves,2,1973,,290,Livre,8.5,https://www.imdb.com/title/tt0229889/,70.0"#;

        let records = read_records(Cursor::new(csv)).unwrap();
        assert_eq!(records[0].title, "Breaking Bad");
        assert_eq!(records[0].end_year, 2013);
        assert_eq!(records[1].end_year, 0);
        assert_eq!(records[1].rating, 0);
        assert!(records[1].is_running());
    }

    #[test]
    fn test_read_whitespace_and_unknown_columns() {
        let csv = "id, title, extra\n 1 , Lost , x\n";
        let records = read_records(Cursor::new(csv)).unwrap();
        assert_eq!(records[0].id, 1);
        assert_eq!(records[0].title, "Lost");
    }

    #[test]
    fn test_read_rejects_duplicate_id() {
        let csv = "id,title\n1,A\n1,B\n";
        match read_records(Cursor::new(csv)) {
            Err(StoreError::DuplicateId { id: 1, row: 3 }) => {}
            other => panic!("Expected DuplicateId, got {:?}", other),
        }
    }

    #[test]
    fn test_read_rejects_malformed_row() {
        let csv = "id,title,episodes\n1,A,ten\n";
        assert!(matches!(
            read_records(Cursor::new(csv)),
            Err(StoreError::InvalidRecord { row: 2, .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = SeriesStore::load(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, StoreError::Load { .. }));
    }

    #[test]
    fn test_list_limits() {
        let (_dir, store) = store_from(SAMPLE);
        assert_eq!(store.list(0).unwrap().len(), 0);
        assert_eq!(store.list(2).unwrap().len(), 2);
        assert_eq!(store.list(100).unwrap().len(), 3);
        assert_eq!(store.list(2).unwrap()[..], store.list(3).unwrap()[..2]);
    }

    #[test]
    fn test_get_by_id() {
        let (_dir, store) = store_from(SAMPLE);
        assert_eq!(store.get_by_id(2).unwrap().unwrap().title, "Dark");
        assert!(store.get_by_id(42).unwrap().is_none());
    }

    #[test]
    fn test_filter_reports_every_invalid_field() {
        let (_dir, store) = store_from(SAMPLE);
        let err = store
            .filter(&fields(json!({"rating": 18, "nome": "x", "idade": 3})))
            .unwrap_err();
        match err {
            StoreError::InvalidField { fields } => {
                assert_eq!(fields, vec!["idade".to_string(), "nome".to_string()])
            }
            other => panic!("Expected InvalidField, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_matches() {
        let (_dir, store) = store_from(SAMPLE);

        assert_eq!(store.filter(&Fields::new()).unwrap().len(), 3);

        let adults = store.filter(&fields(json!({"rating": 18}))).unwrap();
        assert_eq!(adults.len(), 1);
        assert_eq!(adults[0].id, 1);

        let ended = store
            .filter(&fields(json!({"end_year": 2013, "score": 9.0})))
            .unwrap();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].title, "The Office");

        assert!(store
            .filter(&fields(json!({"title": "breaking bad"})))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_insert_assigns_next_id_and_persists() {
        let (_dir, store) = store_from(SAMPLE);
        let created = store
            .insert(&fields(json!({
                "title": "X", "order": 4, "premiere_year": 2020, "episodes": 10,
                "rating": 0, "score": 8.0, "link": "u", "popularity": 1.0
            })))
            .unwrap();

        assert_eq!(created.id, 4);
        assert_eq!(store.get_by_id(4).unwrap(), Some(created.clone()));

        let reloaded = SeriesStore::load(store.path()).unwrap();
        assert_eq!(reloaded.snapshot().unwrap(), store.snapshot().unwrap());
    }

    #[test]
    fn test_insert_into_empty_store_starts_at_one() {
        let (_dir, store) = store_from("id,title\n");
        assert!(store.is_empty().unwrap());
        let created = store
            .insert(&fields(json!({
                "title": "X", "order": 1, "premiere_year": 2020, "episodes": 1,
                "rating": 0, "score": 1, "link": "u", "popularity": 1
            })))
            .unwrap();
        assert_eq!(created.id, 1);
    }

    #[test]
    fn test_insert_lists_missing_fields() {
        let (_dir, store) = store_from(SAMPLE);
        let err = store
            .insert(&fields(json!({"title": "X", "order": 1, "score": null})))
            .unwrap_err();
        match err {
            StoreError::MissingField { fields } => assert_eq!(
                fields,
                vec![
                    "premiere_year",
                    "episodes",
                    "rating",
                    "score",
                    "link",
                    "popularity"
                ]
            ),
            other => panic!("Expected MissingField, got {:?}", other),
        }
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn test_update_ignores_unknown_fields() {
        let (_dir, store) = store_from(SAMPLE);
        let before = store.get_by_id(2).unwrap().unwrap();

        let updated = store
            .update(2, &fields(json!({"episodes": 27, "bogus": true, "id": 99})))
            .unwrap();

        assert_eq!(updated.id, 2);
        assert_eq!(updated.episodes, 27);
        assert_eq!(
            Serie {
                episodes: before.episodes,
                ..updated.clone()
            },
            before
        );
    }

    #[test]
    fn test_update_invalid_value_changes_nothing() {
        let (_dir, store) = store_from(SAMPLE);
        let before = store.snapshot().unwrap();
        let err = store
            .update(1, &fields(json!({"title": "Y", "episodes": "lots"})))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { .. }));
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn test_delete_keeps_ids() {
        let (_dir, store) = store_from(SAMPLE);
        store.delete(2).unwrap();

        let ids: Vec<u64> = store.snapshot().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(matches!(
            store.delete(2),
            Err(StoreError::NotFound { id: 2 })
        ));
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let (dir, store) = store_from(SAMPLE);
        let before = store.snapshot().unwrap();
        fs::remove_dir_all(dir.path()).unwrap();

        let err = store.delete(1).unwrap_err();
        assert!(matches!(err, StoreError::Persist { .. }));

        let err = store
            .update(1, &fields(json!({"title": "Renamed"})))
            .unwrap_err();
        assert!(matches!(err, StoreError::Persist { .. }));

        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn test_insert_after_largest_id_fails() {
        let csv = format!("id,title\n{},Last\n", i64::MAX);
        let (_dir, store) = store_from(&csv);
        let err = store
            .insert(&fields(json!({
                "title": "X", "order": 1, "premiere_year": 2020, "episodes": 1,
                "rating": 0, "score": 1, "link": "u", "popularity": 1
            })))
            .unwrap_err();
        assert!(matches!(err, StoreError::IdExhausted));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store_from(SAMPLE);
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o644)).unwrap();

        store.delete(2).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_write_records_quotes_only_when_needed() {
        let mut serie = Serie::empty(1);
        serie.title = "Love, Death & Robots".to_string();
        serie.link = "u".to_string();

        let mut out = Vec::new();
        write_records(&[serie], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("id,title,order,premiere_year,end_year,episodes,rating,score,link,popularity,cast"));
        assert!(text.contains("1,\"Love, Death & Robots\",0,0,0,0,0,0.0,u,0.0,"));
    }
}
