//! SQLite backend holding both tables in one database file.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use language_utils::text_cleanup::normalize_for_matching;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, Transaction, params, params_from_iter};

use crate::error::CategorizerError;
use crate::model::CategorizationResult;
use crate::reference::{CentralizedMatch, ExactQuery, FuzzyQuery, ReferenceVocabulary};
use crate::store::{ReviewUpdate, StoredVocabularyItem, VocabularyStore, parse_stored_label};

const CURRENT_SCHEMA_VERSION: i32 = 1;

const MATCH_COLUMNS: &str = "id, word, base_word, category, subcategory, translation, language";

const ITEM_COLUMNS: &str = "id, teacher_id, term, translation, part_of_speech, context_sentence, \
     predicted_category, predicted_subcategory, category_confidence, centralized_match_id, \
     match_confidence, teacher_approved_category, manual_category, manual_subcategory";

fn run_migrations(conn: &mut Connection) -> Result<(), CategorizerError> {
    let mut version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(CategorizerError::Config(format!(
            "database version ({version}) is newer than supported schema ({CURRENT_SCHEMA_VERSION})"
        )));
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)?;
        version = next_version;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;

    log::info!("Migrated vocabulary database to schema version {CURRENT_SCHEMA_VERSION}");
    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<(), CategorizerError> {
    match version {
        1 => {
            tx.execute_batch(include_str!("schemas/schema_v1.sql"))?;
            Ok(())
        }
        _ => Err(CategorizerError::Config(format!(
            "no migration defined for version {version}"
        ))),
    }
}

fn row_to_match(row: &Row) -> rusqlite::Result<CentralizedMatch> {
    Ok(CentralizedMatch {
        id: row.get("id")?,
        word: row.get("word")?,
        base_word: row.get("base_word")?,
        category: row.get("category")?,
        subcategory: row.get("subcategory")?,
        translation: row.get("translation")?,
        language: row.get("language")?,
    })
}

fn row_to_item(row: &Row) -> rusqlite::Result<StoredVocabularyItem> {
    let approved: Option<i64> = row.get("teacher_approved_category")?;
    Ok(StoredVocabularyItem {
        id: row.get("id")?,
        teacher_id: row.get("teacher_id")?,
        term: row.get("term")?,
        translation: row.get("translation")?,
        part_of_speech: row.get("part_of_speech")?,
        context_sentence: row.get("context_sentence")?,
        predicted_category: parse_stored_label(row.get("predicted_category")?),
        predicted_subcategory: parse_stored_label(row.get("predicted_subcategory")?),
        category_confidence: row.get("category_confidence")?,
        centralized_match_id: row.get("centralized_match_id")?,
        match_confidence: row.get("match_confidence")?,
        teacher_approved_category: approved.unwrap_or(0) != 0,
        manual_category: parse_stored_label(row.get("manual_category")?),
        manual_subcategory: parse_stored_label(row.get("manual_subcategory")?),
    })
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Escape `LIKE` wildcards so the search is literal.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub struct SqliteVocabulary {
    conn: Mutex<Connection>,
}

impl SqliteVocabulary {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CategorizerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            log::error!("Failed to enable WAL mode: {e}");
        }
        let db = Self::with_connection(conn)?;
        log::info!("Vocabulary database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, CategorizerError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, CategorizerError> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace reference rows. `word` and `base_word` are stored
    /// normalized, since SQLite's `lower()` only folds ASCII.
    pub fn insert_reference_rows(&self, rows: &[CentralizedMatch]) -> Result<(), CategorizerError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO centralized_vocabulary ({MATCH_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.id,
                    normalize_for_matching(&row.word),
                    row.base_word.as_deref().map(normalize_for_matching),
                    row.category,
                    row.subcategory,
                    row.translation,
                    row.language,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert or replace stored items, keeping their order as upload order.
    pub fn insert_items(&self, items: &[StoredVocabularyItem]) -> Result<(), CategorizerError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO teacher_vocabulary_items ({ITEM_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ))?;
            for item in items {
                stmt.execute(params![
                    item.id,
                    item.teacher_id,
                    item.term,
                    item.translation,
                    item.part_of_speech,
                    item.context_sentence,
                    item.predicted_category.map(|c| c.name()),
                    item.predicted_subcategory.map(|s| s.name()),
                    item.category_confidence,
                    item.centralized_match_id,
                    item.match_confidence,
                    item.teacher_approved_category,
                    item.manual_category.map(|c| c.name()),
                    item.manual_subcategory.map(|s| s.name()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn fetch_matches(
        &self,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<Vec<CentralizedMatch>, CategorizerError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), row_to_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl ReferenceVocabulary for SqliteVocabulary {
    async fn exact_candidates(
        &self,
        query: &ExactQuery<'_>,
    ) -> Result<Vec<CentralizedMatch>, CategorizerError> {
        let terms: Vec<String> = query
            .terms
            .iter()
            .map(|term| normalize_for_matching(term))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; terms.len()].join(", ");
        let category_filter = if query.require_category {
            "AND category IS NOT NULL AND subcategory IS NOT NULL"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM centralized_vocabulary
             WHERE lower(language) = ? {category_filter}
               AND (lower(word) IN ({placeholders}) OR lower(base_word) IN ({placeholders}))
             ORDER BY category IS NULL, category, id
             LIMIT ?"
        );

        let mut values = vec![Value::Text(query.language.iso_639_1().to_string())];
        values.extend(terms.iter().cloned().map(Value::Text));
        values.extend(terms.into_iter().map(Value::Text));
        values.push(Value::Integer(sql_limit(query.limit)));
        self.fetch_matches(&sql, values)
    }

    async fn fuzzy_candidates(
        &self,
        query: &FuzzyQuery<'_>,
    ) -> Result<Vec<CentralizedMatch>, CategorizerError> {
        let needle = normalize_for_matching(query.word);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM centralized_vocabulary
             WHERE lower(language) = ?1 AND lower(word) LIKE ?2 ESCAPE '\\'
             ORDER BY (category IS NULL OR subcategory IS NULL), length(word), id
             LIMIT ?3"
        );
        let values = vec![
            Value::Text(query.language.iso_639_1().to_string()),
            Value::Text(like_pattern(&needle)),
            Value::Integer(sql_limit(query.limit)),
        ];
        self.fetch_matches(&sql, values)
    }
}

impl VocabularyStore for SqliteVocabulary {
    async fn teacher_items(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<StoredVocabularyItem>, CategorizerError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM teacher_vocabulary_items
             WHERE teacher_id = ?1
             ORDER BY rowid"
        ))?;
        let items = stmt
            .query_map(params![teacher_id], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    async fn save_categorization(
        &self,
        item_id: &str,
        result: &CategorizationResult,
    ) -> Result<(), CategorizerError> {
        let changed = self.lock().execute(
            "UPDATE teacher_vocabulary_items
             SET predicted_category = ?1,
                 predicted_subcategory = ?2,
                 category_confidence = ?3,
                 centralized_match_id = ?4,
                 match_confidence = ?5
             WHERE id = ?6",
            params![
                result.predicted_category.name(),
                result.predicted_subcategory.name(),
                result.category_confidence,
                result.centralized_match_id,
                result.match_confidence,
                item_id,
            ],
        )?;
        if changed == 0 {
            return Err(CategorizerError::NotFound(item_id.to_string()));
        }
        Ok(())
    }

    async fn save_review(
        &self,
        item_id: &str,
        update: &ReviewUpdate,
    ) -> Result<(), CategorizerError> {
        let changed = self.lock().execute(
            "UPDATE teacher_vocabulary_items
             SET teacher_approved_category = ?1,
                 manual_category = ?2,
                 manual_subcategory = ?3
             WHERE id = ?4",
            params![
                update.teacher_approved_category,
                update.manual_category.map(|c| c.name()),
                update.manual_subcategory.map(|s| s.name()),
                item_id,
            ],
        )?;
        if changed == 0 {
            return Err(CategorizerError::NotFound(item_id.to_string()));
        }
        Ok(())
    }
}
