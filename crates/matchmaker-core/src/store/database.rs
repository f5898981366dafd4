//! SQLite aggregation store for co-occurrence matrices.
//!
//! The store is both a sink (`export_matrix` batch-inserts a built matrix)
//! and a `NeighborSource` answering top-N queries in both pair directions.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::info;

use crate::errors::{MatchError, MatchResult};
use crate::indexer::cooccurrence::CoMatrix;
use crate::models::{RepoId, UserId};
use crate::query::neighbors::NeighborSource;
use crate::store::schema;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixKind {
    Repo,
    User,
}

impl MatrixKind {
    fn table(self) -> &'static str {
        match self {
            MatrixKind::Repo => "repo_matrix",
            MatrixKind::User => "user_matrix",
        }
    }
}

pub struct MatrixStore {
    db_path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl MatrixStore {
    /// Open (creating parent directories and schema as needed) a store on disk.
    pub fn open(db_path: &Path) -> MatchResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn, Some(db_path.to_path_buf()))
    }

    pub fn open_in_memory() -> MatchResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> MatchResult<Self> {
        schema::init_schema(&conn)?;
        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Replace the stored matrix of `kind` with `matrix`, committing every
    /// `batch_size` rows. Returns the number of pairs written.
    pub fn export_matrix(
        &self,
        kind: MatrixKind,
        matrix: &CoMatrix,
        batch_size: usize,
    ) -> MatchResult<usize> {
        if batch_size == 0 {
            return Err(MatchError::Store("batch size must be positive".into()));
        }
        let table = kind.table();
        let mut conn = self.conn.lock();
        conn.execute(&format!("DELETE FROM {table};"), [])?;

        let insert = format!("INSERT INTO {table}(low, high, val) VALUES (?1, ?2, ?3);");
        let mut pairs = matrix.pairs().peekable();
        let mut written = 0usize;
        while pairs.peek().is_some() {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(&insert)?;
                for (low, high, val) in pairs.by_ref().take(batch_size) {
                    stmt.execute(params![low, high, val])?;
                    written += 1;
                }
            }
            tx.commit()?;
        }
        info!(table, pairs = written, "co-occurrence matrix exported");
        Ok(written)
    }

    /// Up to `limit` neighbors of `id`, by weight descending then id ascending.
    pub fn top_neighbors(&self, kind: MatrixKind, id: u32, limit: usize) -> MatchResult<Vec<(u32, u32)>> {
        let table = kind.table();
        let sql = format!(
            "SELECT high AS other, val FROM {table} WHERE low = ?1 \
             UNION ALL \
             SELECT low AS other, val FROM {table} WHERE high = ?1 \
             ORDER BY val DESC, other ASC LIMIT ?2;"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![id, limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(u32, u32)>, _>>()?;
        Ok(rows)
    }

    pub fn pair_count(&self, kind: MatrixKind) -> MatchResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", kind.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl NeighborSource for MatrixStore {
    fn user_neighbors(&self, user: UserId, limit: usize) -> MatchResult<Vec<(UserId, u32)>> {
        self.top_neighbors(MatrixKind::User, user, limit)
    }

    fn repo_neighbors(&self, repo: RepoId, limit: usize) -> MatchResult<Vec<(RepoId, u32)>> {
        self.top_neighbors(MatrixKind::Repo, repo, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_query_both_directions() {
        let lists = vec![vec![1, 2, 3], vec![2, 3], vec![3, 4]];
        let matrix = CoMatrix::from_lists(&lists, 100);
        let store = MatrixStore::open_in_memory().unwrap();
        let written = store.export_matrix(MatrixKind::Repo, &matrix, 2).unwrap();
        assert_eq!(written, matrix.pair_count());
        assert_eq!(store.pair_count(MatrixKind::Repo).unwrap(), written);

        assert_eq!(
            store.top_neighbors(MatrixKind::Repo, 3, 10).unwrap(),
            matrix.top_neighbors(3, 10).to_vec()
        );
        assert_eq!(store.repo_neighbors(4, 1).unwrap(), vec![(3, 1)]);
        assert!(store.user_neighbors(1, 5).unwrap().is_empty());
    }

    #[test]
    fn export_replaces_previous_rows() {
        let store = MatrixStore::open_in_memory().unwrap();
        let first = CoMatrix::from_lists(&vec![vec![1, 2, 3]], 10);
        let second = CoMatrix::from_lists(&vec![vec![7, 8]], 10);
        store.export_matrix(MatrixKind::User, &first, 100).unwrap();
        store.export_matrix(MatrixKind::User, &second, 100).unwrap();
        assert_eq!(store.pair_count(MatrixKind::User).unwrap(), 1);
        assert_eq!(store.user_neighbors(7, 5).unwrap(), vec![(8, 1)]);
    }

    #[test]
    fn open_on_disk_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("matrix.db");
        let store = MatrixStore::open(&path).unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn reopen_keeps_exported_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.db");
        let matrix = CoMatrix::from_lists(&vec![vec![1, 2]], 10);
        MatrixStore::open(&path)
            .unwrap()
            .export_matrix(MatrixKind::Repo, &matrix, 10)
            .unwrap();
        let reopened = MatrixStore::open(&path).unwrap();
        assert_eq!(reopened.repo_neighbors(1, 5).unwrap(), vec![(2, 1)]);
    }
}
