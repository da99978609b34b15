//! `SQLite`-backed custody store.
//!
//! Every operation opens its own connection. Mutations run inside
//! `BEGIN IMMEDIATE`, which takes the database write lock up front, so each
//! find-then-write sequence is serializable against every other writer.
//! Dropping a transaction without committing rolls it back.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use chrono::{DateTime, Utc};
use custody_crypto::CredentialSealer;
use custody_types::{
    Address, AppId, CustodyError, CustodyKey, CustodyNode, Result, TxHash,
};
use rusqlite::{
    Connection, ErrorCode, OpenFlags, OptionalExtension, Row, TransactionBehavior, params,
    types::Type,
};

use crate::pool::ApplicationPool;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

const COLUMNS: &str = "custodian, payee, kernel_id, app_id, transaction_hash, \
                       keystore, public_key, created_at, updated_at";

const BY_NATURAL_KEY: &str = "custodian = ?1 AND payee = ?2 AND kernel_id = ?3";

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

trait SqlResultExt<T> {
    fn db(self) -> Result<T>;
}

impl<T> SqlResultExt<T> for rusqlite::Result<T> {
    fn db(self) -> Result<T> {
        self.map_err(CustodyError::transaction)
    }
}

fn parse_text<T: FromStr<Err = CustodyError>>(idx: usize, text: &str) -> rusqlite::Result<T> {
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn column<T: FromStr<Err = CustodyError>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse_text(idx, &text)
}

fn optional_column<T: FromStr<Err = CustodyError>>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_text(idx, &t)).transpose()
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<CustodyNode> {
    Ok(CustodyNode {
        custodian: column(row, 0)?,
        payee: column(row, 1)?,
        kernel_id: column(row, 2)?,
        app_id: optional_column(row, 3)?,
        transaction_hash: optional_column(row, 4)?,
        encrypted_credentials: row.get(5)?,
        service_public_key: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn key_params(key: &CustodyKey) -> [String; 3] {
    [
        key.custodian.to_string(),
        key.payee.to_string(),
        key.kernel_id.to_string(),
    ]
}

fn select_by_key(conn: &Connection, key: &CustodyKey) -> Result<Option<CustodyNode>> {
    let [custodian, payee, kernel] = key_params(key);
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM nodes WHERE {BY_NATURAL_KEY}"),
        params![custodian, payee, kernel],
        node_from_row,
    )
    .optional()
    .db()
}

fn select_by_hash(conn: &Connection, hash: &TxHash) -> Result<Option<CustodyNode>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM nodes WHERE transaction_hash = ?1 ORDER BY id ASC LIMIT 1"
        ),
        params![hash.to_string()],
        node_from_row,
    )
    .optional()
    .db()
}

fn assigned_ids(conn: &Connection) -> Result<HashSet<AppId>> {
    let mut stmt = conn
        .prepare("SELECT app_id FROM nodes WHERE app_id IS NOT NULL")
        .db()?;
    let ids = stmt
        .query_map([], |row| column::<AppId>(row, 0))
        .db()?
        .collect::<rusqlite::Result<HashSet<_>>>()
        .db()?;
    Ok(ids)
}

fn insert(conn: &Connection, node: &CustodyNode) -> Result<()> {
    let [custodian, payee, kernel] = key_params(&node.key());
    conn.execute(
        &format!(
            "INSERT INTO nodes ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            custodian,
            payee,
            kernel,
            node.app_id.map(|id| id.to_string()),
            node.transaction_hash.map(|h| h.to_string()),
            node.encrypted_credentials,
            node.service_public_key,
            node.created_at,
            node.updated_at,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            CustodyError::BadRequest {
                reason: format!("custody node {} conflicts with an existing row", node.key()),
            }
        }
        other => CustodyError::transaction(other),
    })?;
    Ok(())
}

fn reload(conn: &Connection, key: &CustodyKey) -> Result<CustodyNode> {
    select_by_key(conn, key)?.ok_or_else(|| CustodyError::NodeNotFound {
        field: "custody".into(),
        value: key.to_string(),
    })
}

// ---------------------------------------------------------------------------
// NodeStore
// ---------------------------------------------------------------------------

/// Synchronous custody store. Cheap to share; holds no connection.
#[derive(Debug, Clone)]
pub struct NodeStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl NodeStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        };
        store.connect()?.execute_batch(SCHEMA_SQL).db()?;
        tracing::info!(path = %store.path.display(), "custody store opened");
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .db()?;
        conn.busy_timeout(self.busy_timeout).db()?;
        Ok(conn)
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction. Commits only if `f`
    /// returns `Ok`.
    fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db()?;
        let out = f(&tx)?;
        tx.commit().db()?;
        Ok(out)
    }

    /// Administrative insert. A second row for the same triple, or a reused
    /// application id, is refused.
    pub fn create(&self, node: &CustodyNode) -> Result<CustodyNode> {
        let key = node.key();
        self.write(|tx| {
            insert(tx, node)?;
            reload(tx, &key)
        })
    }

    /// Return the row for `key`, inserting an unassigned one if absent.
    /// The flag is `true` when this call created the row.
    pub fn find_or_insert(
        &self,
        key: &CustodyKey,
        now: DateTime<Utc>,
    ) -> Result<(CustodyNode, bool)> {
        self.write(|tx| {
            if let Some(existing) = select_by_key(tx, key)? {
                return Ok((existing, false));
            }
            insert(tx, &CustodyNode::unassigned(*key, now))?;
            Ok((reload(tx, key)?, true))
        })
    }

    /// Record the acknowledgement hash unless one is already present.
    pub fn attach_transaction_hash(
        &self,
        key: &CustodyKey,
        hash: &TxHash,
        now: DateTime<Utc>,
    ) -> Result<CustodyNode> {
        let [custodian, payee, kernel] = key_params(key);
        self.write(|tx| {
            tx.execute(
                &format!(
                    "UPDATE nodes SET transaction_hash = ?4, updated_at = ?5 \
                     WHERE {BY_NATURAL_KEY} AND transaction_hash IS NULL"
                ),
                params![custodian, payee, kernel, hash.to_string(), now],
            )
            .db()?;
            reload(tx, key)
        })
    }

    /// Claim the first unassigned pool application for the row acknowledged
    /// by `hash` and seal its credentials for the custodian.
    ///
    /// The assigned-id scan, the selection and the update share one
    /// transaction, so concurrent claims never pick the same application.
    /// An already assigned row is returned unchanged.
    pub fn assign(
        &self,
        hash: &TxHash,
        expected: &CustodyKey,
        pool: &ApplicationPool,
        sealer: &CredentialSealer,
        now: DateTime<Utc>,
    ) -> Result<CustodyNode> {
        self.write(|tx| {
            let Some(node) = select_by_hash(tx, hash)? else {
                return Err(CustodyError::NodeNotFound {
                    field: "transaction_hash".into(),
                    value: hash.to_string(),
                });
            };
            if node.key() != *expected {
                return Err(CustodyError::invalid_payload("hash", "mismatch"));
            }
            if node.is_assigned() {
                return Ok(node);
            }

            let claimed = assigned_ids(tx)?;
            let app = pool
                .first_unclaimed(&claimed)
                .ok_or(CustodyError::OutOfCapacity)?;
            let sealed = sealer.seal(&node.custodian, app)?;

            let [custodian, payee, kernel] = key_params(expected);
            let changed = tx
                .execute(
                    &format!(
                        "UPDATE nodes SET app_id = ?4, keystore = ?5, public_key = ?6, \
                         updated_at = ?7 WHERE {BY_NATURAL_KEY} AND app_id IS NULL"
                    ),
                    params![
                        custodian,
                        payee,
                        kernel,
                        app.app_id.to_string(),
                        sealed.keystore,
                        sealed.public_key,
                        now,
                    ],
                )
                .db()?;
            if changed != 1 {
                return Err(CustodyError::transaction(format!(
                    "assignment of {} updated {changed} rows",
                    node.key()
                )));
            }

            tracing::info!(custody = %node.key(), app_id = %app.app_id, "application assigned");
            reload(tx, expected)
        })
    }

    pub fn find_by_natural_key(&self, key: &CustodyKey) -> Result<Option<CustodyNode>> {
        select_by_key(&self.connect()?, key)
    }

    pub fn find_by_transaction_hash(&self, hash: &TxHash) -> Result<Option<CustodyNode>> {
        select_by_hash(&self.connect()?, hash)
    }

    /// Every row held by `custodian`, oldest first.
    pub fn find_by_custodian(&self, custodian: &Address) -> Result<Vec<CustodyNode>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM nodes WHERE custodian = ?1 ORDER BY id ASC"
            ))
            .db()?;
        let nodes = stmt
            .query_map(params![custodian.to_string()], node_from_row)
            .db()?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db()?;
        Ok(nodes)
    }

    /// Assigned rows only, oldest first.
    pub fn list(&self, limit: usize) -> Result<Vec<CustodyNode>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM nodes WHERE app_id IS NOT NULL ORDER BY id ASC LIMIT ?1"
            ))
            .db()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let nodes = stmt
            .query_map(params![limit], node_from_row)
            .db()?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db()?;
        Ok(nodes)
    }

    /// Ids of every assigned application, in no particular order.
    pub fn assigned_app_ids(&self) -> Result<Vec<AppId>> {
        Ok(assigned_ids(&self.connect()?)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use custody_crypto::PrivateKey;
    use custody_types::{Application, KernelId};
    use tempfile::TempDir;

    use super::*;

    fn open() -> (TempDir, NodeStore) {
        let dir = TempDir::new().unwrap();
        let store = NodeStore::open(dir.path().join("custody.db"), Duration::from_secs(5)).unwrap();
        (dir, store)
    }

    fn custodian_key() -> CustodyKey {
        // Spend key must be a curve point for sealing.
        let spend = PrivateKey::from_seed(&rand::random()).public_key().to_bytes();
        CustodyKey::new(
            Address::new(spend, [9; 32]),
            Address::random(),
            KernelId::random(),
        )
    }

    fn sealer() -> CredentialSealer {
        CredentialSealer::new(PrivateKey::from_seed(&[5; 32]))
    }

    #[test]
    fn find_or_insert_is_idempotent() {
        let (_dir, store) = open();
        let key = custodian_key();
        let (first, created) = store.find_or_insert(&key, Utc::now()).unwrap();
        assert!(created);
        let (second, created) = store.find_or_insert(&key, Utc::now()).unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(store.find_by_custodian(&key.custodian).unwrap().len(), 1);
    }

    #[test]
    fn attach_hash_only_once() {
        let (_dir, store) = open();
        let key = custodian_key();
        store.find_or_insert(&key, Utc::now()).unwrap();
        let h1 = TxHash::random();
        let node = store.attach_transaction_hash(&key, &h1, Utc::now()).unwrap();
        assert_eq!(node.transaction_hash, Some(h1));

        let node = store
            .attach_transaction_hash(&key, &TxHash::random(), Utc::now())
            .unwrap();
        assert_eq!(node.transaction_hash, Some(h1));
        assert_eq!(store.find_by_transaction_hash(&h1).unwrap().unwrap().key(), key);
    }

    #[test]
    fn admin_create_refuses_duplicate_triple() {
        let (_dir, store) = open();
        let key = custodian_key();
        let node = CustodyNode::unassigned(key, Utc::now());
        store.create(&node).unwrap();
        let err = store.create(&node).unwrap_err();
        assert!(matches!(err, CustodyError::BadRequest { .. }));
    }

    #[test]
    fn assign_requires_matching_row() {
        let (_dir, store) = open();
        let pool = ApplicationPool::new(vec![Application::dummy(1)]).unwrap();
        let key = custodian_key();

        let err = store
            .assign(&TxHash::random(), &key, &pool, &sealer(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CustodyError::NodeNotFound { .. }));

        let hash = TxHash::random();
        store.find_or_insert(&key, Utc::now()).unwrap();
        store.attach_transaction_hash(&key, &hash, Utc::now()).unwrap();
        let other = custodian_key();
        let err = store
            .assign(&hash, &other, &pool, &sealer(), Utc::now())
            .unwrap_err();
        assert!(
            matches!(err, CustodyError::InvalidPayload { ref field, ref reason } if field == "hash" && reason == "mismatch")
        );
    }

    #[test]
    fn assign_then_reassign_is_noop() {
        let (_dir, store) = open();
        let pool = ApplicationPool::new((1..=2).map(Application::dummy).collect()).unwrap();
        let key = custodian_key();
        let hash = TxHash::random();
        store.find_or_insert(&key, Utc::now()).unwrap();
        store.attach_transaction_hash(&key, &hash, Utc::now()).unwrap();

        let first = store.assign(&hash, &key, &pool, &sealer(), Utc::now()).unwrap();
        assert_eq!(first.app_id, Some(Application::dummy(1).app_id));
        assert!(first.encrypted_credentials.is_some());

        let again = store.assign(&hash, &key, &pool, &sealer(), Utc::now()).unwrap();
        assert_eq!(again.app_id, first.app_id);
        assert_eq!(again.encrypted_credentials, first.encrypted_credentials);
        assert_eq!(store.assigned_app_ids().unwrap(), vec![Application::dummy(1).app_id]);
    }

    #[test]
    fn list_hides_unassigned_rows() {
        let (_dir, store) = open();
        store.find_or_insert(&custodian_key(), Utc::now()).unwrap();
        assert!(store.list(100).unwrap().is_empty());

        let mut assigned = CustodyNode::unassigned(custodian_key(), Utc::now());
        assigned.app_id = Some(Application::dummy(3).app_id);
        store.create(&assigned).unwrap();
        let listed = store.list(100).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key(), assigned.key());
    }

    #[test]
    fn reopen_preserves_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custody.db");
        let key = custodian_key();
        NodeStore::open(&path, Duration::from_secs(1))
            .unwrap()
            .find_or_insert(&key, Utc::now())
            .unwrap();
        let reopened = NodeStore::open(&path, Duration::from_secs(1)).unwrap();
        assert!(reopened.find_by_natural_key(&key).unwrap().is_some());
    }
}
