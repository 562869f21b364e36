use super::{
    check_collection, check_id, Document, DocumentStore, Listener, ListenerHub, Order,
    ServerClock, Subscription,
};
use crate::db;
use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Document store persisted in a single SQLite table, one JSON body per row.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    clock: ServerClock,
    hub: Arc<ListenerHub>,
}

impl SqliteDocumentStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = db::open_db(path)?;
        log::info!("opened document store at {}", path.display());
        SqliteDocumentStore::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        SqliteDocumentStore::with_connection(db::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let last: Option<i64> =
            conn.query_row("SELECT MAX(created_at) FROM documents", [], |row| row.get(0))?;
        Ok(SqliteDocumentStore {
            conn: Mutex::new(conn),
            clock: ServerClock::starting_after(last.unwrap_or(0)),
            hub: ListenerHub::new(),
        })
    }

    fn conn(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned(operation))
    }

    fn snapshot(&self, collection: &str, order: Order) -> Result<Vec<Document>, StoreError> {
        let sql = match order {
            Order::ById => {
                "SELECT id, data, created_at FROM documents
                 WHERE collection = ?1 ORDER BY id"
            }
            Order::NewestFirst => {
                "SELECT id, data, created_at FROM documents
                 WHERE collection = ?1 ORDER BY created_at DESC"
            }
        };
        let conn = self.conn("list")?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut documents = Vec::new();
        for row in rows {
            let (id, raw, created_at) = row?;
            documents.push(Document {
                id,
                data: decode(&raw)?,
                created_at,
            });
        }
        Ok(documents)
    }

    fn changed(&self, collection: &str) {
        self.hub
            .notify(collection, |order| self.snapshot(collection, order));
    }
}

fn decode(raw: &str) -> Result<Map<String, Value>, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn encode(data: &Map<String, Value>) -> Result<String, StoreError> {
    Ok(serde_json::to_string(data)?)
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        let conn = self.conn("get")?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT data, created_at FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((raw, created_at)) => Ok(Some(Document {
                id: id.to_string(),
                data: decode(&raw)?,
                created_at,
            })),
            None => Ok(None),
        }
    }

    fn list(&self, collection: &str, order: Order) -> Result<Vec<Document>, StoreError> {
        check_collection(collection)?;
        self.snapshot(collection, order)
    }

    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        let body = encode(&data)?;
        {
            let conn = self.conn("set")?;
            let now = self.clock.now();
            conn.execute(
                "INSERT INTO documents (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at",
                params![collection, id, body, now],
            )?;
        }
        self.changed(collection);
        Ok(())
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        {
            let mut conn = self.conn("update")?;
            let tx = conn.transaction()?;
            let raw: Option<String> = tx
                .query_row(
                    "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()?;
            let mut data = match raw {
                Some(raw) => decode(&raw)?,
                None => {
                    return Err(StoreError::NotFound {
                        path: format!("{}/{}", collection, id),
                    })
                }
            };
            for (key, value) in fields {
                data.insert(key, value);
            }
            tx.execute(
                "UPDATE documents SET data = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
                params![collection, id, encode(&data)?, chrono::Utc::now().timestamp_millis()],
            )?;
            tx.commit()?;
        }
        self.changed(collection);
        Ok(())
    }

    fn add(&self, collection: &str, data: Map<String, Value>) -> Result<String, StoreError> {
        check_collection(collection)?;
        let id = Uuid::new_v4().simple().to_string();
        let body = encode(&data)?;
        {
            let conn = self.conn("add")?;
            let now = self.clock.now();
            conn.execute(
                "INSERT INTO documents (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![collection, id, body, now],
            )?;
        }
        self.changed(collection);
        Ok(id)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        let removed = {
            let conn = self.conn("delete")?;
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?
        };
        if removed > 0 {
            self.changed(collection);
        }
        Ok(())
    }

    fn delete_owned(
        &self,
        collection: &str,
        id: &str,
        owner_field: &str,
        owner: &str,
    ) -> Result<(), StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        let removed = {
            let mut conn = self.conn("delete_owned")?;
            let tx = conn.transaction()?;
            let raw: Option<String> = tx
                .query_row(
                    "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()?;
            let data = match raw {
                Some(raw) => decode(&raw)?,
                None => return Ok(()),
            };
            let stored_owner = data.get(owner_field).and_then(|value| value.as_str());
            if stored_owner != Some(owner) {
                return Err(StoreError::PermissionDenied {
                    path: format!("{}/{}", collection, id),
                });
            }
            let removed = tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            tx.commit()?;
            removed
        };
        if removed > 0 {
            self.changed(collection);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        collection: &str,
        order: Order,
        listener: Listener,
    ) -> Result<Subscription, StoreError> {
        check_collection(collection)?;
        self.hub
            .subscribe(collection, order, listener, |order| self.snapshot(collection, order))
    }
}
