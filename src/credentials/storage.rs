//! Encrypted credential storage using SQLite.
//!
//! Stores one sealed credential blob per tenant email.

use super::encryption::{self, BlobCipher};
use super::{CredentialStore, TenantRecord};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Encrypted credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE tenant_credentials (
///     email TEXT PRIMARY KEY,
///     display_name TEXT,
///     credentials TEXT NOT NULL,   -- sealed: base64(nonce || ciphertext)
///     created_at TEXT NOT NULL,    -- RFC 3339
///     updated_at TEXT NOT NULL     -- RFC 3339
/// );
/// ```
///
/// The connection sits behind a mutex; every method is a short blocking call.
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
    cipher: BlobCipher,
}

impl SqliteCredentialStore {
    /// Creates or opens a credential store.
    ///
    /// `encryption_key` is the base64-encoded 32-byte master key. Use
    /// `":memory:"` as the path for a throwaway store.
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let key_bytes = encryption::validate_key(encryption_key).context("Invalid encryption key")?;
        let cipher = BlobCipher::new(&key_bytes)?;

        let conn = Connection::open(db_path).context("Failed to open credential database")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tenant_credentials (
                email TEXT PRIMARY KEY,
                display_name TEXT,
                credentials TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create tenant_credentials table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, email: &str) -> Result<Option<String>> {
        let sealed: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT credentials FROM tenant_credentials WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read credentials")?;

        sealed
            .map(|sealed| self.cipher.open(&sealed).context("Failed to decrypt credentials"))
            .transpose()
    }

    fn put(&self, email: &str, credentials: &str, display_name: Option<&str>) -> Result<()> {
        let sealed = self
            .cipher
            .seal(credentials)
            .context("Failed to encrypt credentials")?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .execute(
                r#"
                INSERT INTO tenant_credentials (email, display_name, credentials, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(email) DO UPDATE SET
                    display_name = COALESCE(excluded.display_name, tenant_credentials.display_name),
                    credentials = excluded.credentials,
                    updated_at = excluded.updated_at
                "#,
                params![email, display_name, sealed, now],
            )
            .context("Failed to store credentials")?;

        Ok(())
    }

    fn update(&self, email: &str, credentials: &str) -> Result<()> {
        let sealed = self
            .cipher
            .seal(credentials)
            .context("Failed to encrypt credentials")?;

        let rows_affected = self
            .conn
            .lock()
            .execute(
                "UPDATE tenant_credentials SET credentials = ?2, updated_at = ?3 WHERE email = ?1",
                params![email, sealed, Utc::now().to_rfc3339()],
            )
            .context("Failed to update credentials")?;

        if rows_affected == 0 {
            return Err(anyhow!("No stored credentials to update"));
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<TenantRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT email, display_name, created_at, updated_at
                 FROM tenant_credentials ORDER BY email",
            )
            .context("Failed to prepare tenant list query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("Failed to query tenants")?;

        let mut tenants = Vec::new();
        for row in rows {
            let (email, display_name, created_at, updated_at) =
                row.context("Failed to read tenant row")?;
            tenants.push(TenantRecord {
                email,
                display_name,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            });
        }
        Ok(tenants)
    }

    fn delete(&self, email: &str) -> Result<bool> {
        let rows_affected = self
            .conn
            .lock()
            .execute(
                "DELETE FROM tenant_credentials WHERE email = ?1",
                params![email],
            )
            .context("Failed to delete credentials")?;

        Ok(rows_affected > 0)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn create_test_store() -> SqliteCredentialStore {
        let key = BASE64.encode([0u8; 32]);
        SqliteCredentialStore::new(":memory:", &key).expect("Failed to create test store")
    }

    #[test]
    fn test_put_and_get() {
        let store = create_test_store();
        store
            .put("alice@example.com", r#"{"access_token":"a"}"#, Some("Alice"))
            .unwrap();

        let blob = store.get("alice@example.com").unwrap();
        assert_eq!(blob.as_deref(), Some(r#"{"access_token":"a"}"#));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_blob_is_encrypted_at_rest() {
        let store = create_test_store();
        store
            .put("alice@example.com", r#"{"access_token":"ya29.secret"}"#, None)
            .unwrap();

        let raw: String = store
            .conn
            .lock()
            .query_row(
                "SELECT credentials FROM tenant_credentials WHERE email = ?1",
                params!["alice@example.com"],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!raw.contains("ya29"));
    }

    #[test]
    fn test_update_replaces_blob_and_keeps_display_name() {
        let store = create_test_store();
        store.put("alice@example.com", "old", Some("Alice")).unwrap();

        store.update("alice@example.com", "new").unwrap();

        assert_eq!(store.get("alice@example.com").unwrap().as_deref(), Some("new"));
        let tenants = store.list().unwrap();
        assert_eq!(tenants[0].display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_update_missing_tenant_fails() {
        let store = create_test_store();
        assert!(store.update("ghost@example.com", "blob").is_err());
    }

    #[test]
    fn test_put_without_name_keeps_existing_name() {
        let store = create_test_store();
        store.put("alice@example.com", "one", Some("Alice")).unwrap();
        store.put("alice@example.com", "two", None).unwrap();

        let tenants = store.list().unwrap();
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].display_name.as_deref(), Some("Alice"));
        assert_eq!(store.get("alice@example.com").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_list_is_ordered_by_email() {
        let store = create_test_store();
        store.put("carol@example.com", "c", None).unwrap();
        store.put("alice@example.com", "a", Some("Alice")).unwrap();
        store.put("bob@example.com", "b", None).unwrap();

        let emails: Vec<String> = store.list().unwrap().into_iter().map(|t| t.email).collect();
        assert_eq!(
            emails,
            vec!["alice@example.com", "bob@example.com", "carol@example.com"]
        );
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        store.put("alice@example.com", "blob", None).unwrap();

        assert!(store.delete("alice@example.com").unwrap());
        assert!(store.get("alice@example.com").unwrap().is_none());
        assert!(!store.delete("alice@example.com").unwrap());
    }

    #[test]
    fn test_reopen_with_same_key_reads_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.db");
        let key = BASE64.encode([3u8; 32]);

        {
            let store = SqliteCredentialStore::new(&path, &key).unwrap();
            store.put("alice@example.com", "persisted", None).unwrap();
        }

        let reopened = SqliteCredentialStore::new(&path, &key).unwrap();
        assert_eq!(
            reopened.get("alice@example.com").unwrap().as_deref(),
            Some("persisted")
        );

        let wrong_key = BASE64.encode([4u8; 32]);
        let wrong = SqliteCredentialStore::new(&path, &wrong_key).unwrap();
        assert!(wrong.get("alice@example.com").is_err());
    }

    #[test]
    fn test_invalid_encryption_key() {
        assert!(SqliteCredentialStore::new(":memory:", "short").is_err());
        assert!(SqliteCredentialStore::new(":memory:", "not-valid-base64!@#$").is_err());
    }
}
