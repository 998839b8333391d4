use crate::Database;
use crate::models::{FileRow, ShareLinkRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

const FILE_COLUMNS: &str = "id, owner_id, filename, blob_ref, size, created_at, updated_at";
const LINK_COLUMNS: &str =
    "token, file_id, expires_at, max_downloads, downloads, created_by, created_at";

impl Database {
    // -- Users --

    /// Returns false if the username is already taken.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)
                 ON CONFLICT(username) DO NOTHING",
                (id, username, password_hash),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Encrypted files --

    pub fn insert_file(&self, file: &FileRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO encrypted_files (id, owner_id, filename, blob_ref, size, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    file.id,
                    file.owner_id,
                    file.filename,
                    file.blob_ref,
                    file.size,
                    file.created_at,
                    file.updated_at
                ],
            )?;
            Ok(())
        })
    }

    /// Lookup is scoped to the owner: another owner's file is simply absent.
    pub fn get_file(&self, id: &str, owner_id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {FILE_COLUMNS} FROM encrypted_files WHERE id = ?1 AND owner_id = ?2"
            );
            conn.query_row(&sql, [id, owner_id], file_from_row).optional()
        })
    }

    /// Newest first.
    pub fn list_files(&self, owner_id: &str) -> Result<Vec<FileRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {FILE_COLUMNS} FROM encrypted_files
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], file_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Record that the blob behind a file was replaced. Returns false if no
    /// row matched.
    pub fn touch_file(&self, id: &str, owner_id: &str, size: i64, updated_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE encrypted_files SET size = ?3, updated_at = ?4
                 WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id, size, updated_at],
            )?;
            Ok(changed == 1)
        })
    }

    /// Deletes the row and, through the foreign key, its share links.
    pub fn delete_file(&self, id: &str, owner_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM encrypted_files WHERE id = ?1 AND owner_id = ?2",
                [id, owner_id],
            )?;
            Ok(deleted == 1)
        })
    }

    // -- Share links --

    /// Returns false when the token already exists. Any other constraint
    /// failure (unknown file id, bad limits) is an error.
    pub fn insert_share_link(&self, link: &ShareLinkRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO share_links (token, file_id, expires_at, max_downloads, downloads, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(token) DO NOTHING",
                params![
                    link.token,
                    link.file_id,
                    link.expires_at,
                    link.max_downloads,
                    link.downloads,
                    link.created_by,
                    link.created_at
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_share_link(&self, token: &str) -> Result<Option<ShareLinkRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {LINK_COLUMNS} FROM share_links WHERE token = ?1");
            conn.query_row(&sql, [token], link_from_row).optional()
        })
    }

    /// Take one download from a live link.
    ///
    /// The liveness check and the increment are a single statement, so two
    /// callers racing for the last download cannot both win. Returns the
    /// updated row, or `None` if the link is missing, expired or exhausted.
    pub fn consume_share_link(&self, token: &str, now: &str) -> Result<Option<ShareLinkRow>> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE share_links SET downloads = downloads + 1
                 WHERE token = ?1
                   AND (expires_at IS NULL OR expires_at >= ?2)
                   AND (max_downloads IS NULL OR downloads < max_downloads)
                 RETURNING {LINK_COLUMNS}"
            );
            conn.query_row(&sql, [token, now], link_from_row).optional()
        })
    }

    /// Newest first.
    pub fn list_share_links(&self, created_by: &str) -> Result<Vec<ShareLinkRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {LINK_COLUMNS} FROM share_links
                 WHERE created_by = ?1
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([created_by], link_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_share_link(&self, token: &str, created_by: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM share_links WHERE token = ?1 AND created_by = ?2",
                [token, created_by],
            )?;
            Ok(deleted == 1)
        })
    }

    /// Remove links that can never be used again. Returns how many were removed.
    pub fn prune_share_links(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let pruned = conn.execute(
                "DELETE FROM share_links
                 WHERE (expires_at IS NOT NULL AND expires_at < ?1)
                    OR (max_downloads IS NOT NULL AND downloads >= max_downloads)",
                [now],
            )?;
            Ok(pruned)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, username, password, created_at FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            created_at: row.get(3)?,
        })
    })
    .optional()
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        filename: row.get(2)?,
        blob_ref: row.get(3)?,
        size: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<ShareLinkRow> {
    Ok(ShareLinkRow {
        token: row.get(0)?,
        file_id: row.get(1)?,
        expires_at: row.get(2)?,
        max_downloads: row.get(3)?,
        downloads: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_timestamp;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use std::thread;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn file_row(owner: &str, created_at: &str) -> FileRow {
        let id = uuid::Uuid::new_v4().to_string();
        FileRow {
            blob_ref: format!("{id}.enc"),
            id,
            owner_id: owner.into(),
            filename: "notes.txt".into(),
            size: 64,
            created_at: created_at.into(),
            updated_at: created_at.into(),
        }
    }

    fn link_row(file_id: &str, token: &str, max: Option<i64>, expires_at: Option<String>) -> ShareLinkRow {
        ShareLinkRow {
            token: token.into(),
            file_id: file_id.into(),
            expires_at,
            max_downloads: max,
            downloads: 0,
            created_by: "owner-a".into(),
            created_at: format_timestamp(Utc::now()),
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let db = db();
        db.with_conn(|conn| crate::migrations::run(conn)).unwrap();
        let version: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = db();
        assert!(db.create_user("u1", "alice", "h1").unwrap());
        assert!(!db.create_user("u2", "alice", "h2").unwrap());
        assert_eq!(db.get_user_by_username("alice").unwrap().unwrap().id, "u1");
        assert_eq!(db.get_user_by_id("u1").unwrap().unwrap().username, "alice");
        assert!(db.get_user_by_id("u2").unwrap().is_none());
    }

    #[test]
    fn file_lookup_is_owner_scoped() {
        let db = db();
        let row = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&row).unwrap();

        assert!(db.get_file(&row.id, "owner-a").unwrap().is_some());
        assert!(db.get_file(&row.id, "owner-b").unwrap().is_none());
        assert!(!db.delete_file(&row.id, "owner-b").unwrap());
        assert!(!db.touch_file(&row.id, "owner-b", 1, "x").unwrap());
        assert!(db.delete_file(&row.id, "owner-a").unwrap());
        assert!(!db.delete_file(&row.id, "owner-a").unwrap());
    }

    #[test]
    fn blob_refs_are_unique() {
        let db = db();
        let first = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&first).unwrap();
        let mut second = file_row("owner-a", &format_timestamp(Utc::now()));
        second.blob_ref = first.blob_ref.clone();
        assert!(db.insert_file(&second).is_err());
    }

    #[test]
    fn files_list_newest_first() {
        let db = db();
        let base = Utc::now();
        let old = file_row("owner-a", &format_timestamp(base - Duration::hours(1)));
        let new = file_row("owner-a", &format_timestamp(base));
        let other = file_row("owner-b", &format_timestamp(base));
        db.insert_file(&old).unwrap();
        db.insert_file(&new).unwrap();
        db.insert_file(&other).unwrap();

        let ids: Vec<String> = db
            .list_files("owner-a")
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[test]
    fn consume_stops_at_the_limit() {
        let db = db();
        let file = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&file).unwrap();
        db.insert_share_link(&link_row(&file.id, "tok", Some(2), None)).unwrap();

        let now = format_timestamp(Utc::now());
        assert_eq!(db.consume_share_link("tok", &now).unwrap().unwrap().downloads, 1);
        assert_eq!(db.consume_share_link("tok", &now).unwrap().unwrap().downloads, 2);
        assert!(db.consume_share_link("tok", &now).unwrap().is_none());
        assert_eq!(db.get_share_link("tok").unwrap().unwrap().downloads, 2);
        assert!(db.consume_share_link("missing", &now).unwrap().is_none());
    }

    #[test]
    fn consume_respects_expiry() {
        let db = db();
        let file = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&file).unwrap();
        let deadline = Utc::now();
        db.insert_share_link(&link_row(&file.id, "tok", None, Some(format_timestamp(deadline))))
            .unwrap();

        let after = format_timestamp(deadline + Duration::seconds(1));
        assert!(db.consume_share_link("tok", &after).unwrap().is_none());
        let at = format_timestamp(deadline);
        assert!(db.consume_share_link("tok", &at).unwrap().is_some());
    }

    #[test]
    fn concurrent_consumers_never_exceed_the_limit() {
        let db = Arc::new(db());
        let file = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&file).unwrap();
        db.insert_share_link(&link_row(&file.id, "tok", Some(3), None)).unwrap();

        let now = format_timestamp(Utc::now());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let db = db.clone();
                let now = now.clone();
                thread::spawn(move || db.consume_share_link("tok", &now).unwrap().is_some())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 3);
        assert_eq!(db.get_share_link("tok").unwrap().unwrap().downloads, 3);
    }

    #[test]
    fn duplicate_token_is_reported_not_raised() {
        let db = db();
        let file = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&file).unwrap();
        assert!(db.insert_share_link(&link_row(&file.id, "tok", None, None)).unwrap());
        assert!(!db.insert_share_link(&link_row(&file.id, "tok", None, None)).unwrap());
    }

    #[test]
    fn link_to_unknown_file_is_an_error() {
        let db = db();
        assert!(db.insert_share_link(&link_row("no-such-file", "tok", None, None)).is_err());
    }

    #[test]
    fn zero_download_limit_violates_schema() {
        let db = db();
        let file = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&file).unwrap();
        assert!(db.insert_share_link(&link_row(&file.id, "tok", Some(0), None)).is_err());
    }

    #[test]
    fn deleting_a_file_cascades_to_links() {
        let db = db();
        let file = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&file).unwrap();
        db.insert_share_link(&link_row(&file.id, "tok", None, None)).unwrap();

        assert!(db.delete_file(&file.id, "owner-a").unwrap());
        assert!(db.get_share_link("tok").unwrap().is_none());
    }

    #[test]
    fn link_delete_requires_creator() {
        let db = db();
        let file = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&file).unwrap();
        db.insert_share_link(&link_row(&file.id, "tok", None, None)).unwrap();

        assert!(!db.delete_share_link("tok", "owner-b").unwrap());
        assert_eq!(db.list_share_links("owner-a").unwrap().len(), 1);
        assert!(db.delete_share_link("tok", "owner-a").unwrap());
        assert!(db.list_share_links("owner-a").unwrap().is_empty());
    }

    #[test]
    fn prune_removes_only_dead_links() {
        let db = db();
        let file = file_row("owner-a", &format_timestamp(Utc::now()));
        db.insert_file(&file).unwrap();
        let now = Utc::now();

        let past = Some(format_timestamp(now - Duration::minutes(5)));
        let future = Some(format_timestamp(now + Duration::minutes(5)));
        db.insert_share_link(&link_row(&file.id, "expired", None, past)).unwrap();
        db.insert_share_link(&link_row(&file.id, "live", Some(1), future)).unwrap();
        db.insert_share_link(&link_row(&file.id, "used-up", Some(1), None)).unwrap();
        db.insert_share_link(&link_row(&file.id, "forever", None, None)).unwrap();

        let stamp = format_timestamp(now);
        db.consume_share_link("used-up", &stamp).unwrap().unwrap();

        assert_eq!(db.prune_share_links(&stamp).unwrap(), 2);
        assert!(db.get_share_link("live").unwrap().is_some());
        assert!(db.get_share_link("forever").unwrap().is_some());
        assert!(db.get_share_link("expired").unwrap().is_none());
        assert!(db.get_share_link("used-up").unwrap().is_none());
    }
}
