use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE encrypted_files (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL,
                filename    TEXT NOT NULL,
                blob_ref    TEXT NOT NULL UNIQUE,
                size        INTEGER NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_encrypted_files_owner
                ON encrypted_files(owner_id, created_at);

            CREATE TABLE share_links (
                token           TEXT PRIMARY KEY,
                file_id         TEXT NOT NULL REFERENCES encrypted_files(id) ON DELETE CASCADE,
                expires_at      TEXT,
                max_downloads   INTEGER CHECK (max_downloads IS NULL OR max_downloads > 0),
                downloads       INTEGER NOT NULL DEFAULT 0,
                created_by      TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                CHECK (downloads >= 0),
                CHECK (max_downloads IS NULL OR downloads <= max_downloads)
            );

            CREATE INDEX idx_share_links_creator
                ON share_links(created_by, created_at);
            CREATE INDEX idx_share_links_file
                ON share_links(file_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
