//! Database row types, mapped directly from SQLite rows.
//! Distinct from coffer-types models to keep the DB layer independent;
//! ids and timestamps stay as their stored text.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct FileRow {
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    pub blob_ref: String,
    pub size: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ShareLinkRow {
    pub token: String,
    pub file_id: String,
    pub expires_at: Option<String>,
    pub max_downloads: Option<i64>,
    pub downloads: i64,
    pub created_by: String,
    pub created_at: String,
}
