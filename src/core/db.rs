use anyhow::Result;
use tokio_rusqlite::Connection;

/// Open the async connection used by the server. Foreign keys are
/// off by default in SQLite so they are switched on per connection.
pub async fn async_db(db_path: &str) -> Result<Connection> {
    let db = Connection::open(db_path).await?;
    db.call(|conn| {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    })
    .await?;
    Ok(db)
}

pub fn initialize_db(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r"
        BEGIN;

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            is_administrator INTEGER NOT NULL DEFAULT 0,
            api_key TEXT NOT NULL UNIQUE,
            active INTEGER NOT NULL DEFAULT 1,
            date_created TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS labels (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            creator_user_id INTEGER NOT NULL REFERENCES users(id),
            other_user_id INTEGER NOT NULL REFERENCES users(id),
            datetime_created TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL REFERENCES conversations(id),
            sender_user_id INTEGER NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            datetime_created TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS messages_conversation_idx
            ON messages(conversation_id);

        COMMIT;
        ",
    )
}
