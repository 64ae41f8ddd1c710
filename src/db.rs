use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

/// Opens the pool and makes sure every table exists.
///
/// An in-memory database lives and dies with its connection, so those pools are
/// pinned to a single connection that is never recycled.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let db_pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?
    };

    create_tables(&db_pool).await?;
    Ok(db_pool)
}

const NOW: &str = "(strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))";

pub async fn create_tables(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS participants (
                id TEXT PRIMARY KEY,
                nickname TEXT NOT NULL,
                is_master BOOLEAN NOT NULL DEFAULT 0,
                character_id TEXT UNIQUE,
                health_points INTEGER NOT NULL DEFAULT 10,
                max_health_points INTEGER NOT NULL DEFAULT 10,
                created_at TEXT NOT NULL DEFAULT {NOW}
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
                nickname TEXT NOT NULL,
                content TEXT NOT NULL,
                is_dice_roll BOOLEAN NOT NULL DEFAULT 0,
                dice_type TEXT,
                dice_result INTEGER,
                created_at TEXT NOT NULL DEFAULT {NOW}
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS dice_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
                result INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT {NOW}
            )"
        ),
        "CREATE TABLE IF NOT EXISTS attributes (
            user_id TEXT PRIMARY KEY REFERENCES participants(id) ON DELETE CASCADE,
            strength INTEGER NOT NULL DEFAULT 10,
            dexterity INTEGER NOT NULL DEFAULT 10,
            constitution INTEGER NOT NULL DEFAULT 10,
            intelligence INTEGER NOT NULL DEFAULT 10,
            wisdom INTEGER NOT NULL DEFAULT 10,
            charisma INTEGER NOT NULL DEFAULT 10
        )"
        .to_owned(),
        "CREATE TABLE IF NOT EXISTS skills (
            user_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            value INTEGER NOT NULL DEFAULT 0,
            proficient BOOLEAN NOT NULL DEFAULT 0
        )"
        .to_owned(),
        "CREATE TABLE IF NOT EXISTS abilities (
            id TEXT NOT NULL,
            user_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            PRIMARY KEY (user_id, id)
        )"
        .to_owned(),
        "CREATE TABLE IF NOT EXISTS inventory (
            id TEXT NOT NULL,
            user_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (user_id, id)
        )"
        .to_owned(),
        "CREATE TABLE IF NOT EXISTS currency (
            user_id TEXT PRIMARY KEY REFERENCES participants(id) ON DELETE CASCADE,
            bronze INTEGER NOT NULL DEFAULT 0,
            silver INTEGER NOT NULL DEFAULT 0,
            gold INTEGER NOT NULL DEFAULT 0
        )"
        .to_owned(),
        format!(
            "CREATE TABLE IF NOT EXISTS npcs (
                id TEXT PRIMARY KEY,
                master_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
                nickname TEXT NOT NULL,
                health_points INTEGER NOT NULL DEFAULT 10,
                max_health_points INTEGER NOT NULL DEFAULT 10,
                show_health_bar BOOLEAN NOT NULL DEFAULT 1,
                health_bar_color TEXT NOT NULL DEFAULT 'green',
                show_in_chat BOOLEAN NOT NULL DEFAULT 0,
                notes TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT {NOW}
            )"
        ),
        "CREATE TABLE IF NOT EXISTS npc_attributes (
            npc_id TEXT PRIMARY KEY REFERENCES npcs(id) ON DELETE CASCADE,
            strength INTEGER NOT NULL DEFAULT 10,
            dexterity INTEGER NOT NULL DEFAULT 10,
            constitution INTEGER NOT NULL DEFAULT 10,
            intelligence INTEGER NOT NULL DEFAULT 10,
            wisdom INTEGER NOT NULL DEFAULT 10,
            charisma INTEGER NOT NULL DEFAULT 10
        )"
        .to_owned(),
        "CREATE TABLE IF NOT EXISTS npc_skills (
            npc_id TEXT NOT NULL REFERENCES npcs(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            value INTEGER NOT NULL DEFAULT 0,
            proficient BOOLEAN NOT NULL DEFAULT 0
        )"
        .to_owned(),
        "CREATE TABLE IF NOT EXISTS npc_abilities (
            id TEXT NOT NULL,
            npc_id TEXT NOT NULL REFERENCES npcs(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            PRIMARY KEY (npc_id, id)
        )"
        .to_owned(),
        "CREATE TABLE IF NOT EXISTS npc_inventory (
            id TEXT NOT NULL,
            npc_id TEXT NOT NULL REFERENCES npcs(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (npc_id, id)
        )"
        .to_owned(),
        format!(
            "CREATE TABLE IF NOT EXISTS shared_items (
                id TEXT PRIMARY KEY,
                master_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT '',
                rarity TEXT NOT NULL DEFAULT '',
                value TEXT NOT NULL DEFAULT '',
                weight TEXT NOT NULL DEFAULT '',
                effect TEXT NOT NULL DEFAULT '',
                is_public BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT {NOW}
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS shared_abilities (
                id TEXT PRIMARY KEY,
                master_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT '',
                cost TEXT NOT NULL DEFAULT '',
                \"range\" TEXT NOT NULL DEFAULT '',
                duration TEXT NOT NULL DEFAULT '',
                effect TEXT NOT NULL DEFAULT '',
                is_public BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT {NOW}
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS master_notes (
                id TEXT PRIMARY KEY,
                master_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT {NOW}
            )"
        ),
    ];

    for statement in &statements {
        sqlx::query(statement).execute(db_pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_is_idempotent() {
        let db_pool = connect("sqlite::memory:").await.unwrap();
        create_tables(&db_pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(&db_pool)
        .await
        .unwrap();
        assert_eq!(count, 16);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db_pool = connect("sqlite::memory:").await.unwrap();
        let result = sqlx::query("INSERT INTO dice_results (user_id, result) VALUES ('ghost', 4)")
            .execute(&db_pool)
            .await;
        assert!(result.is_err());
    }
}
