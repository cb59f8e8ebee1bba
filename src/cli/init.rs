use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::db::{async_db, initialize_db};

pub async fn run(db: bool, db_path: &str) -> Result<()> {
    if !db {
        return Err(anyhow!("Missing value for init \"--db\""));
    }

    println!("Initializing db at {}...", db_path);
    if let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .unwrap_or_else(|err| println!("Ignoring db directory create failed: {}", err));
    }

    let db = async_db(db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    println!("Finished initializing db");

    Ok(())
}
