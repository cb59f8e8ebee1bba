use anyhow::Result;

use crate::core::db::async_db;
use crate::models::User;

/// Users can't sign up through the API so the first administrator has
/// to be created here.
pub async fn run(db_path: &str, name: String, email: String, admin: bool) -> Result<()> {
    let db = async_db(db_path).await?;
    let user = db
        .call(move |conn| Ok(User::create(conn, &name, &email, admin)?))
        .await?;

    println!("Created user {} ({})", user.id, user.email);
    println!("API key: {}", user.api_key);
    Ok(())
}
