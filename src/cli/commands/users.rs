//! Account management command handlers

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_users_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let users = store.list_users().await?;

    if users.is_empty() {
        println!("No accounts found.");
        println!();
        println!("Seed demo accounts with: vigil seed");
        return Ok(());
    }

    println!("Accounts ({} total)", users.len());
    println!("{:-<70}", "");

    for user in users {
        let state = if user.is_locked {
            if user.failed_login > 0 {
                "🔒 locked (brute-force)"
            } else {
                "🔒 locked (admin)"
            }
        } else {
            "active"
        };

        println!("{:>4}  {:<32} {:<6} {}", user.id, user.email, user.role, state);
        if user.failed_login > 0 {
            println!("      failed attempts: {}", user.failed_login);
        }
    }

    Ok(())
}

pub async fn cmd_users_unlock(config: &Config, email: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(user) = store.get_user_by_email(email).await? else {
        println!("No account with email {email}");
        return Ok(());
    };

    if !user.is_locked && user.failed_login == 0 {
        println!("{email} is not locked.");
        return Ok(());
    }

    store.set_user_lock_fields(user.id, false, 0, None).await?;
    println!("✓ {email} unlocked");

    Ok(())
}
