//! Seed demo accounts and sandbox sample files

use crate::config::Config;
use crate::db::Store;
use crate::services::PathSandbox;

const DEMO_PASSWORD: &str = "password123";

const DEMO_USERS: &[(&str, &str)] = &[
    ("alice@example.com", "Alice"),
    ("bob@example.com", "Bob"),
    ("carol@example.com", "Carol"),
];

const SAMPLE_FILES: &[(&str, &str)] = &[
    (
        "notes.txt",
        "Team notes:\n- rotate the demo credentials\n- review the audit trail weekly\n",
    ),
    (
        "readme.md",
        "# Safe files\n\nTargets for the path traversal test live in this directory.\n",
    ),
];

pub async fn cmd_seed(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    for (email, name) in DEMO_USERS {
        match store.get_user_by_email(email).await? {
            Some(user) => {
                store
                    .update_user_password(user.id, DEMO_PASSWORD, Some(&config.security))
                    .await?;
                println!("~ {email} (password reset)");
            }
            None => {
                store
                    .create_user(email, name, DEMO_PASSWORD, "user", Some(&config.security))
                    .await?;
                println!("+ {email}");
            }
        }
    }

    let sandbox = PathSandbox::from_config(&config.sandbox);
    sandbox.ensure_root()?;
    for (filename, content) in SAMPLE_FILES {
        sandbox.save(filename, content)?;
        println!("+ {}", filename);
    }
    println!("Sandbox files in {}", sandbox.root().display());

    println!("Seeding finished.");
    Ok(())
}
