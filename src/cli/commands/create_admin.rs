use crate::auth::{AccountStatus, MIN_PASSWORD_LEN, Role};
use crate::config::Config;
use crate::db::repositories::account::hash_password;
use crate::db::{NewAccount, Store};

pub async fn cmd_create_admin(
    config: &Config,
    username: &str,
    password: &str,
    full_name: Option<&str>,
) -> anyhow::Result<()> {
    let username = username.trim();
    if username.is_empty() {
        println!("Username must not be empty.");
        return Ok(());
    }
    if password.len() < MIN_PASSWORD_LEN {
        println!("Password must be at least {MIN_PASSWORD_LEN} characters.");
        return Ok(());
    }

    let store = Store::new(&config.general.database_url).await?;
    let accounts = store.accounts();
    let hash = hash_password(password, Some(&config.security))?;

    if let Some(existing) = accounts.find_by_username(username).await? {
        if existing.role != Role::SuperAdmin.as_str() {
            println!(
                "Account '{}' already exists with role '{}'.",
                username, existing.role
            );
            println!("Refusing to promote it. Pick another username.");
            return Ok(());
        }

        accounts.update_password(existing.id, &hash).await?;
        accounts.unlock(existing.id).await?;
        println!("✓ Repaired super admin '{username}' (password reset, account unlocked)");
        return Ok(());
    }

    let account = accounts
        .create(NewAccount {
            username: username.to_string(),
            password_hash: hash,
            full_name: full_name.unwrap_or("System Administrator").to_string(),
            rank: None,
            position: None,
            division: None,
            subdivision: None,
            phone: None,
            email: None,
            role: Role::SuperAdmin.as_str().to_string(),
            status: AccountStatus::Active.as_str().to_string(),
            expire_date: None,
        })
        .await?;

    println!("✓ Created super admin '{}' (ID: {})", account.username, account.id);
    println!("  Rotate this password after the first login.");

    Ok(())
}
