//! Auth command handlers.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Result, anyhow, bail};
use qltb_core::api::ApiClient;
use qltb_core::auth::{
    AuthError, AuthSuccess, FileCredentialStore, RegistrationProfile, SessionManager,
    SessionStatus,
};

pub(crate) fn session_manager(api: ApiClient) -> SessionManager<FileCredentialStore> {
    let mut manager = SessionManager::new(api, FileCredentialStore::default());
    manager.restore();
    manager
}

/// Renders an auth error the way a form would: on its field, or as a notice.
fn present(err: &AuthError) -> anyhow::Error {
    if let Some(field_error) = err.field_error() {
        return anyhow!("{field_error}");
    }
    match err.retry_after() {
        Some(retry_after) => anyhow!(
            "error: {err}\nSubmitting is disabled until {}",
            retry_after.with_timezone(&chrono::Local).format("%H:%M:%S")
        ),
        None => anyhow!("error: {err}"),
    }
}

fn print_success(success: &AuthSuccess, action: &str) {
    println!(
        "✓ {action} as {} ({})",
        success.identity.email, success.identity.role
    );
    println!("Home: {}", success.redirect);
}

/// Reads one line from stdin, prompting on stderr when interactive.
pub(crate) fn read_password() -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        io::stderr().flush()?;
    }
    let mut input = String::new();
    stdin.lock().read_line(&mut input)?;
    let password = input.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password: Please enter your password");
    }
    Ok(password)
}

pub async fn login(api: ApiClient, email: &str, password: Option<String>, wait: bool) -> Result<()> {
    let mut manager = session_manager(api);
    if manager.status() == SessionStatus::Authenticated {
        if let Some(identity) = manager.session().identity() {
            println!("Already logged in as {}; signing out first.", identity.email);
        }
        manager.logout();
    }

    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };

    let result = match manager.login(email, &password).await {
        Err(err @ AuthError::RateLimited { .. }) if wait => {
            eprintln!("{}", present(&err));
            eprintln!("Waiting for the cool-down before retrying...");
            manager.wait_until_submit_enabled().await;
            manager.login(email, &password).await
        }
        other => other,
    };

    let success = result.map_err(|e| present(&e))?;
    print_success(&success, "Logged in");
    Ok(())
}

pub async fn register(api: ApiClient, profile: RegistrationProfile) -> Result<()> {
    let mut manager = session_manager(api);
    if manager.status() == SessionStatus::Authenticated {
        manager.logout();
    }

    let success = manager.register(&profile).await.map_err(|e| present(&e))?;
    print_success(&success, "Registered and logged in");
    Ok(())
}

pub fn logout(api: ApiClient) -> Result<()> {
    let mut manager = session_manager(api);
    if manager.logout() {
        println!("✓ Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

pub fn whoami(api: ApiClient) -> Result<()> {
    let manager = session_manager(api);
    let session = manager.session();
    let Some(identity) = session.identity() else {
        println!("Not logged in.");
        return Ok(());
    };

    println!("{} <{}>", identity.full_name, identity.email);
    println!("Role: {}", identity.role);
    if let Some(student_id) = &identity.student_id {
        println!("Student ID: {student_id}");
    }
    if let Some(class_name) = &identity.class_name {
        println!("Class: {class_name}");
    }
    if let Some(faculty) = &identity.faculty {
        println!("Faculty: {faculty}");
    }
    if let Some(credential) = session.credential() {
        println!("Token: {credential}");
    }
    println!("Home: {}", identity.role.home());
    Ok(())
}
