//! mealient CLI
//!
//! Drives the authentication core from a terminal: remembers a Mealie server,
//! signs in with a password, OIDC or a scraped web token, and inspects or
//! clears the stored session.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use mealient::api::{ServerApi, ServerInfoRepo};
use mealient::auth::{
    open_backend, AuthError, AuthMethod, Authenticator, CallbackResult, CredentialStore,
};
use mealient::config::{config_path, credentials_path, load_config, save_config, Settings};
use mealient::error::AppError;
use mealient::http::{client_with_timeout, refresh_bearer, ApiClient};
use reqwest::Client;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity flags
    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr) // Log to stderr to keep stdout clean
        .init();

    match run(cli).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Everything a command needs, loaded once per invocation
struct Session {
    settings_path: PathBuf,
    settings: Settings,
    http: Client,
    auth: Arc<Authenticator>,
}

impl Session {
    fn load(config: Option<PathBuf>, ephemeral: bool) -> Result<Self, AppError> {
        let settings_path = match config {
            Some(path) => path,
            None => config_path()?,
        };
        let settings = load_config(&settings_path)?;
        debug!(path = %settings_path.display(), "settings loaded");

        let http = client_with_timeout(settings.http_timeout())?;
        let store = if ephemeral {
            CredentialStore::in_memory()
        } else {
            CredentialStore::open(open_backend(settings.storage, credentials_path(&settings_path)))?
        };
        let auth = Arc::new(Authenticator::new(http.clone(), Arc::new(store), &settings));

        Ok(Self {
            settings_path,
            settings,
            http,
            auth,
        })
    }

    /// Discovery state lives in memory, so an OIDC session needs a fresh
    /// discovery before its refresh token can be used.
    async fn prepare_oidc_refresh(&self) -> Result<(), AppError> {
        if self.auth.get_auth_method()? != AuthMethod::Oidc {
            return Ok(());
        }
        if let Err(e) = self.auth.discover_oidc().await {
            warn!(error = %e, "OIDC discovery failed, refresh will not be possible");
        }
        Ok(())
    }
}

async fn run(cli: Cli) -> Result<String, AppError> {
    let session = Session::load(cli.config, cli.ephemeral)?;

    match cli.command {
        Commands::Server(args) => execute_server(session, &args.url).await,
        Commands::Login(args) => execute_login(&session, args).await,
        Commands::Sso => execute_sso(&session).await,
        Commands::Token(args) => {
            session.auth.complete_web_login(&args.token)?;
            Ok("✓ Token stored (web session, cannot be refreshed)".to_string())
        }
        Commands::Refresh => execute_refresh(&session).await,
        Commands::Whoami => execute_whoami(&session).await,
        Commands::Status => execute_status(&session),
        Commands::Logout => {
            session.auth.logout()?;
            Ok("✓ Logged out".to_string())
        }
    }
}

async fn execute_server(mut session: Session, url: &str) -> Result<String, AppError> {
    if url.trim().is_empty() {
        return Err(AppError::InvalidInput("Server URL cannot be empty".to_string()));
    }

    let repo = ServerInfoRepo::new(ServerApi::new(session.http.clone()));
    let (base_url, info) = repo.try_base_url(url).await?;

    let changed = session.settings.base_url.as_deref() != Some(base_url.as_str());
    if changed && session.auth.get_auth_token()?.is_some() {
        info!("server changed, dropping credentials of the previous server");
        session.auth.logout()?;
    }

    session.settings.base_url = Some(base_url.clone());
    session.settings.server_version = Some(info.version.clone());
    save_config(&session.settings_path, &session.settings)?;

    let mut output = format!("✓ Server {} (Mealie {})", base_url, info.version);
    if info.allow_password_login == Some(false) {
        output.push_str("\n  Password login: disabled");
    }
    if info.enable_oidc == Some(true) {
        let provider = info.oidc_provider_name.as_deref().unwrap_or("OIDC");
        output.push_str(&format!("\n  Single sign-on: {}", provider));
    }
    Ok(output)
}

async fn execute_login(session: &Session, args: cli::LoginArgs) -> Result<String, AppError> {
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email or username: ")?,
    };
    if email.is_empty() {
        return Err(AppError::InvalidInput("Email is required".to_string()));
    }

    let password = match args.password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };
    if password.is_empty() {
        return Err(AppError::InvalidInput("Password is required".to_string()));
    }

    session.auth.authenticate(&email, &password).await?;
    Ok(format!(
        "✓ Signed in with password\n  Storage: {}",
        session.auth.store().backend().describe()
    ))
}

async fn execute_sso(session: &Session) -> Result<String, AppError> {
    match session.auth.discover_oidc().await {
        Ok(config) => {
            info!(issuer = %config.issuer, "starting OIDC authorization");
            let request = session.auth.start_oidc_flow()?;
            open_in_browser(&request.authorization_url);

            eprintln!(
                "After signing in, the browser is sent to {}.",
                session.auth.oidc().redirect_uri()
            );
            let redirect = prompt("Paste the full redirect URL: ")?;
            let callback = CallbackResult::from_redirect(&redirect, session.auth.oidc().redirect_uri())?;
            session.auth.complete_oidc_login(&callback, &request).await?;

            Ok(format!(
                "✓ Signed in with OIDC ({})\n  Storage: {}",
                config.issuer,
                session.auth.store().backend().describe()
            ))
        }
        Err(AuthError::WebBasedOidc { .. }) => {
            let web = session.auth.web_login_request()?;
            info!("server only supports single sign-on through its web login page");
            open_in_browser(web.login_url());

            eprintln!("Once signed in, run this in the browser console on {}:", web.base_url());
            eprintln!("\n{}\n", web.script());
            let token = prompt("Paste the token: ")?;
            session.auth.complete_web_login(&token)?;

            Ok("✓ Signed in through the web login (session cannot be refreshed)".to_string())
        }
        Err(e) => Err(e.into()),
    }
}

async fn execute_refresh(session: &Session) -> Result<String, AppError> {
    session.prepare_oidc_refresh().await?;

    let method = session.auth.get_auth_method()?;
    let token = session.auth.get_auth_token()?;
    let refreshed = refresh_bearer(session.auth.as_ref(), token.as_deref(), None).await?;

    match (method, refreshed) {
        (AuthMethod::None, _) => Ok("Not signed in".to_string()),
        (_, None) => Err(AuthError::NoToken.into()),
        (AuthMethod::Oidc, Some(_)) => Ok("✓ OIDC session refreshed".to_string()),
        (AuthMethod::Password, Some(_)) => {
            Ok("✓ Password session uses a long-lived API token, nothing to refresh".to_string())
        }
    }
}

async fn execute_whoami(session: &Session) -> Result<String, AppError> {
    let base_url = session.auth.base_url().ok_or(AuthError::NoServer)?;
    session.prepare_oidc_refresh().await?;

    let client = ApiClient::new(session.http.clone(), base_url, session.auth.clone());
    let user = client.get_user_self().await?;

    let mut output = user.full_name.as_deref().unwrap_or(&user.email).to_string();
    output.push_str(&format!("\n  Email: {}", user.email));
    if let Some(username) = &user.username {
        output.push_str(&format!("\n  Username: {}", username));
    }
    if let Some(household) = &user.household {
        output.push_str(&format!("\n  Household: {}", household));
    }
    if user.admin {
        output.push_str("\n  Admin: yes");
    }
    Ok(output)
}

fn execute_status(session: &Session) -> Result<String, AppError> {
    let server = match (&session.settings.base_url, &session.settings.server_version) {
        (Some(url), Some(version)) => format!("{} (Mealie {})", url, version),
        (Some(url), None) => url.clone(),
        _ => "not configured".to_string(),
    };
    let method = session.auth.get_auth_method()?;
    let authorized = *session.auth.is_authorized().borrow();
    let has_refresh = session.auth.store().oidc_refresh_token()?.is_some();

    let mut output = format!("Server: {}", server);
    output.push_str(&format!("\nSigned in: {}", if authorized { "yes" } else { "no" }));
    output.push_str(&format!("\nMethod: {}", method));
    if method == AuthMethod::Oidc {
        output.push_str(&format!(
            "\nRefresh token: {}",
            if has_refresh { "present" } else { "none" }
        ));
    }
    output.push_str(&format!(
        "\nStorage: {}",
        session.auth.store().backend().describe()
    ));
    Ok(output)
}

fn open_in_browser(url: &str) {
    if webbrowser::open(url).is_ok() {
        info!("Opened browser");
    } else {
        eprintln!("\nPlease visit this URL in your browser:");
        eprintln!("{}\n", url);
    }
}

fn prompt(label: &str) -> Result<String, AppError> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
