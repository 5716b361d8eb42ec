use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use resolver_core::models::{Credentials, ResolveQuery};
use resolver_core::resolver::Resolver;
use resolver_core::secrets::CredentialStore;
use resolver_core::{init_logging, AppDirs, Config};
use resolver_plugin::{PluginHost, PluginServer};
use rhapsody_resolver::{Endpoints, RhapsodyResolver, RESOLVER_ID};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::BufReader;

#[derive(Debug, Parser)]
#[command(name = "rhapsody-resolver", version, about = "Rhapsody resolver plugin")]
struct Cli {
    /// Config file override (defaults to config.toml in the config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer plugin protocol requests on stdin/stdout (default)
    Serve,
    /// Log in and run a typeahead search
    Search { query: String },
    /// Look up an artist/track pair
    Resolve(ResolveArgs),
    /// Turn a rhap:// URL into a stream URL
    StreamUrl { url: String },
    /// Check account settings without keeping the login
    TestConfig(AccountArgs),
    /// Store the account password in the OS keyring
    SetPassword(AccountArgs),
    /// Remove the account password from the OS keyring
    ClearPassword {
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Debug, Args, Clone)]
struct ResolveArgs {
    #[arg(long)]
    artist: String,
    #[arg(long)]
    track: String,
    #[arg(long)]
    album: Option<String>,
}

#[derive(Debug, Args, Clone, Default)]
struct AccountArgs {
    /// Account email (defaults to account.email)
    #[arg(long)]
    email: Option<String>,
    /// Account password (read from stdin when omitted for set-password)
    #[arg(long)]
    password: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
enum CliError {
    #[error("no account email given; pass --email or set account.email in config.toml")]
    MissingEmail,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("no credentials configured; set account.email and a password first")]
    NotConfigured,
}

impl From<ResolveArgs> for ResolveQuery {
    fn from(args: ResolveArgs) -> Self {
        ResolveQuery {
            artist: args.artist,
            track: args.track,
            album: args.album,
        }
    }
}

impl AccountArgs {
    fn email(&self, config: &Config) -> Result<String, CliError> {
        account_email(self.email.as_deref(), config)
    }

    /// Candidate settings: flags first, then the stored configuration.
    fn candidate(&self, stored: &Credentials) -> Credentials {
        Credentials {
            email: self.email.clone().unwrap_or_else(|| stored.email.clone()),
            password: self
                .password
                .clone()
                .unwrap_or_else(|| stored.password.clone()),
            quality: stored.quality,
        }
    }
}

fn account_email(flag: Option<&str>, config: &Config) -> Result<String, CliError> {
    flag.or(config.account.email.as_deref())
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .ok_or(CliError::MissingEmail)
}

/// Account credentials from the config, with the keyring as password fallback.
fn stored_credentials(config: &Config, store: &CredentialStore) -> Credentials {
    let has_file_password = config
        .account
        .password
        .as_deref()
        .is_some_and(|p| !p.is_empty());
    let fallback = match &config.account.email {
        Some(email) if !has_file_password && !email.trim().is_empty() => {
            store.find_password(email)
        }
        _ => None,
    };
    config.account.credentials(fallback)
}

fn build_resolver(config: &Config, host: Arc<PluginHost>) -> Result<RhapsodyResolver> {
    let endpoints =
        Endpoints::from_config(&config.service).context("invalid service configuration")?;
    let resolver = RhapsodyResolver::new(host, endpoints, &config.http)?;
    Ok(resolver)
}

/// Initializes the resolver and waits for its login to finish.
async fn logged_in(config: &Config, credentials: Credentials) -> Result<RhapsodyResolver> {
    if !credentials.is_complete() {
        return Err(CliError::NotConfigured.into());
    }
    let host = Arc::new(PluginHost::new(credentials));
    let resolver = build_resolver(config, host)?;
    resolver.init().await;
    match resolver.session().outcome().await {
        Some(Ok(_)) => Ok(resolver),
        Some(Err(err)) => Err(CliError::LoginFailed(err.to_string()).into()),
        None => Err(CliError::NotConfigured.into()),
    }
}

fn read_password_line(input: impl BufRead) -> Result<String> {
    let line = input
        .lines()
        .next()
        .transpose()
        .context("failed to read password from stdin")?
        .unwrap_or_default();
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(CliError::EmptyPassword.into());
    }
    Ok(password)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default(&dirs)?,
    };
    let _logging = init_logging(&config.logging, &dirs)?;
    let store = CredentialStore::new(RESOLVER_ID);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!(config_dir = %dirs.config_dir().display(), "serving plugin protocol on stdio");
            let host = Arc::new(PluginHost::new(stored_credentials(&config, &store)));
            let resolver = build_resolver(&config, Arc::clone(&host))?;
            let server = PluginServer::new(RESOLVER_ID, env!("CARGO_PKG_VERSION"), resolver, host);
            server
                .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
        }
        Command::Search { query } => {
            let resolver = logged_in(&config, stored_credentials(&config, &store)).await?;
            print_json(&resolver.search(&query).await?)?;
        }
        Command::Resolve(args) => {
            let resolver = logged_in(&config, stored_credentials(&config, &store)).await?;
            print_json(&resolver.resolve(&args.into()).await?)?;
        }
        Command::StreamUrl { url } => {
            let resolver = logged_in(&config, stored_credentials(&config, &store)).await?;
            let stream = resolver.get_stream_url(&url).await?;
            println!("{}", stream.as_ref());
        }
        Command::TestConfig(args) => {
            let candidate = args.candidate(&stored_credentials(&config, &store));
            let host = Arc::new(PluginHost::default());
            let resolver = build_resolver(&config, host)?;
            let result = resolver.test_config(&candidate).await;
            tracing::info!(?result, "configuration test finished");
            println!("{result:?}");
        }
        Command::SetPassword(args) => {
            let email = args.email(&config)?;
            let password = match args.password {
                Some(password) if !password.is_empty() => password,
                Some(_) => return Err(CliError::EmptyPassword.into()),
                None => read_password_line(std::io::stdin().lock())?,
            };
            store.store_password(&email, &password)?;
            println!("Stored password for {email}.");
        }
        Command::ClearPassword { email } => {
            let email = account_email(email.as_deref(), &config)?;
            store.delete_password(&email)?;
            println!("Removed stored password for {email}.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolver_core::models::Quality;

    fn config_with_email(email: Option<&str>) -> Config {
        let mut config = Config::default();
        config.account.email = email.map(str::to_string);
        config
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["rhapsody-resolver"]).expect("bare invocation parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn resolve_requires_artist_and_track() {
        assert!(Cli::try_parse_from(["rhapsody-resolver", "resolve", "--artist", "a"]).is_err());

        let cli = Cli::try_parse_from([
            "rhapsody-resolver",
            "resolve",
            "--artist",
            "Daft Punk",
            "--track",
            "One More Time",
        ])
        .expect("resolve parses");
        let Some(Command::Resolve(args)) = cli.command else {
            panic!("expected resolve command");
        };
        let query: ResolveQuery = args.into();
        assert_eq!(query.search_text(), "Daft Punk One More Time");
        assert_eq!(query.album, None);
    }

    #[test]
    fn email_flag_takes_precedence() {
        let config = config_with_email(Some("stored@example.com"));
        assert_eq!(
            account_email(Some(" flag@example.com "), &config).unwrap(),
            "flag@example.com"
        );
        assert_eq!(
            account_email(None, &config).unwrap(),
            "stored@example.com"
        );
    }

    #[test]
    fn missing_email_is_reported() {
        let config = config_with_email(Some("   "));
        assert_eq!(account_email(None, &config), Err(CliError::MissingEmail));
        assert_eq!(
            account_email(None, &config_with_email(None)),
            Err(CliError::MissingEmail)
        );
    }

    #[test]
    fn candidate_falls_back_to_stored_settings() {
        let stored = Credentials::new("stored@example.com", "stored-pw", Quality::High);
        let args = AccountArgs {
            email: None,
            password: Some("new-pw".into()),
        };
        let candidate = args.candidate(&stored);
        assert_eq!(candidate.email, "stored@example.com");
        assert_eq!(candidate.password, "new-pw");
        assert_eq!(candidate.quality, Quality::High);
    }

    #[test]
    fn file_password_wins_over_keyring() {
        let mut config = config_with_email(Some("a@b.c"));
        config.account.password = Some("from-file".into());
        let store = CredentialStore::new("cli-test");
        let credentials = stored_credentials(&config, &store);
        assert_eq!(credentials.password, "from-file");
    }

    #[test]
    fn password_is_read_from_first_line() {
        let input = std::io::Cursor::new("hunter2\nignored\n");
        assert_eq!(read_password_line(input).unwrap(), "hunter2");

        let err = read_password_line(std::io::Cursor::new("\n")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CliError>(),
            Some(&CliError::EmptyPassword)
        );
    }

    #[tokio::test]
    async fn one_shot_commands_need_credentials() {
        let err = logged_in(&Config::default(), Credentials::default())
            .await
            .err()
            .expect("incomplete credentials are rejected");
        assert_eq!(
            err.downcast_ref::<CliError>(),
            Some(&CliError::NotConfigured)
        );
    }

    #[test]
    fn config_flag_loads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "config_version = 1\n[account]\nemail = \"a@b.c\"\nquality = 2\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "rhapsody-resolver",
            "--config",
            path.to_str().unwrap(),
            "search",
            "x",
        ])
        .unwrap();
        let config = Config::load_from(cli.config.as_deref().unwrap()).unwrap();
        assert_eq!(config.account.email.as_deref(), Some("a@b.c"));
        assert_eq!(config.account.quality, Quality::High);
    }
}
