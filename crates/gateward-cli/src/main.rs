use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use gateward_auth::{AuthConfig, ForwardedRequest, Gateway, Identity, Uuid, generate_nonce};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gateward", about = "Inspect and exercise a forward-auth gateway configuration")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Path to the gateway TOML config
    #[arg(long, global = true, default_value = "gateward.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse and validate the config file
    Check,
    /// Show the cookie domain and redirect URI used for a host
    Scope {
        host: String,
        #[arg(long, default_value = "https")]
        proto: String,
    },
    /// Print a fresh login nonce
    Nonce,
    /// Evaluate the authorization policy for a user
    Authorize {
        #[arg(long)]
        email: String,
        #[arg(long = "role")]
        roles: Vec<String>,
        #[arg(long, default_value = "default")]
        rule: String,
    },
    /// Issue an auth cookie for a host and validate it again
    Cookie {
        #[arg(long)]
        host: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            let cfg = load(&cli.config)?;
            pout(
                cli.json,
                serde_json::json!({
                    "ok": true,
                    "cookie_name": cfg.cookie_name,
                    "csrf_cookie_name": cfg.csrf_cookie_name,
                    "lifetime_seconds": cfg.lifetime_seconds,
                    "cookie_domains": cfg.cookie_domains,
                    "auth_host": cfg.auth_host,
                    "rules": cfg.rules.keys().collect::<Vec<_>>(),
                }),
                &format!("{} is valid", cli.config.display()),
            )?;
        }
        Commands::Scope { host, proto } => {
            let cfg = load(&cli.config)?;
            let gateway = Gateway::from_config(&cfg)?;
            let resolved = cfg.scope_matcher().resolve(&host);
            let req = ForwardedRequest::new(&host, &proto, "/");
            let auth_domain = gateway.use_auth_domain(&req);
            let redirect_uri = gateway.redirect_uri(&req);
            pout(
                cli.json,
                serde_json::json!({
                    "host": host,
                    "cookie_domain": resolved.domain,
                    "configured_scope": resolved.matched,
                    "auth_domain": auth_domain,
                    "redirect_uri": redirect_uri,
                }),
                &format!(
                    "cookie domain: {}{}\nredirect uri: {redirect_uri}",
                    resolved.domain,
                    if resolved.matched { "" } else { " (host fallback)" },
                ),
            )?;
        }
        Commands::Nonce => {
            let nonce = generate_nonce()?;
            pout(cli.json, serde_json::json!({ "nonce": nonce }), &nonce)?;
        }
        Commands::Authorize { email, roles, rule } => {
            let gateway = Gateway::from_config(&load(&cli.config)?)?;
            let user = Identity::new(Uuid::nil(), &email, &email).with_roles(roles);
            let allowed = gateway.authorize(&user, &rule);
            pout(
                cli.json,
                serde_json::json!({ "email": email, "rule": rule, "allowed": allowed }),
                if allowed { "allowed" } else { "denied" },
            )?;
        }
        Commands::Cookie { host, email, name } => {
            let gateway = Gateway::from_config(&load(&cli.config)?)?;
            let user = Identity::new(Uuid::new_v4(), &name, &email);
            let req = ForwardedRequest::new(&host, "https", "/");
            let cookie = gateway.make_cookie(&req, &user)?;
            let verified = gateway.validate_cookie(&req, &cookie.value)?;
            debug!(id = %verified.id, "issued cookie validated");
            pout(
                cli.json,
                serde_json::json!({
                    "set_cookie": cookie.to_set_cookie(),
                    "identity": verified.id.to_string(),
                    "expires": cookie.expires_unix(),
                }),
                &format!("Set-Cookie: {}", cookie.to_set_cookie()),
            )?;
        }
    }

    Ok(())
}

fn load(path: &Path) -> anyhow::Result<AuthConfig> {
    AuthConfig::load(path).map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))
}

fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
