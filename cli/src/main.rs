use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tenantscope::auth::{AzureAdTokenProvider, PromptMode, SecretKind};
use tenantscope::credentials::{CredentialResolver, PemDirectoryCertificateStore, ResolvedCredential};
use tenantscope::discovery::ManagementClient;
use tenantscope::environment::AZURE_CLOUD;
use tenantscope::model::{Subscription, find_subscription_by_name};
use tenantscope::orchestrator::{AuthenticationOrchestrator, DiscoveryScope};
use tenantscope::utils::EnvUtils;
use uuid::Uuid;

mod config;
mod logger;
mod prompt;

use config::AppConfig;
use prompt::StderrPrompt;

/// CLI arguments for tenantscope
#[derive(Parser, Debug)]
#[command(version, about = "Discover Azure subscriptions across tenants", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (defaults to ./config.toml if it exists)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Sign in and list every subscription the principal can access
    Login {
        /// Cloud environment name
        #[arg(short, long, default_value = AZURE_CLOUD)]
        environment: String,
        /// Subscription APIs to query
        #[arg(long, value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
        /// User principal name, or application id with --service-principal
        #[arg(short, long)]
        user: Option<String>,
        /// Environment variable holding the password or client secret
        #[arg(long)]
        secret_env: Option<String>,
        /// Sign in as a service principal (client credentials)
        #[arg(long, requires_all = ["user", "secret_env"])]
        service_principal: bool,
        /// Tenant for service principal logins
        #[arg(long)]
        tenant: Option<String>,
        /// Never prompt; only reuse tokens obtained earlier in this process
        #[arg(long)]
        no_prompt: bool,
        /// Print the credential of the subscription with this display name
        #[arg(short, long)]
        subscription: Option<String>,
    },
    /// Resolve a credential for a subscription recorded in the profile
    Resolve {
        /// Subscription id
        subscription_id: Uuid,
    },
    /// List known environments
    Environments,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ScopeArg {
    ResourceManager,
    ServiceManagement,
    All,
}

impl From<ScopeArg> for DiscoveryScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::ResourceManager => DiscoveryScope::ResourceManager,
            ScopeArg::ServiceManagement => DiscoveryScope::ServiceManagement,
            ScopeArg::All => DiscoveryScope::All,
        }
    }
}

/// Orchestrator and resolver sharing one credential cache.
struct Session {
    orchestrator: Arc<AuthenticationOrchestrator>,
    resolver: CredentialResolver,
}

impl Session {
    fn new(config: &AppConfig, service_principal_tenant: Option<String>) -> Self {
        let mut provider =
            AzureAdTokenProvider::new(config.client_id()).with_prompt(Arc::new(StderrPrompt));
        if let Some(tenant) =
            service_principal_tenant.or_else(|| config.service_principal_tenant().map(str::to_string))
        {
            provider = provider.with_service_principal_tenant(tenant);
        }

        let orchestrator = Arc::new(AuthenticationOrchestrator::new(
            Arc::new(provider),
            ManagementClient::new(),
        ));
        let resolver = CredentialResolver::new(
            orchestrator.clone(),
            Arc::new(config.profile_store()),
            Arc::new(PemDirectoryCertificateStore::new(config.certificate_dir())),
        )
        .with_environments(config.environments());

        Self {
            orchestrator,
            resolver,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = config::load_config(args.config.as_deref()).into_result()?;
    logger::setup_logger(config.logging(), args.verbose)?;

    match args.command {
        Command::Login {
            environment,
            scope,
            user,
            secret_env,
            service_principal,
            tenant,
            no_prompt,
            subscription,
        } => {
            let environments = config.environments();
            let environment = environments.get(&environment)?;
            let session = Session::new(&config, tenant);

            let kind = if service_principal {
                SecretKind::ClientSecret
            } else {
                SecretKind::Password
            };
            let secret = secret_env
                .as_deref()
                .map(|name| EnvUtils::secret_from_var(name, kind))
                .transpose()?;
            let mode = if no_prompt {
                PromptMode::CachedOnly
            } else {
                PromptMode::Interactive
            };

            let result = session
                .orchestrator
                .authenticate(
                    environment,
                    scope.into(),
                    mode,
                    user.as_deref(),
                    secret.as_ref(),
                )
                .await
                .context("Login failed")?;

            println!("Signed in as {}", result.user_id);
            print_subscriptions(&result.subscriptions);

            if let Some(name) = subscription {
                let selected = find_subscription_by_name(&result.subscriptions, &name)?;
                let credential = session.resolver.resolve_credential(selected.id).await?;
                print_credential(&credential);
            }
        }
        Command::Resolve { subscription_id } => {
            let session = Session::new(&config, None);
            match session.resolver.resolve_credential(subscription_id).await {
                Ok(credential) => print_credential(&credential),
                Err(e) if e.requires_interaction() => {
                    return Err(anyhow::Error::new(e).context(
                        "No usable session; run `tenantscope login` to sign in interactively",
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Environments => {
            for name in config.environments().names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn print_subscriptions(subscriptions: &[Subscription]) {
    if subscriptions.is_empty() {
        println!("No subscriptions found.");
        return;
    }

    let width = subscriptions
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or_default();
    for subscription in subscriptions {
        println!(
            "{}  {:width$}  {:<10}  {}",
            subscription.id,
            subscription.name,
            subscription.state.as_deref().unwrap_or("-"),
            subscription.tenant_id.as_deref().unwrap_or("-"),
        );
    }
}

fn print_credential(credential: &ResolvedCredential) {
    match credential {
        ResolvedCredential::AccessToken(credential) => println!(
            "{}: bearer token for {} (tenant {}, expires {})",
            credential.subscription_id,
            credential.token.user_id,
            credential.token.tenant_id,
            credential.token.expires_on.to_rfc3339(),
        ),
        ResolvedCredential::Certificate(credential) => println!(
            "{}: management certificate {}",
            credential.subscription_id,
            credential.certificate.thumbprint(),
        ),
    }
}
