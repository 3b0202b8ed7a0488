use anyhow::Context;
use clap::Subcommand;

use crate::auth::{ApiKeyService, TokenIssuer};
use crate::config::{AppConfig, DatabaseConfig};
use crate::domain::{ApiKeyId, PlanTier, TenantId};
use crate::storage::{create_pool, repositories::TenantRepository};
use crate::usage::UsageRecorder;

#[derive(Subcommand, Debug)]
pub enum TenantCommands {
    /// Create a tenant and print its id
    Create {
        #[arg(long)]
        name: String,
        /// free, hobby, pro or business
        #[arg(long, default_value = "free")]
        plan: PlanTier,
    },
    /// Change a tenant's plan tier
    SetPlan {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        plan: PlanTier,
    },
    /// List all tenants
    List,
}

#[derive(Subcommand, Debug)]
pub enum ApiKeyCommands {
    /// Issue a key; the plaintext is printed once
    Issue {
        #[arg(long)]
        tenant: String,
        #[arg(long, default_value = "default")]
        name: String,
    },
    /// List key metadata for a tenant
    List {
        #[arg(long)]
        tenant: String,
    },
    /// Revoke a key
    Revoke {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        key: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    /// Sign a bearer token for a tenant
    Issue {
        #[arg(long)]
        tenant: String,
    },
}

fn parse_tenant(raw: &str) -> anyhow::Result<TenantId> {
    TenantId::parse(raw).with_context(|| format!("'{}' is not a valid tenant id", raw))
}

pub async fn handle_tenant_command(
    command: TenantCommands,
    database: &DatabaseConfig,
) -> anyhow::Result<()> {
    let pool = create_pool(database).await?;
    let tenants = TenantRepository::new(pool.clone());
    let usage = UsageRecorder::new(pool);

    match command {
        TenantCommands::Create { name, plan } => {
            let name = name.trim();
            if name.is_empty() || name.len() > 100 {
                anyhow::bail!("Tenant name must be 1-100 characters");
            }
            let tenant = tenants.create(name, plan).await?;
            usage
                .record_audit(&tenant.id, "tenant.created", serde_json::json!({ "plan": plan }))
                .await;
            println!("Created tenant {} ({}) on plan {}", tenant.id, tenant.name, tenant.plan_tier);
        }
        TenantCommands::SetPlan { tenant, plan } => {
            let tenant_id = parse_tenant(&tenant)?;
            let tenant = tenants.set_plan(&tenant_id, plan).await?;
            usage
                .record_audit(&tenant_id, "tenant.plan_changed", serde_json::json!({ "plan": plan }))
                .await;
            println!("Tenant {} is now on plan {}", tenant.id, tenant.plan_tier);
        }
        TenantCommands::List => {
            let all = tenants.list().await?;
            if all.is_empty() {
                println!("No tenants");
            }
            for tenant in all {
                println!("{}  {:<10} {}", tenant.id, tenant.plan_tier, tenant.name);
            }
        }
    }

    Ok(())
}

pub async fn handle_api_key_command(
    command: ApiKeyCommands,
    database: &DatabaseConfig,
) -> anyhow::Result<()> {
    let pool = create_pool(database).await?;
    let service = ApiKeyService::new(pool)?;

    match command {
        ApiKeyCommands::Issue { tenant, name } => {
            let tenant_id = parse_tenant(&tenant)?;
            let issued = service.issue(&tenant_id, &name).await?;
            println!("API key {} ({})", issued.id, issued.name);
            println!("{}", issued.key);
            eprintln!("Store this key now; it cannot be shown again.");
        }
        ApiKeyCommands::List { tenant } => {
            let tenant_id = parse_tenant(&tenant)?;
            for key in service.list(&tenant_id).await? {
                let status = if key.revoked { "revoked" } else { "active" };
                println!("{}  {:<8} {}", key.id, status, key.name);
            }
        }
        ApiKeyCommands::Revoke { tenant, key } => {
            let tenant_id = parse_tenant(&tenant)?;
            let key_id = ApiKeyId::parse(&key).with_context(|| format!("'{}' is not a valid key id", key))?;
            service.revoke(&tenant_id, &key_id).await?;
            println!("Revoked API key {}", key_id);
        }
    }

    Ok(())
}

pub async fn handle_token_command(
    command: TokenCommands,
    database: &DatabaseConfig,
) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let pool = create_pool(database).await?;
    let tenants = TenantRepository::new(pool);

    match command {
        TokenCommands::Issue { tenant } => {
            let tenant_id = parse_tenant(&tenant)?;
            tenants.get(&tenant_id).await?;
            let issued = TokenIssuer::new(&config.auth).issue(&tenant_id)?;
            println!("{}", issued.token);
            eprintln!("Expires at {}", issued.expires_at.to_rfc3339());
        }
    }

    Ok(())
}
