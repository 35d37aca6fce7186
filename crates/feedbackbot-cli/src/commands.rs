//! Command handlers.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use feedbackbot_core::api::FeedbackConfigUpdate;
use feedbackbot_core::models::{AdminFilter, FeedbackPage, FeedbackParams, DEFAULT_PAGE_SIZE};
use feedbackbot_core::{ApiClient, Config};

use crate::cli::{BotCommands, Commands, FeedbackCommands, FeedbackFilterArgs, GroupCommands, TenantCommands};

pub struct Console {
    pub client: ApiClient,
    /// File configuration, without environment or flag overrides
    pub config: Config,
    pub json: bool,
}

impl Console {
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login { email } => self.login(email).await,
            Commands::Register { name, email } => self.register(&name, &email).await,
            Commands::Logout => {
                self.client.logout();
                println!("Logged out.");
                Ok(())
            }
            Commands::Whoami => self.whoami().await,
            Commands::AuthInfo => self.auth_info().await,
            Commands::Tenant { command } => self.tenant(command).await,
            Commands::Bots { command } => self.bots(command).await,
            Commands::Groups { command } => self.groups(command).await,
            Commands::Feedback { command } => self.feedback(command).await,
        }
    }

    // ===== Authentication =====

    async fn login(&mut self, email: Option<String>) -> Result<()> {
        let email = match email.or_else(|| self.config.last_email.clone()) {
            Some(email) => email,
            None => prompt("Email: ")?,
        };
        let password = rpassword::prompt_password("Password: ")?;
        if email.is_empty() || password.is_empty() {
            bail!("Email and password required");
        }

        let tokens = self.client.login(&email, &password).await?;
        self.config.last_email = Some(email);
        if let Some(tenant_id) = tokens.tenant_id {
            self.config.tenant_id.get_or_insert(tenant_id);
        }
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        let user = self.client.store().user();
        let name = user.as_ref().map(|u| u.display_name()).unwrap_or("unknown user");
        println!("Logged in as {}.", name);
        Ok(())
    }

    async fn register(&mut self, name: &str, email: &str) -> Result<()> {
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Repeat password: ")?;
        if password != confirm {
            bail!("Passwords do not match");
        }

        let tokens = self.client.register(name, email, &password).await?;
        self.config.last_email = Some(email.to_string());
        self.config.tenant_id = tokens.tenant_id.or(self.config.tenant_id);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        println!("Account created, logged in as {}.", email);
        Ok(())
    }

    async fn whoami(&self) -> Result<()> {
        let user = self.client.me().await?;
        if self.json {
            return print_json(&user);
        }
        println!("{}", user.display_name());
        if let Some(ref email) = user.email {
            println!("  email:  {}", email);
        }
        if let Some(ref role) = user.role {
            println!("  role:   {}", role);
        }
        if let Some(tenant_id) = user.tenant_id {
            println!("  tenant: {}", tenant_id);
        }
        Ok(())
    }

    async fn auth_info(&self) -> Result<()> {
        let config = self.client.auth_config().await?;
        let reset_url = self.client.forgot_password_url().await?;
        if self.json {
            return print_json(&serde_json::json!({
                "oauth": config,
                "forgot_password_url": reset_url,
            }));
        }
        println!("OAuth authorize URL: {}", config.authorize_url);
        println!("Client ID:           {}", config.client_id);
        println!("Redirect URI:        {}", config.redirect_uri);
        println!("Scopes:              {}", config.scopes);
        println!("Reset password at:   {}", reset_url);
        Ok(())
    }

    // ===== Tenants =====

    /// Explicit tenant, else the selected one, else the signed-in user's.
    fn tenant_id(&self, explicit: Option<u64>) -> Result<u64> {
        explicit
            .or(self.config.tenant_id)
            .or_else(|| self.client.store().user().and_then(|u| u.tenant_id))
            .ok_or_else(|| anyhow!("No tenant selected; pass one or run `feedbackbot tenant use <id>`"))
    }

    async fn tenant(&mut self, command: TenantCommands) -> Result<()> {
        match command {
            TenantCommands::Show { id } => {
                let tenant = self.client.get_tenant(self.tenant_id(id)?).await?;
                if self.json {
                    return print_json(&tenant);
                }
                println!("{} ({})", tenant.name, tenant.slug);
                println!("  id:      {}", tenant.id);
                println!("  created: {}", format_time(tenant.created_at));
                Ok(())
            }
            TenantCommands::Create { name, slug } => {
                let tenant = self.client.create_tenant(&name, &slug).await?;
                self.select_tenant(tenant.id)?;
                if self.json {
                    return print_json(&tenant);
                }
                println!("Created tenant {} (id {}).", tenant.name, tenant.id);
                Ok(())
            }
            TenantCommands::Use { id } => {
                self.select_tenant(id)?;
                println!("Tenant {} selected.", id);
                Ok(())
            }
        }
    }

    fn select_tenant(&mut self, id: u64) -> Result<()> {
        self.config.tenant_id = Some(id);
        self.config.save().context("Failed to save selected tenant")
    }

    // ===== Bots =====

    async fn bots(&self, command: BotCommands) -> Result<()> {
        match command {
            BotCommands::List => {
                let bots = self.client.get_bots().await?;
                if self.json {
                    return print_json(&bots);
                }
                if bots.is_empty() {
                    println!("No bots.");
                }
                for bot in bots {
                    let status = if bot.verified { "verified" } else { "unverified" };
                    println!("{:>6}  {:<30} {}", bot.id, bot.handle(), status);
                }
                Ok(())
            }
            BotCommands::Show { id } => {
                let bot = self.client.get_bot(id).await?;
                if self.json {
                    return print_json(&bot);
                }
                println!("{} ({})", bot.handle(), bot.bot_name);
                println!("  id:       {}", bot.id);
                println!("  tenant:   {}", bot.tenant_id);
                println!("  verified: {}", bot.verified);
                println!("  added:    {}", format_time(bot.created_at));
                Ok(())
            }
            BotCommands::Add { token, tenant } => {
                let bot = self.client.create_bot(self.tenant_id(tenant)?, &token).await?;
                if self.json {
                    return print_json(&bot);
                }
                println!("Added bot {} (id {}).", bot.handle(), bot.id);
                Ok(())
            }
            BotCommands::Remove { id } => {
                self.client.delete_bot(id).await?;
                println!("Removed bot {}.", id);
                Ok(())
            }
        }
    }

    // ===== Groups =====

    async fn groups(&self, command: GroupCommands) -> Result<()> {
        match command {
            GroupCommands::List { tenant } => {
                let groups = self.client.get_groups(self.tenant_id(tenant)?).await?;
                if self.json {
                    return print_json(&groups);
                }
                if groups.is_empty() {
                    println!("No groups. Add the bot to a Telegram group first.");
                }
                for group in groups {
                    let state = if group.is_active { "active" } else { "inactive" };
                    println!(
                        "{:>6}  {:<40} {:<10} {}",
                        group.id,
                        group.title,
                        group.group_type.as_str(),
                        state
                    );
                }
                Ok(())
            }
            GroupCommands::Activate { id } => self.set_group_active(id, true).await,
            GroupCommands::Deactivate { id } => self.set_group_active(id, false).await,
            GroupCommands::Config {
                id,
                post_to_group,
                forum_topic_id,
            } => {
                if post_to_group.is_none() && forum_topic_id.is_none() {
                    bail!("Nothing to change; pass --post-to-group or --forum-topic-id");
                }
                let update = FeedbackConfigUpdate {
                    post_to_group,
                    forum_topic_id,
                };
                let config = self.client.update_group_config(id, &update).await?;
                if self.json {
                    return print_json(&config);
                }
                println!(
                    "Group {}: post to group {}, forum topic {}",
                    config.group_id,
                    config.post_to_group,
                    config
                        .forum_topic_id
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "none".to_string())
                );
                Ok(())
            }
        }
    }

    async fn set_group_active(&self, id: u64, active: bool) -> Result<()> {
        let group = self.client.update_group(id, active).await?;
        if self.json {
            return print_json(&group);
        }
        let state = if group.is_active { "active" } else { "inactive" };
        println!("{} is now {}.", group.title, state);
        Ok(())
    }

    // ===== Feedback =====

    async fn feedback(&self, command: FeedbackCommands) -> Result<()> {
        match command {
            FeedbackCommands::List(args) => {
                let params = feedback_params(args)?;
                let page = self.client.get_feedbacks(&params).await?;
                if self.json {
                    return print_json(&page);
                }
                print_feedback_page(&page);
                Ok(())
            }
            FeedbackCommands::ExportUrl(args) => {
                let params = feedback_params(args)?;
                println!("{}", self.client.export_csv_url(&params)?);
                Ok(())
            }
        }
    }
}

fn feedback_params(args: FeedbackFilterArgs) -> Result<FeedbackParams> {
    let admin_only = match (args.admin_only, args.public) {
        (true, _) => Some(AdminFilter::AdminOnly),
        (false, true) => Some(AdminFilter::Public),
        (false, false) => None,
    };
    Ok(FeedbackParams {
        group_id: args.group_id,
        admin_only,
        page: args.page,
        limit: Some(args.limit.unwrap_or(DEFAULT_PAGE_SIZE)),
        date_from: args.from.map(|d| checked_date(&d)).transpose()?,
        date_to: args.to.map(|d| checked_date(&d)).transpose()?,
        search: args.search,
    })
}

fn checked_date(value: &str) -> Result<String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", value))?;
    Ok(value.to_string())
}

fn print_feedback_page(page: &FeedbackPage) {
    if page.data.is_empty() {
        println!("No feedback.");
        return;
    }
    for item in &page.data {
        let audience = if item.admin_only { "admin" } else { "public" };
        println!("#{} {} [{}]", item.id, format_time(item.created_at), audience);
        println!("  {}", item.message);
    }
    println!();
    println!(
        "Page {} of {} ({} total){}",
        page.page,
        page.total_pages().max(1),
        page.total,
        if page.has_next() { ", use --page for more" } else { "" }
    );
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(group_id: u64) -> FeedbackFilterArgs {
        FeedbackFilterArgs {
            group_id,
            admin_only: false,
            public: false,
            page: None,
            limit: None,
            from: None,
            to: None,
            search: None,
        }
    }

    #[test]
    fn test_feedback_params_defaults_page_size() {
        let params = feedback_params(args(3)).unwrap();
        assert_eq!(params.group_id, 3);
        assert_eq!(params.limit, Some(DEFAULT_PAGE_SIZE));
        assert_eq!(params.admin_only, None);
    }

    #[test]
    fn test_feedback_params_audience_filter() {
        let params = feedback_params(FeedbackFilterArgs {
            public: true,
            ..args(3)
        })
        .unwrap();
        assert_eq!(params.admin_only, Some(AdminFilter::Public));
    }

    #[test]
    fn test_feedback_params_rejects_bad_dates() {
        let result = feedback_params(FeedbackFilterArgs {
            from: Some("01/02/2024".to_string()),
            ..args(3)
        });
        assert!(result.is_err());

        let params = feedback_params(FeedbackFilterArgs {
            from: Some("2024-02-01".to_string()),
            ..args(3)
        })
        .unwrap();
        assert_eq!(params.date_from.as_deref(), Some("2024-02-01"));
    }

    #[test]
    fn test_format_time_missing() {
        assert_eq!(format_time(None), "-");
    }
}
