use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "feedbackbot")]
#[command(version, about = "Admin console for feedbackbot tenants")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Console host to talk to (e.g. feedbackbot.lavina.tech)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Print raw JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with email and password
    Login {
        /// Defaults to the last email used
        #[arg(long)]
        email: Option<String>,
    },

    /// Create an account and log in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show the OAuth login settings and the password reset link
    AuthInfo,

    /// Tenant management
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },

    /// Bot management
    Bots {
        #[command(subcommand)]
        command: BotCommands,
    },

    /// Group management
    Groups {
        #[command(subcommand)]
        command: GroupCommands,
    },

    /// Browse and export feedback
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },
}

#[derive(Subcommand)]
pub enum TenantCommands {
    /// Show a tenant (defaults to the selected one)
    Show { id: Option<u64> },
    /// Create a tenant and select it
    Create {
        name: String,
        slug: String,
    },
    /// Select the tenant later commands default to
    Use { id: u64 },
}

#[derive(Subcommand)]
pub enum BotCommands {
    List,
    Show { id: u64 },
    /// Register a bot by its Telegram token
    Add {
        token: String,
        #[arg(long)]
        tenant: Option<u64>,
    },
    Remove { id: u64 },
}

#[derive(Subcommand)]
pub enum GroupCommands {
    List {
        #[arg(long)]
        tenant: Option<u64>,
    },
    Activate { id: u64 },
    Deactivate { id: u64 },
    /// Change where feedback of a group is delivered
    Config {
        id: u64,
        /// Repost feedback into the group itself
        #[arg(long)]
        post_to_group: Option<bool>,
        /// Forum topic to post into
        #[arg(long)]
        forum_topic_id: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum FeedbackCommands {
    List(FeedbackFilterArgs),
    /// Print the CSV download link
    ExportUrl(FeedbackFilterArgs),
}

#[derive(Args)]
pub struct FeedbackFilterArgs {
    pub group_id: u64,

    /// Only feedback addressed to admins
    #[arg(long, conflicts_with = "public")]
    pub admin_only: bool,

    /// Only public feedback
    #[arg(long)]
    pub public: bool,

    #[arg(long)]
    pub page: Option<u32>,

    #[arg(long)]
    pub limit: Option<u32>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    #[arg(long)]
    pub search: Option<String>,
}
