//! `memberdash`: command-line front end for the membership dashboard.
//!
//! Signs in against the hosted backend, resolves the caller's roles, and
//! reports which dashboard tabs the session may reach. Password-reset and
//! member-record flows run through the same library services the dashboard
//! uses, with notifications printed to the terminal.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use time::OffsetDateTime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use memberdash::access::{DEFAULT_NAVIGATION, Role, tab_for_path};
use memberdash::backend::{BackendClient, BackendError};
use memberdash::context::{AppContext, AppEvent};
use memberdash::guard::{GuardConfig, GuardState};
use memberdash::history::History;
use memberdash::notify::{Notification, Notifier};
use memberdash::services::admin_reset::{self, AdminResetError, RequestOrigin};
use memberdash::services::forgot_password::{self, ForgotPasswordError, ForgotPasswordForm};
use memberdash::services::members::{self, MemberError, MemberPermissions, PasswordStatus};
use memberdash::services::reset_token::{self, LinkState, ResetError};
use memberdash::session::SessionProvider;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("reset token error: {0}")]
    Reset(#[from] ResetError),

    #[error("{0}")]
    ForgotPassword(#[from] ForgotPasswordError),

    #[error("{0}")]
    AdminReset(#[from] AdminResetError),

    #[error("{0}")]
    Member(#[from] MemberError),

    #[error("--email and --password (or MEMBERDASH_EMAIL / MEMBERDASH_PASSWORD) are required")]
    MissingCredentials,

    #[error("access to {0} denied")]
    AccessDenied(String),

    #[error("member {0} not found")]
    MemberNotFound(String),

    #[error("reset link is invalid or has expired")]
    InvalidLink,

    #[error("request failed")]
    Failed,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "memberdash", about = "Membership dashboard CLI")]
struct Cli {
    #[arg(long, env = "MEMBERDASH_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "MEMBERDASH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Role every signed-in user must hold to use the dashboard at all.
    #[arg(long, env = "MEMBERDASH_REQUIRED_ROLE")]
    required_role: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the tabs the signed-in user may reach.
    Tabs,
    /// Open a dashboard path and show where the guard lands.
    Open { path: String },
    /// Member records.
    Member(MemberCommand),
    /// Password reset flows.
    Password(PasswordCommand),
}

#[derive(Args, Debug)]
struct MemberCommand {
    #[command(subcommand)]
    command: MemberSubcommand,
}

#[derive(Subcommand, Debug)]
enum MemberSubcommand {
    /// Profile and password status.
    Status { member_number: String },
    /// Payment history, newest first.
    Payments { member_number: String },
    /// Admin notes.
    Notes { member_number: String },
    /// Attach an admin note.
    AddNote { member_number: String, text: String },
    /// Submit a pending payment for a member.
    RecordPayment {
        member_number: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "yearly")]
        payment_type: String,
    },
}

#[derive(Args, Debug)]
struct PasswordCommand {
    #[command(subcommand)]
    command: PasswordSubcommand,
}

#[derive(Subcommand, Debug)]
enum PasswordSubcommand {
    /// Request a reset link by email (no sign-in needed).
    Forgot {
        #[arg(long)]
        member_number: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
    },
    /// Check a reset link or bare token.
    Validate { link: String },
    /// Spend a reset token after the new password was set.
    Use { token: String },
    /// Issue a reset token for a member.
    Generate { member_number: String },
    /// Reset a member's password to their member number.
    AdminReset { member_number: String },
    /// Clear a member's failed-login lockout.
    Unlock { member_number: String },
    /// Purge expired reset tokens.
    Cleanup,
}

/// Prints notifications and mirrors them to the log.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        if notification.is_destructive() {
            warn!(title = %notification.title, "notification");
            eprintln!("! {notification}");
        } else {
            info!(title = %notification.title, "notification");
            println!("* {notification}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = BackendClient::from_env()?;
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

    match &cli.command {
        Command::Tabs => {
            let ctx = authorized_context(&cli, &client, "/", &notifier).await?;
            print_tabs(&ctx);
            Ok(())
        }
        Command::Open { path } => {
            let mut ctx = signed_in_context(&cli, &client, "/", &notifier).await?;
            ctx.dispatch(AppEvent::PathChanged(path.clone()));
            print_guard(&ctx);
            Ok(())
        }
        Command::Member(member) => {
            let ctx = authorized_context(&cli, &client, "/users", &notifier).await?;
            run_member(&client, &ctx, notifier.as_ref(), member).await
        }
        Command::Password(password) => run_password(&cli, &client, &notifier, password).await,
    }
}

/// Sign in, mount the dashboard context at `path`, and wait for roles.
async fn signed_in_context(
    cli: &Cli,
    client: &BackendClient,
    path: &str,
    notifier: &Arc<dyn Notifier>,
) -> Result<AppContext, CliError> {
    let (Some(email), Some(password)) = (&cli.email, &cli.password) else {
        return Err(CliError::MissingCredentials);
    };
    let session = client.sign_in_with_password(email, password).await?;
    let mut events = client.subscribe();

    let config = GuardConfig { required_role: cli.required_role.as_deref().map(Role::new) };
    let mut ctx = AppContext::new(DEFAULT_NAVIGATION, config, Arc::clone(notifier), Arc::new(History::new(path)));
    let pending = ctx.init(Some(session));
    ctx.settle(client, &mut events, pending).await;
    Ok(ctx)
}

/// [`signed_in_context`], refusing to go on unless the guard authorized the
/// tab `path` belongs to.
async fn authorized_context(
    cli: &Cli,
    client: &BackendClient,
    path: &str,
    notifier: &Arc<dyn Notifier>,
) -> Result<AppContext, CliError> {
    let ctx = signed_in_context(cli, client, path, notifier).await?;
    if !ctx.is_authorized_for(path) {
        warn!(%path, state = ?ctx.guard_state(), "guard refused requested path");
        return Err(CliError::AccessDenied(tab_for_path(path).to_owned()));
    }
    Ok(ctx)
}

fn print_tabs(ctx: &AppContext) {
    println!("{}", ctx.role_status_text());
    for entry in ctx.visible_entries() {
        println!("  {:<12} {}", entry.tab, entry.name);
    }
}

fn print_guard(ctx: &AppContext) {
    match ctx.guard_state() {
        GuardState::Authorized { tab } => println!("authorized: {tab}"),
        GuardState::Loading { path } => println!("loading: {path}"),
        GuardState::Unauthenticated => println!("redirected to login"),
        GuardState::Initializing => println!("not evaluated"),
    }
}

async fn run_member(
    client: &BackendClient,
    ctx: &AppContext,
    notifier: &dyn Notifier,
    member: &MemberCommand,
) -> Result<(), CliError> {
    let permissions = MemberPermissions::for_roles(ctx.roles().roles());
    match &member.command {
        MemberSubcommand::Status { member_number } => {
            let record = find_member(client, member_number).await?;
            let status = PasswordStatus::of(&record, OffsetDateTime::now_utc());
            println!("{} ({})", record.full_name, record.member_number);
            println!("  email:     {}", members::or_not_provided(record.email.as_deref()));
            println!("  phone:     {}", members::or_not_provided(record.phone.as_deref()));
            println!("  born:      {}", members::format_birth_date(record.date_of_birth.as_deref()));
            println!("  collector: {}", members::or_not_provided(record.collector.as_deref()));
            println!("  password:  {}", status.badges().join(", "));
            if status.failed_attempts > 0 {
                println!("  failed login attempts: {}", status.failed_attempts);
            }
            let actions = permissions.actions();
            if !actions.is_empty() {
                println!("  actions:   {}", actions.join(", "));
            }
            Ok(())
        }
        MemberSubcommand::Payments { member_number } => {
            let record = find_member(client, member_number).await?;
            for payment in members::payment_history(client, record.id).await? {
                let amount = payment.amount.map_or_else(String::new, |a| format!("{a:.2}"));
                println!(
                    "{}  {:<10} {:<10} {amount}",
                    members::format_date(payment.created_at),
                    payment.status,
                    payment.payment_type.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
        MemberSubcommand::Notes { member_number } => {
            let record = find_member(client, member_number).await?;
            for note in members::notes(client, record.id).await? {
                println!("{}  {}", members::format_date(note.created_at), note.note_text);
            }
            Ok(())
        }
        MemberSubcommand::AddNote { member_number, text } => {
            let record = find_member(client, member_number).await?;
            members::add_note(client, &permissions, record.id, text).await?;
            println!("note added");
            Ok(())
        }
        MemberSubcommand::RecordPayment { member_number, amount, payment_type } => {
            let record = find_member(client, member_number).await?;
            members::record_payment(client, notifier, &permissions, &record, *amount, payment_type).await?;
            Ok(())
        }
    }
}

async fn find_member(client: &BackendClient, member_number: &str) -> Result<members::Member, CliError> {
    members::fetch_member(client, member_number)
        .await?
        .ok_or_else(|| CliError::MemberNotFound(member_number.to_owned()))
}

async fn run_password(
    cli: &Cli,
    client: &BackendClient,
    notifier: &Arc<dyn Notifier>,
    password: &PasswordCommand,
) -> Result<(), CliError> {
    match &password.command {
        PasswordSubcommand::Forgot { member_number, email, phone } => {
            let form = ForgotPasswordForm::new(member_number, email, phone)?;
            let redirect_to = client.config().reset_redirect_url();
            if forgot_password::submit_forgot_password(client, notifier.as_ref(), &form, &redirect_to).await {
                Ok(())
            } else {
                Err(CliError::Failed)
            }
        }
        PasswordSubcommand::Validate { link } => {
            let link = if link.contains("token=") { link.clone() } else { format!("/reset-password?token={link}") };
            match reset_token::check_reset_link(client, notifier.as_ref(), &link).await {
                LinkState::Valid { .. } => {
                    println!("valid");
                    Ok(())
                }
                LinkState::Invalid => Err(CliError::InvalidLink),
            }
        }
        PasswordSubcommand::Use { token } => {
            let history = History::default();
            reset_token::complete_reset(client, notifier.as_ref(), &history, token).await?;
            Ok(())
        }
        PasswordSubcommand::Generate { member_number } => {
            authorized_context(cli, client, "/system", notifier).await?;
            let token = reset_token::generate_reset_token(client, member_number).await?;
            println!("{token}");
            Ok(())
        }
        PasswordSubcommand::AdminReset { member_number } => {
            let ctx = authorized_context(cli, client, "/users", notifier).await?;
            let permissions = MemberPermissions::for_roles(ctx.roles().roles());
            let record = find_member(client, member_number).await?;
            admin_reset::admin_reset_password(
                client,
                notifier.as_ref(),
                &permissions,
                &record.member_number,
                &record.full_name,
                &RequestOrigin::default(),
            )
            .await?;
            Ok(())
        }
        PasswordSubcommand::Unlock { member_number } => {
            let ctx = authorized_context(cli, client, "/users", notifier).await?;
            let permissions = MemberPermissions::for_roles(ctx.roles().roles());
            admin_reset::unlock_account(client, notifier.as_ref(), &permissions, member_number).await?;
            Ok(())
        }
        PasswordSubcommand::Cleanup => {
            authorized_context(cli, client, "/system", notifier).await?;
            let result = reset_token::cleanup_expired_tokens(client).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}
