//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `login` / `register` -- account access
//! - `pair` -- run a device-pairing session to completion
//! - `session delete` -- tear down the backend pairing session
//! - `bot status|activate|deactivate|response` -- assistant controls
//! - `groups list|toggle` -- monitored-group management
//! - `referral generate|stats|verify` -- referral program
//! - `withdrawal balance|request|history` -- commission payout
//! - `admin withdrawals|approve|reject` -- privileged withdrawal review
//! - `payment create` -- subscription checkout link
//! - `version` -- print build/version info

use clap::{Parser, Subcommand};

/// Bot das Entregas client.
#[derive(Parser, Debug)]
#[command(
    name = "entregas",
    version = env!("CARGO_PKG_VERSION"),
    about = "Headless client for the Bot das Entregas WhatsApp delivery assistant"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session credential.
    Login {
        email: String,
        password: String,
    },

    /// Create a new account.
    Register {
        email: String,
        password: String,
    },

    /// Pair a WhatsApp device, printing the pairing code when it arrives.
    Pair,

    /// Manage the backend pairing session.
    #[command(subcommand)]
    Session(SessionCommand),

    /// Assistant controls.
    #[command(subcommand)]
    Bot(BotCommand),

    /// Monitored-group management.
    #[command(subcommand)]
    Groups(GroupsCommand),

    /// Referral program.
    #[command(subcommand)]
    Referral(ReferralCommand),

    /// Commission withdrawal.
    #[command(subcommand)]
    Withdrawal(WithdrawalCommand),

    /// Privileged withdrawal review (requires the admin API key).
    #[command(subcommand)]
    Admin(AdminCommand),

    /// Subscription checkout.
    #[command(subcommand)]
    Payment(PaymentCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Delete the backend-side pairing session.
    Delete,
}

#[derive(Subcommand, Debug)]
pub enum BotCommand {
    /// Show payment, connection and activity status.
    Status,

    /// Turn the assistant on.
    Activate,

    /// Turn the assistant off.
    Deactivate,

    /// Store the canned reply sent for the trigger word.
    Response {
        /// Reply text.
        text: String,

        /// Trigger word the reply is bound to.
        #[arg(long, default_value = "default")]
        trigger: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupsCommand {
    /// List monitored groups.
    List,

    /// Toggle monitoring for one group by conversation id.
    Toggle {
        conversation_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReferralCommand {
    /// Generate (or fetch) this account's referral code.
    Generate,

    /// Show referral usage and earnings.
    Stats,

    /// Check whether a referral code is valid.
    Verify {
        code: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum WithdrawalCommand {
    /// Show the balance available for withdrawal.
    Balance,

    /// Request withdrawal of the full available balance to a PIX key.
    Request {
        pix_key: String,
    },

    /// Show this account's withdrawal history.
    History,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// List withdrawals across all accounts.
    Withdrawals,

    /// Approve one pending withdrawal.
    Approve {
        withdrawal_id: String,
    },

    /// Reject one pending withdrawal with a reason.
    Reject {
        withdrawal_id: String,
        reason: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PaymentCommand {
    /// Create a checkout and print the payment link.
    Create {
        /// Referral code for the 10% discount.
        #[arg(long)]
        referral_code: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

use crate::api::account::AccountApi;
use crate::api::bot::BotApi;
use crate::api::payments::{self, PaymentsApi};
use crate::api::referral::ReferralApi;
use crate::api::withdrawal::{AdminWithdrawalApi, ReviewDecision, WithdrawalApi};
use crate::api::ApiClient;
use crate::auth::{AuthContext, TokenStore};
use crate::config::Config;
use crate::events::EventChannel;
use crate::flow::{self, Destination};
use crate::groups::GroupMonitorList;
use crate::pairing::{PairingNotice, PairingSynchronizer};
use crate::withdrawals::WithdrawalLedger;
use std::sync::Arc;

type HandlerResult = Result<(), Box<dyn std::error::Error>>;

/// Dispatch a parsed invocation.
pub async fn run(cli: Cli, config: &Config) -> HandlerResult {
    let tokens = Arc::new(TokenStore::new(config.state_dir()?));

    match cli.command {
        Command::Login { email, password } => handle_login(config, &tokens, &email, &password).await,
        Command::Register { email, password } => {
            handle_register(config, &tokens, &email, &password).await
        }
        Command::Pair => handle_pair(config, &tokens).await,
        Command::Session(SessionCommand::Delete) => handle_session_delete(config, &tokens).await,
        Command::Bot(command) => handle_bot(config, &tokens, command).await,
        Command::Groups(command) => handle_groups(config, &tokens, command).await,
        Command::Referral(command) => handle_referral(config, &tokens, command).await,
        Command::Withdrawal(command) => handle_withdrawal(config, &tokens, command).await,
        Command::Admin(command) => handle_admin(config, command).await,
        Command::Payment(command) => handle_payment(config, &tokens, command).await,
        Command::Version => {
            handle_version();
            Ok(())
        }
    }
}

fn primary_client(config: &Config, tokens: &Arc<TokenStore>) -> crate::api::Result<ApiClient> {
    ApiClient::new(config.api_base_url.clone(), tokens.clone())
}

fn pairing_client(config: &Config, tokens: &Arc<TokenStore>) -> crate::api::Result<ApiClient> {
    ApiClient::new(config.pairing_base_url().clone(), tokens.clone())
}

fn bot_api(config: &Config, tokens: &Arc<TokenStore>) -> Result<BotApi, Box<dyn std::error::Error>> {
    let auth = AuthContext::from_store(tokens)?;
    Ok(BotApi::new(pairing_client(config, tokens)?, auth))
}

/// Run the `login` subcommand.
async fn handle_login(
    config: &Config,
    tokens: &Arc<TokenStore>,
    email: &str,
    password: &str,
) -> HandlerResult {
    let account = AccountApi::new(primary_client(config, tokens)?);
    let token = account.login(email, password).await?;
    tokens.save(&token)?;
    println!("Logged in as {}", email);

    // Mirror the post-login routing so the user knows what comes next.
    let bot = bot_api(config, tokens)?;
    let payment = bot.check_payment_status().await?;
    let connection = bot.connection_status().await.ok();
    match flow::post_login_destination(payment, connection) {
        Destination::Payment => {
            println!("Subscription unpaid. Run `entregas payment create` to get the checkout link.")
        }
        Destination::Connect => {
            println!("No device connected. Run `entregas pair` to pair your WhatsApp.")
        }
        Destination::Assistant => println!("Device connected. The assistant is ready."),
    }
    Ok(())
}

/// Run the `register` subcommand.
async fn handle_register(
    config: &Config,
    tokens: &Arc<TokenStore>,
    email: &str,
    password: &str,
) -> HandlerResult {
    let account = AccountApi::new(primary_client(config, tokens)?);
    let message = account.register(email, password).await?;
    println!(
        "{}",
        message.unwrap_or_else(|| "Account created. Log in to continue.".to_string())
    );
    Ok(())
}

/// Run the `pair` subcommand: start a session and pump notices and channel
/// events until the session reaches a terminal outcome.
async fn handle_pair(config: &Config, tokens: &Arc<TokenStore>) -> HandlerResult {
    let bot = bot_api(config, tokens)?;
    let owner_id = bot.auth().owner_id().to_string();

    let channel = EventChannel::connect(config.socket_url()?, owner_id.clone()).await?;
    let (mut sync, mut notices) = PairingSynchronizer::new(owner_id, bot, channel);
    sync.start().await?;

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Some(PairingNotice::ArtifactReady(code)) => {
                    println!("Pairing code (open WhatsApp > Linked Devices and scan):");
                    println!("{code}");
                }
                Some(PairingNotice::AwaitingConnection) => {
                    println!("Waiting for the pairing code...");
                }
                Some(PairingNotice::Connected { already_running }) => {
                    if already_running {
                        println!("Device was already connected.");
                    } else {
                        println!("Device connected.");
                    }
                }
                Some(PairingNotice::Navigate) => {
                    println!("All set. The assistant is ready.");
                    break;
                }
                Some(PairingNotice::LimitReached(message)) => {
                    eprintln!("{message}");
                    eprintln!("Run `entregas session delete` before trying again.");
                    break;
                }
                Some(PairingNotice::Failed(message)) => {
                    eprintln!("Pairing failed: {message}");
                    break;
                }
                Some(PairingNotice::SessionCleared) | None => break,
            },
            event = sync.next_event() => match event {
                Some(event) => sync.apply_event(&event),
                None => {
                    eprintln!("Event channel closed before pairing finished.");
                    break;
                }
            },
        }
    }
    Ok(())
}

/// Run the `session delete` subcommand.
async fn handle_session_delete(config: &Config, tokens: &Arc<TokenStore>) -> HandlerResult {
    bot_api(config, tokens)?.delete_session().await?;
    println!("Pairing session deleted.");
    Ok(())
}

/// Run the `bot` subcommands.
async fn handle_bot(config: &Config, tokens: &Arc<TokenStore>, command: BotCommand) -> HandlerResult {
    let bot = bot_api(config, tokens)?;
    match command {
        BotCommand::Status => {
            let payment = bot.check_payment_status().await?;
            println!("Payment:    {payment:?}");
            let connection = bot.connection_status().await?;
            println!("Connection: {connection:?}");
            if connection.is_connected() {
                let activity = bot.activity_status().await?;
                println!("Assistant:  {}", if activity.is_connected() { "active" } else { "inactive" });
            }
        }
        BotCommand::Activate => {
            let message = bot.activate().await?;
            println!("{}", message.unwrap_or_else(|| "Assistant activated.".to_string()));
        }
        BotCommand::Deactivate => {
            let message = bot.deactivate().await?;
            println!("{}", message.unwrap_or_else(|| "Assistant deactivated.".to_string()));
        }
        BotCommand::Response { text, trigger } => {
            bot.save_response(&trigger, &text).await?;
            println!("Reply saved for trigger \"{trigger}\".");
        }
    }
    Ok(())
}

/// Run the `groups` subcommands.
async fn handle_groups(
    config: &Config,
    tokens: &Arc<TokenStore>,
    command: GroupsCommand,
) -> HandlerResult {
    let mut list = GroupMonitorList::new(bot_api(config, tokens)?);
    list.refresh().await?;
    match command {
        GroupsCommand::List => {
            if list.groups().is_empty() {
                println!("No groups found. Add the bot to a WhatsApp group first.");
            }
            for group in list.groups() {
                let marker = if group.enabled { "on " } else { "off" };
                println!("[{marker}] {}  {}", group.conversation_id, group.name);
            }
        }
        GroupsCommand::Toggle { conversation_id } => {
            let enabled = list.toggle(&conversation_id).await?;
            println!(
                "Monitoring {} for {conversation_id}.",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }
    Ok(())
}

/// Run the `referral` subcommands.
async fn handle_referral(
    config: &Config,
    tokens: &Arc<TokenStore>,
    command: ReferralCommand,
) -> HandlerResult {
    let auth = AuthContext::from_store(tokens)?;
    let referral = ReferralApi::new(primary_client(config, tokens)?, auth);
    match command {
        ReferralCommand::Generate => {
            let generated = referral.generate().await?;
            println!("Referral code: {}", generated.code);
            if let Some(message) = generated.message {
                println!("{message}");
            }
        }
        ReferralCommand::Stats => {
            let stats = referral.stats().await?;
            println!("Uses:     {}", stats.uses);
            println!("Earnings: R${:.2}", stats.earnings());
        }
        ReferralCommand::Verify { code } => {
            if referral.verify(&code).await? {
                println!("Code is valid.");
            } else {
                println!("Code is not valid.");
            }
        }
    }
    Ok(())
}

/// Run the `withdrawal` subcommands.
async fn handle_withdrawal(
    config: &Config,
    tokens: &Arc<TokenStore>,
    command: WithdrawalCommand,
) -> HandlerResult {
    let auth = AuthContext::from_store(tokens)?;
    let api = WithdrawalApi::new(primary_client(config, tokens)?, auth);
    match command {
        WithdrawalCommand::Balance => {
            let balance = api.available_balance().await?;
            println!("Available: R${balance:.2}");
        }
        WithdrawalCommand::Request { pix_key } => {
            let mut ledger = WithdrawalLedger::new(api);
            let amount = ledger.submit(&pix_key).await?;
            println!("Withdrawal of R${amount:.2} requested to {pix_key}.");
        }
        WithdrawalCommand::History => {
            for record in api.history().await? {
                let reason = record
                    .rejection_reason
                    .map(|r| format!("  ({r})"))
                    .unwrap_or_default();
                println!(
                    "{}  R${:.2}  {:?}{}",
                    record.created_at.format("%Y-%m-%d"),
                    record.amount,
                    record.status,
                    reason
                );
            }
        }
    }
    Ok(())
}

/// Run the `admin` subcommands.
async fn handle_admin(config: &Config, command: AdminCommand) -> HandlerResult {
    let api_key = config
        .admin_api_key
        .as_deref()
        .ok_or("adminApiKey is not set in the configuration")?;
    let admin = AdminWithdrawalApi::new(config.api_base_url.clone(), api_key)?;
    match command {
        AdminCommand::Withdrawals => {
            for record in admin.withdrawals().await? {
                println!(
                    "{}  {}  R${:.2}  {:?}  {}",
                    record.id.as_deref().unwrap_or("-"),
                    record.created_at.format("%Y-%m-%d"),
                    record.amount,
                    record.status,
                    record.pix_key.as_deref().unwrap_or("-")
                );
            }
        }
        AdminCommand::Approve { withdrawal_id } => {
            admin.review(&withdrawal_id, ReviewDecision::Approve).await?;
            println!("Withdrawal {withdrawal_id} approved.");
        }
        AdminCommand::Reject { withdrawal_id, reason } => {
            admin
                .review(&withdrawal_id, ReviewDecision::Reject { reason })
                .await?;
            println!("Withdrawal {withdrawal_id} rejected.");
        }
    }
    Ok(())
}

/// Run the `payment create` subcommand.
async fn handle_payment(
    config: &Config,
    tokens: &Arc<TokenStore>,
    command: PaymentCommand,
) -> HandlerResult {
    let PaymentCommand::Create { referral_code } = command;
    let auth = AuthContext::from_store(tokens)?;

    let referral = ReferralApi::new(primary_client(config, tokens)?, auth.clone());
    let code_valid = match referral_code.as_deref() {
        Some(code) => referral.verify(code).await?,
        None => false,
    };
    if referral_code.is_some() && !code_valid {
        eprintln!("Referral code is not valid; checking out without the discount.");
    }

    let quote = payments::quote(code_valid);
    println!("Price:    R${:.2} (was R${:.2})", quote.base, quote.original);
    if quote.discount > 0.0 {
        println!("Discount: R${:.2}", quote.discount);
    }
    println!("Total:    R${:.2}", quote.total);

    let api = PaymentsApi::new(primary_client(config, tokens)?, auth);
    let link = api
        .create_payment(referral_code.as_deref().filter(|_| code_valid))
        .await?;
    println!("Pay here: {link}");
    Ok(())
}

/// Run the `version` subcommand.
fn handle_version() {
    println!("entregas {}", env!("CARGO_PKG_VERSION"));
    println!("  Build date: {}", env!("ENTREGAS_BUILD_DATE"));
    println!("  Git commit: {}", env!("ENTREGAS_GIT_HASH"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_login() {
        let cli = Cli::try_parse_from(["entregas", "login", "a@b.com", "pw"]).unwrap();
        match cli.command {
            Command::Login { ref email, ref password } => {
                assert_eq!(email, "a@b.com");
                assert_eq!(password, "pw");
            }
            other => panic!("Expected Login, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_pair() {
        let cli = Cli::try_parse_from(["entregas", "pair"]).unwrap();
        assert!(matches!(cli.command, Command::Pair));
    }

    #[test]
    fn test_cli_session_delete() {
        let cli = Cli::try_parse_from(["entregas", "session", "delete"]).unwrap();
        assert!(matches!(cli.command, Command::Session(SessionCommand::Delete)));
    }

    #[test]
    fn test_cli_bot_response_default_trigger() {
        let cli = Cli::try_parse_from(["entregas", "bot", "response", "Chegando!"]).unwrap();
        match cli.command {
            Command::Bot(BotCommand::Response { ref text, ref trigger }) => {
                assert_eq!(text, "Chegando!");
                assert_eq!(trigger, "default");
            }
            other => panic!("Expected Bot(Response), got {:?}", other),
        }
    }

    #[test]
    fn test_cli_groups_toggle() {
        let cli = Cli::try_parse_from(["entregas", "groups", "toggle", "123@g.us"]).unwrap();
        match cli.command {
            Command::Groups(GroupsCommand::Toggle { ref conversation_id }) => {
                assert_eq!(conversation_id, "123@g.us");
            }
            other => panic!("Expected Groups(Toggle), got {:?}", other),
        }
    }

    #[test]
    fn test_cli_withdrawal_request() {
        let cli = Cli::try_parse_from(["entregas", "withdrawal", "request", "a@b.com"]).unwrap();
        match cli.command {
            Command::Withdrawal(WithdrawalCommand::Request { ref pix_key }) => {
                assert_eq!(pix_key, "a@b.com");
            }
            other => panic!("Expected Withdrawal(Request), got {:?}", other),
        }
    }

    #[test]
    fn test_cli_admin_reject_requires_reason() {
        assert!(Cli::try_parse_from(["entregas", "admin", "reject", "66a1"]).is_err());
        let cli =
            Cli::try_parse_from(["entregas", "admin", "reject", "66a1", "Chave inválida"]).unwrap();
        match cli.command {
            Command::Admin(AdminCommand::Reject { ref withdrawal_id, ref reason }) => {
                assert_eq!(withdrawal_id, "66a1");
                assert_eq!(reason, "Chave inválida");
            }
            other => panic!("Expected Admin(Reject), got {:?}", other),
        }
    }

    #[test]
    fn test_cli_payment_create_with_code() {
        let cli = Cli::try_parse_from([
            "entregas", "payment", "create", "--referral-code", "ABC123",
        ])
        .unwrap();
        match cli.command {
            Command::Payment(PaymentCommand::Create { ref referral_code }) => {
                assert_eq!(referral_code.as_deref(), Some("ABC123"));
            }
            other => panic!("Expected Payment(Create), got {:?}", other),
        }
    }

    #[test]
    fn test_cli_version() {
        let cli = Cli::try_parse_from(["entregas", "version"]).unwrap();
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["entregas"]).is_err());
    }
}
