use std::path::PathBuf;

use amie_core::{
    AgencyFee, Campaign, CampaignStatus, Category, CreatorPaymentInfo, ManualReview, MatchingRule,
    Money, PaymentMethod, PayoutStatus, RulePattern, RuleTarget, Transaction, TransactionFilter,
    TransactionId, TransactionType,
};
use amie_storage::CollectionStore;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::commands::{self, AppState, CampaignEdit, CampaignInput};
use crate::error::{AppError, Result};

#[derive(Parser)]
#[command(
    name = "amie",
    version,
    about = "Reconciles agency bank statements against campaigns and creator payouts."
)]
pub struct Cli {
    /// Configuration file (default: config.toml in the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a bank statement CSV and match its transactions.
    Import {
        /// Path to the CSV export
        file: PathBuf,
    },
    /// List or delete stored transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Record a reviewer's decision; the matcher never overrides it.
    Verify {
        id: TransactionId,
        #[arg(long)]
        category: Category,
        #[arg(long)]
        campaign: Option<String>,
        #[arg(long)]
        creator: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Reviewer name
        #[arg(long = "by")]
        verified_by: Option<String>,
    },
    /// Re-run matching over every stored transaction.
    Rematch,
    /// Manage matching rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Manage creator payment details.
    Creators {
        #[command(subcommand)]
        command: CreatorsCommands,
    },
    /// Manage brand campaigns.
    Campaigns {
        #[command(subcommand)]
        command: CampaignsCommands,
    },
    /// Show the import audit log.
    Sessions,
    /// Show income, expenses and receivables.
    Summary,
    /// Export or restore all finance data.
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Delete every campaign, transaction, rule, import session and creator record.
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List stored transactions, newest first.
    List {
        /// Case-insensitive text to look for in the description
        #[arg(long)]
        search: Option<String>,
        /// brand_payment, creator_payout, operating_expense, refund, uncategorized
        #[arg(long)]
        category: Option<Category>,
        /// credit or debit
        #[arg(long = "type")]
        transaction_type: Option<TransactionType>,
    },
    /// Delete a transaction by id.
    Remove { id: TransactionId },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules, highest priority first.
    List,
    /// Add a rule.
    Add {
        /// Display name, e.g. 'Adobe subscription'
        name: String,
        /// Text to look for in the raw description
        pattern: String,
        /// Treat the pattern as a regular expression
        #[arg(long)]
        regex: bool,
        /// brand, creator or expense
        #[arg(long)]
        target: RuleTarget,
        #[arg(long)]
        category: Category,
        /// Campaign or creator id to link matches to
        #[arg(long = "entity-id")]
        entity_id: Option<String>,
        #[arg(long = "entity-name")]
        entity_name: Option<String>,
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    /// Add every rule from a TOML file with a [[rules]] array.
    Import { file: PathBuf },
    /// Delete a rule by id.
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum CreatorsCommands {
    /// List creator payment details.
    List,
    /// Add or replace a creator's payment details.
    Add {
        /// Roster id of the creator
        id: String,
        name: String,
        /// zelle, wire, ach or check
        #[arg(long, default_value = "zelle")]
        method: PaymentMethod,
        /// Zelle email/phone or bank reference as it appears on statements
        #[arg(long)]
        handle: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CampaignsCommands {
    /// List campaigns.
    List,
    /// Create a campaign.
    Add {
        /// Brand name as it appears on statements
        brand: String,
        name: String,
        /// Total budget, e.g. 10000.00
        #[arg(long)]
        budget: Decimal,
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,
        /// Agency fee as a percent of the budget
        #[arg(long = "fee-percent", conflicts_with = "fee_flat")]
        fee_percent: Option<Decimal>,
        /// Agency fee as a fixed amount
        #[arg(long = "fee-flat")]
        fee_flat: Option<Decimal>,
        /// Expected payment date: YYYY-MM-DD
        #[arg(long = "expected-payment")]
        expected_payment: Option<NaiveDate>,
        #[arg(long)]
        invoice: Option<String>,
    },
    /// Change fields of a campaign; omitted fields are kept.
    Edit {
        id: String,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        budget: Option<Decimal>,
        #[arg(long = "fee-percent", conflicts_with = "fee_flat")]
        fee_percent: Option<Decimal>,
        #[arg(long = "fee-flat")]
        fee_flat: Option<Decimal>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long = "expected-payment")]
        expected_payment: Option<NaiveDate>,
        /// e.g. 'Net 30'
        #[arg(long)]
        terms: Option<String>,
        #[arg(long)]
        invoice: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Change a campaign's status.
    Status {
        id: String,
        /// draft, active, completed, pending_payment or paid
        status: CampaignStatus,
    },
    /// Delete a campaign.
    Remove { id: String },
    /// Manage a campaign's creator payouts.
    Payout {
        #[command(subcommand)]
        command: PayoutCommands,
    },
}

/// Payouts are numbered from 1 in the order `campaigns list` shows them.
#[derive(Subcommand)]
pub enum PayoutCommands {
    /// Add a pending payout.
    Add {
        campaign: String,
        /// Roster id of the creator
        creator: String,
        amount: Decimal,
        /// Creator name; looked up from creator details or the roster when omitted
        #[arg(long)]
        name: Option<String>,
    },
    /// Mark a payout as paid.
    Paid {
        campaign: String,
        number: usize,
        /// Paid date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// The statement transaction that paid it
        #[arg(long)]
        transaction: Option<TransactionId>,
    },
    /// Mark a payout as pending again.
    Pending { campaign: String, number: usize },
    /// Delete a payout.
    Remove { campaign: String, number: usize },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Write all finance data to a JSON file.
    Export { path: PathBuf },
    /// Load finance data from a JSON backup.
    Restore {
        path: PathBuf,
        /// Also clear collections the backup does not contain
        #[arg(long)]
        replace: bool,
    },
}

fn agency_fee(percent: Option<Decimal>, flat: Option<Decimal>) -> Option<AgencyFee> {
    match (percent, flat) {
        (_, Some(flat)) => Some(AgencyFee::Flat(Money::from_decimal(flat))),
        (Some(percent), None) => Some(AgencyFee::Percentage(percent)),
        (None, None) => None,
    }
}

fn payout_index(campaign: &str, number: usize) -> Result<usize> {
    number
        .checked_sub(1)
        .ok_or_else(|| AppError::NotFound(format!("Payout 0 of campaign {campaign}")))
}

pub async fn run<S: CollectionStore>(command: Commands, state: &AppState<S>) -> Result<()> {
    match command {
        Commands::Import { file } => {
            let summary = commands::import_file(state, &file).await?;
            println!(
                "Imported {}: {} parsed, {} matched, {} new, {} duplicates, {} rejected rows",
                file.display(),
                summary.parsed,
                summary.matched,
                summary.added,
                summary.duplicates,
                summary.rejected
            );
        }
        Commands::Transactions { command } => match command {
            TransactionsCommands::List {
                search,
                category,
                transaction_type,
            } => {
                let filter = TransactionFilter {
                    search,
                    category,
                    transaction_type,
                };
                let transactions = commands::get_transactions(state, &filter).await;
                for tx in &transactions {
                    print_transaction(tx);
                }
                println!("{} transactions", transactions.len());
            }
            TransactionsCommands::Remove { id } => {
                commands::remove_transaction(state, id).await?;
                println!("Removed transaction {id}");
            }
        },
        Commands::Verify {
            id,
            category,
            campaign,
            creator,
            notes,
            verified_by,
        } => {
            let review = ManualReview {
                category,
                campaign_id: campaign,
                creator_id: creator,
                notes,
                verified_by,
            };
            let tx = commands::verify_transaction(state, id, review).await?;
            println!("Verified {} as {}", tx.id, tx.category);
        }
        Commands::Rematch => {
            let changed = commands::rematch(state).await?;
            println!("{changed} transactions changed category");
        }
        Commands::Rules { command } => run_rules(command, state).await?,
        Commands::Creators { command } => match command {
            CreatorsCommands::List => {
                for info in commands::get_creator_payments(state).await {
                    print_creator(&info);
                }
            }
            CreatorsCommands::Add {
                id,
                name,
                method,
                handle,
                notes,
            } => {
                let info = CreatorPaymentInfo {
                    creator_id: id,
                    creator_name: name,
                    payment_method: method,
                    payment_handle: handle,
                    notes,
                };
                commands::add_creator_payment(state, info.clone()).await?;
                print_creator(&info);
            }
        },
        Commands::Campaigns { command } => run_campaigns(command, state).await?,
        Commands::Sessions => {
            for session in commands::get_import_sessions(state).await {
                let range = session
                    .date_range
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {}  {}  {} rows ({} matched, {} unmatched, {} new, {} rejected)  {}",
                    session.imported_at.format("%Y-%m-%d %H:%M"),
                    session.id,
                    session.filename,
                    session.transaction_count,
                    session.matched_count,
                    session.unmatched_count,
                    session.new_count,
                    session.rejected_rows,
                    range
                );
            }
        }
        Commands::Summary => {
            let summary = commands::get_summary(state).await;
            println!("Income:              {}", summary.total_income);
            println!("Expenses:            {}", summary.total_expenses);
            println!("Net cash flow:       {}", summary.net_cash_flow);
            println!("Brand payments:      {}", summary.brand_payments);
            println!("Creator payouts:     {}", summary.creator_payouts);
            println!("Operating expenses:  {}", summary.operating_expenses);
            println!("Pending receivables: {}", summary.pending_receivables);
            println!("Unmatched:           {}", summary.unmatched_count);
            if !summary.recent.is_empty() {
                println!("\nRecent:");
                for tx in &summary.recent {
                    print_transaction(tx);
                }
            }
        }
        Commands::Backup { command } => match command {
            BackupCommands::Export { path } => {
                commands::export_backup(state, &path).await?;
                println!("Backup written to {}", path.display());
            }
            BackupCommands::Restore { path, replace } => {
                commands::restore_backup(state, &path, replace).await?;
                println!("Restored backup from {}", path.display());
            }
        },
        Commands::Reset { yes } => {
            if yes {
                commands::reset(state).await?;
                println!("All finance data deleted");
            } else {
                println!("Nothing deleted; pass --yes to delete all finance data");
            }
        }
    }
    Ok(())
}

async fn run_campaigns<S: CollectionStore>(command: CampaignsCommands, state: &AppState<S>) -> Result<()> {
    let campaign = match command {
        CampaignsCommands::List => {
            for campaign in commands::get_campaigns(state).await {
                print_campaign(&campaign);
            }
            return Ok(());
        }
        CampaignsCommands::Add {
            brand,
            name,
            budget,
            start,
            fee_percent,
            fee_flat,
            expected_payment,
            invoice,
        } => {
            let input = CampaignInput {
                brand_name: brand,
                campaign_name: name,
                total_budget: budget,
                start_date: start,
                agency_fee: agency_fee(fee_percent, fee_flat),
                expected_payment_date: expected_payment,
                invoice_number: invoice,
            };
            commands::create_campaign(state, input).await?
        }
        CampaignsCommands::Edit {
            id,
            brand,
            name,
            description,
            budget,
            fee_percent,
            fee_flat,
            start,
            end,
            expected_payment,
            terms,
            invoice,
            notes,
        } => {
            let edit = CampaignEdit {
                brand_name: brand,
                campaign_name: name,
                description,
                total_budget: budget,
                agency_fee: agency_fee(fee_percent, fee_flat),
                start_date: start,
                end_date: end,
                expected_payment_date: expected_payment,
                payment_terms: terms,
                invoice_number: invoice,
                notes,
            };
            commands::edit_campaign(state, &id, edit).await?
        }
        CampaignsCommands::Status { id, status } => {
            commands::set_campaign_status(state, &id, status).await?
        }
        CampaignsCommands::Remove { id } => {
            commands::remove_campaign(state, &id).await?;
            println!("Removed campaign {id}");
            return Ok(());
        }
        CampaignsCommands::Payout { command } => match command {
            PayoutCommands::Add {
                campaign,
                creator,
                amount,
                name,
            } => commands::add_payout(state, &campaign, &creator, name, amount).await?,
            PayoutCommands::Paid {
                campaign,
                number,
                date,
                transaction,
            } => {
                let index = payout_index(&campaign, number)?;
                let date = date.unwrap_or_else(|| Utc::now().date_naive());
                commands::mark_payout_paid(state, &campaign, index, date, transaction).await?
            }
            PayoutCommands::Pending { campaign, number } => {
                let index = payout_index(&campaign, number)?;
                commands::mark_payout_pending(state, &campaign, index).await?
            }
            PayoutCommands::Remove { campaign, number } => {
                let index = payout_index(&campaign, number)?;
                commands::remove_payout(state, &campaign, index).await?
            }
        },
    };
    print_campaign(&campaign);
    Ok(())
}

async fn run_rules<S: CollectionStore>(command: RulesCommands, state: &AppState<S>) -> Result<()> {
    match command {
        RulesCommands::List => {
            for rule in commands::get_rules(state).await {
                print_rule(&rule);
            }
        }
        RulesCommands::Add {
            name,
            pattern,
            regex,
            target,
            category,
            entity_id,
            entity_name,
            priority,
        } => {
            let pattern = if regex {
                RulePattern::Regex(pattern)
            } else {
                RulePattern::Literal(pattern)
            };
            let rule = MatchingRule {
                id: commands::new_rule_id(),
                name,
                pattern,
                target,
                entity_id,
                entity_name,
                category,
                priority,
                is_active: true,
                created_at: Utc::now(),
            };
            let rule = commands::add_rule(state, rule).await?;
            print_rule(&rule);
        }
        RulesCommands::Import { file } => {
            let count = commands::import_rules(state, &file).await?;
            println!("Imported {count} rules from {}", file.display());
        }
        RulesCommands::Remove { id } => {
            commands::remove_rule(state, &id).await?;
            println!("Removed rule {id}");
        }
    }
    Ok(())
}

fn print_transaction(tx: &Transaction) {
    println!(
        "{}  {:<6} {:>12}  {:<17} {:>3}% {:<6}  {}  [{}]",
        tx.date.format("%m/%d/%Y"),
        tx.transaction_type.to_string(),
        tx.amount.to_string(),
        tx.category.to_string(),
        tx.match_confidence,
        tx.effective_confidence_level().to_string(),
        tx.description,
        tx.id
    );
    if let Some(reason) = &tx.match_reason {
        println!("    {reason}");
    }
}

fn print_rule(rule: &MatchingRule) {
    let state = if rule.is_active { "" } else { " (inactive)" };
    println!(
        "{:>4}  {}  {} -> {} [{}]  {}{}",
        rule.priority, rule.id, rule.pattern, rule.category, rule.target, rule.name, state
    );
}

fn print_creator(info: &CreatorPaymentInfo) {
    println!(
        "{}  {}  {}  {}",
        info.creator_id,
        info.creator_name,
        info.payment_method,
        info.payment_handle.as_deref().unwrap_or("-")
    );
}

fn print_campaign(campaign: &Campaign) {
    println!(
        "{}  {} / {}  {}  budget {}  fee {}  remaining {}",
        campaign.id,
        campaign.brand_name,
        campaign.campaign_name,
        campaign.status,
        campaign.total_budget,
        campaign.agency_fee_amount(),
        campaign.remaining()
    );
    for (n, payout) in campaign.creator_payouts.iter().enumerate() {
        let status = match (payout.status, payout.paid_date) {
            (PayoutStatus::Paid, Some(date)) => format!("paid {date}"),
            (PayoutStatus::Paid, None) => "paid".to_string(),
            (PayoutStatus::Pending, _) => "pending".to_string(),
        };
        println!(
            "    {}. {} ({})  {}  {}",
            n + 1,
            payout.creator_name,
            payout.creator_id,
            payout.amount,
            status
        );
    }
}
