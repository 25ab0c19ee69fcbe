use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;
use super::transaction::TransactionId;

/// Lifecycle of a brand engagement. Set by people, never derived by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Completed,
    PendingPayment,
    Paid,
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Active => write!(f, "active"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::PendingPayment => write!(f, "pending_payment"),
            CampaignStatus::Paid => write!(f, "paid"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(CampaignStatus::Draft),
            "active" => Ok(CampaignStatus::Active),
            "completed" => Ok(CampaignStatus::Completed),
            "pending_payment" => Ok(CampaignStatus::PendingPayment),
            "paid" => Ok(CampaignStatus::Paid),
            other => Err(format!("Unknown campaign status: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AgencyFee {
    /// Percent of the total budget, e.g. `20` for 20%.
    Percentage(Decimal),
    Flat(Money),
}

impl Default for AgencyFee {
    fn default() -> Self {
        AgencyFee::Percentage(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    #[default]
    Pending,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorPayout {
    pub creator_id: String,
    pub creator_name: String,
    pub amount: Money,
    pub status: PayoutStatus,
    pub paid_date: Option<NaiveDate>,
    pub transaction_id: Option<TransactionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub brand_name: String,
    pub campaign_name: String,
    pub description: Option<String>,
    pub total_budget: Money,
    pub agency_fee: AgencyFee,
    pub creator_payouts: Vec<CreatorPayout>,
    pub status: CampaignStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub expected_payment_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(
        id: &str,
        brand_name: &str,
        campaign_name: &str,
        total_budget: Money,
        start_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Campaign {
            id: id.to_string(),
            brand_name: brand_name.to_string(),
            campaign_name: campaign_name.to_string(),
            description: None,
            total_budget,
            agency_fee: AgencyFee::default(),
            creator_payouts: Vec::new(),
            status: CampaignStatus::Draft,
            start_date,
            end_date: None,
            expected_payment_date: None,
            payment_terms: None,
            invoice_number: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn agency_fee_amount(&self) -> Money {
        match self.agency_fee {
            AgencyFee::Percentage(pct) => {
                Money::from_decimal(self.total_budget.as_decimal() * pct / Decimal::ONE_HUNDRED)
            }
            AgencyFee::Flat(amount) => amount,
        }
    }

    pub fn creator_total(&self) -> Money {
        self.creator_payouts.iter().map(|p| p.amount).sum()
    }

    /// Budget left after the agency fee and every creator payout.
    pub fn remaining(&self) -> Money {
        self.total_budget - self.agency_fee_amount() - self.creator_total()
    }

    pub fn add_payout(&mut self, creator_id: &str, creator_name: &str, amount: Money) {
        self.creator_payouts.push(CreatorPayout {
            creator_id: creator_id.to_string(),
            creator_name: creator_name.to_string(),
            amount,
            status: PayoutStatus::Pending,
            paid_date: None,
            transaction_id: None,
        });
    }

    /// `None` if there is no payout at `index`.
    pub fn mark_payout_paid(
        &mut self,
        index: usize,
        paid_date: NaiveDate,
        transaction_id: Option<TransactionId>,
    ) -> Option<&CreatorPayout> {
        let payout = self.creator_payouts.get_mut(index)?;
        payout.status = PayoutStatus::Paid;
        payout.paid_date = Some(paid_date);
        payout.transaction_id = transaction_id;
        Some(payout)
    }

    /// Reopens a payout, dropping its paid date and linked transaction.
    pub fn mark_payout_pending(&mut self, index: usize) -> Option<&CreatorPayout> {
        let payout = self.creator_payouts.get_mut(index)?;
        payout.status = PayoutStatus::Pending;
        payout.paid_date = None;
        payout.transaction_id = None;
        Some(payout)
    }

    pub fn remove_payout(&mut self, index: usize) -> Option<CreatorPayout> {
        (index < self.creator_payouts.len()).then(|| self.creator_payouts.remove(index))
    }

    /// Money the brand still owes: active work or an issued invoice.
    pub fn is_receivable(&self) -> bool {
        matches!(self.status, CampaignStatus::Active | CampaignStatus::PendingPayment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(budget_cents: i64, fee: AgencyFee) -> Campaign {
        let mut c = Campaign::new(
            "camp_1",
            "Nike",
            "Spring drop",
            Money::from_cents(budget_cents),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Utc::now(),
        );
        c.agency_fee = fee;
        c
    }

    fn payout(id: &str, cents: i64) -> CreatorPayout {
        CreatorPayout {
            creator_id: id.to_string(),
            creator_name: id.to_string(),
            amount: Money::from_cents(cents),
            status: PayoutStatus::Pending,
            paid_date: None,
            transaction_id: None,
        }
    }

    #[test]
    fn percentage_fee_is_share_of_budget() {
        let c = campaign(1_000_000, AgencyFee::Percentage(Decimal::from(20)));
        assert_eq!(c.agency_fee_amount(), Money::from_cents(200_000));
    }

    #[test]
    fn flat_fee_is_taken_as_is() {
        let c = campaign(1_000_000, AgencyFee::Flat(Money::from_cents(150_000)));
        assert_eq!(c.agency_fee_amount(), Money::from_cents(150_000));
    }

    #[test]
    fn remaining_subtracts_fee_and_payouts() {
        let mut c = campaign(1_000_000, AgencyFee::Percentage(Decimal::from(20)));
        c.creator_payouts = vec![payout("helen", 300_000), payout("kai", 250_000)];
        assert_eq!(c.creator_total(), Money::from_cents(550_000));
        assert_eq!(c.remaining(), Money::from_cents(250_000));
    }

    #[test]
    fn payout_lifecycle() {
        let mut c = campaign(1_000_000, AgencyFee::Flat(Money::from_cents(100_000)));
        c.add_payout("helen", "Helen Park", Money::from_cents(300_000));
        c.add_payout("kai", "Kai Ito", Money::from_cents(200_000));
        assert_eq!(c.remaining(), Money::from_cents(400_000));

        let tx = TransactionId::new();
        let paid_on = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let paid = c.mark_payout_paid(1, paid_on, Some(tx)).unwrap();
        assert_eq!(paid.status, PayoutStatus::Paid);
        assert_eq!(paid.paid_date, Some(paid_on));
        assert_eq!(paid.transaction_id, Some(tx));
        assert!(c.mark_payout_paid(2, paid_on, None).is_none());

        let reopened = c.mark_payout_pending(1).unwrap();
        assert_eq!(reopened.status, PayoutStatus::Pending);
        assert!(reopened.paid_date.is_none());
        assert!(reopened.transaction_id.is_none());

        assert_eq!(c.remove_payout(0).unwrap().creator_id, "helen");
        assert!(c.remove_payout(1).is_none());
        assert_eq!(c.creator_total(), Money::from_cents(200_000));
    }

    #[test]
    fn receivable_statuses() {
        let mut c = campaign(100, AgencyFee::default());
        assert!(!c.is_receivable());
        c.status = CampaignStatus::Active;
        assert!(c.is_receivable());
        c.status = CampaignStatus::PendingPayment;
        assert!(c.is_receivable());
        c.status = CampaignStatus::Paid;
        assert!(!c.is_receivable());
    }

    #[test]
    fn agency_fee_serializes_tagged() {
        let json = serde_json::to_value(AgencyFee::Flat(Money::from_cents(5000))).unwrap();
        assert_eq!(json["type"], "flat");
    }
}
