use serde::{Deserialize, Serialize};

use super::campaign::Campaign;
use super::money::Money;
use super::transaction::{Category, Transaction};

const RECENT_LIMIT: usize = 5;

/// Dashboard totals over everything currently stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceSummary {
    pub total_income: Money,
    pub total_expenses: Money,
    pub net_cash_flow: Money,
    pub brand_payments: Money,
    pub creator_payouts: Money,
    pub operating_expenses: Money,
    pub pending_receivables: Money,
    pub unmatched_count: usize,
    pub recent: Vec<Transaction>,
}

impl FinanceSummary {
    pub fn compute(transactions: &[Transaction], campaigns: &[Campaign]) -> Self {
        let total_income: Money = transactions
            .iter()
            .filter(|t| t.is_credit())
            .map(|t| t.amount)
            .sum();
        let total_expenses: Money = transactions
            .iter()
            .filter(|t| t.is_debit())
            .map(|t| t.amount)
            .sum();
        let by_category = |category: Category| -> Money {
            transactions
                .iter()
                .filter(|t| t.category == category)
                .map(|t| t.amount)
                .sum()
        };

        let mut recent: Vec<Transaction> = transactions.to_vec();
        recent.sort_by(|a, b| b.date.cmp(&a.date));
        recent.truncate(RECENT_LIMIT);

        FinanceSummary {
            total_income,
            total_expenses,
            net_cash_flow: total_income - total_expenses,
            brand_payments: by_category(Category::BrandPayment),
            creator_payouts: by_category(Category::CreatorPayout),
            operating_expenses: by_category(Category::OperatingExpense),
            pending_receivables: campaigns
                .iter()
                .filter(|c| c.is_receivable())
                .map(|c| c.total_budget)
                .sum(),
            unmatched_count: transactions
                .iter()
                .filter(|t| t.category == Category::Uncategorized)
                .count(),
            recent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignStatus;
    use crate::transaction::TransactionType;
    use chrono::{NaiveDate, Utc};

    fn tx(day: u32, cents: i64, kind: TransactionType, category: Category) -> Transaction {
        let mut t = Transaction::new(
            NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            format!("TX {day}"),
            format!("TX {day}"),
            Money::from_cents(cents),
            kind,
            Utc::now(),
        );
        t.category = category;
        t
    }

    #[test]
    fn totals_by_direction_and_category() {
        let txs = vec![
            tx(1, 1_000_000, TransactionType::Credit, Category::BrandPayment),
            tx(2, 300_000, TransactionType::Debit, Category::CreatorPayout),
            tx(3, 5_000, TransactionType::Debit, Category::OperatingExpense),
            tx(4, 2_000, TransactionType::Debit, Category::Uncategorized),
        ];
        let summary = FinanceSummary::compute(&txs, &[]);
        assert_eq!(summary.total_income, Money::from_cents(1_000_000));
        assert_eq!(summary.total_expenses, Money::from_cents(307_000));
        assert_eq!(summary.net_cash_flow, Money::from_cents(693_000));
        assert_eq!(summary.brand_payments, Money::from_cents(1_000_000));
        assert_eq!(summary.creator_payouts, Money::from_cents(300_000));
        assert_eq!(summary.operating_expenses, Money::from_cents(5_000));
        assert_eq!(summary.unmatched_count, 1);
    }

    #[test]
    fn pending_receivables_from_open_campaigns() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut active = Campaign::new("a", "Nike", "Run", Money::from_cents(500_000), start, Utc::now());
        active.status = CampaignStatus::Active;
        let mut invoiced = Campaign::new("b", "Glossier", "Glow", Money::from_cents(200_000), start, Utc::now());
        invoiced.status = CampaignStatus::PendingPayment;
        let mut paid = Campaign::new("c", "Adidas", "Go", Money::from_cents(900_000), start, Utc::now());
        paid.status = CampaignStatus::Paid;

        let summary = FinanceSummary::compute(&[], &[active, invoiced, paid]);
        assert_eq!(summary.pending_receivables, Money::from_cents(700_000));
        assert!(summary.recent.is_empty());
    }

    #[test]
    fn recent_is_newest_five() {
        let txs: Vec<_> = (1..=8)
            .map(|d| tx(d, 100, TransactionType::Debit, Category::Uncategorized))
            .collect();
        let summary = FinanceSummary::compute(&txs, &[]);
        let days: Vec<u32> = summary.recent.iter().map(|t| chrono::Datelike::day(&t.date)).collect();
        assert_eq!(days, vec![8, 7, 6, 5, 4]);
    }
}
