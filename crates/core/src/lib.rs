pub mod campaign;
pub mod creator;
pub mod money;
pub mod period;
pub mod rule;
pub mod session;
pub mod summary;
pub mod transaction;

pub use campaign::{AgencyFee, Campaign, CampaignStatus, CreatorPayout, PayoutStatus};
pub use creator::{CreatorPaymentInfo, PaymentMethod, RosterCreator};
pub use money::Money;
pub use period::DateRange;
pub use rule::{MatchingRule, RulePattern, RuleTarget};
pub use session::{ImportSession, MAX_IMPORT_SESSIONS};
pub use summary::FinanceSummary;
pub use transaction::{
    Category, ConfidenceLevel, ManualReview, MatchedBy, Transaction, TransactionFilter,
    TransactionId, TransactionType,
};
