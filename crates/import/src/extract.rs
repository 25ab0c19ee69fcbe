use std::sync::OnceLock;

use amie_core::PaymentMethod;
use regex::Regex;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_name_zelle,
    r"(?i)ZELLE (?:TO|FROM) ([A-Z\s]+?)(?:\s+\d|$)");
re!(re_name_title_case,
    r"(?:TO|FROM) ([A-Z][a-z]+ [A-Z][a-z]+)");
re!(re_name_ach,
    r"(?i)ACH (?:CREDIT|DEBIT) ([A-Z\s]+?)(?:\s+PAYMENT|\s+TRANSFER|$)");
re!(re_name_wire,
    r"(?i)WIRE (?:TO|FROM) ([A-Z\s]+?)(?:\s+\d|$)");

re!(re_company_prefixed,
    r"(?i)(?:ACH CREDIT|WIRE FROM) ([A-Z0-9\s&]+?)(?:\s+(?:PAYMENT|INC|LLC|CORP|CO)|$)");
re!(re_company_suffixed,
    r"(?i)([A-Z][A-Z0-9\s&]{2,})\s+(?:INC|LLC|CORP|CO)\.?");

/// Candidate entities pulled out of a raw statement description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifiers {
    pub possible_names: Vec<String>,
    pub possible_companies: Vec<String>,
    pub payment_method: Option<PaymentMethod>,
}

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct Extractor;

impl Extractor {
    /// Every template that matches contributes one candidate, in template order.
    /// Captures that are empty once trimmed are dropped.
    pub fn extract(raw_description: &str) -> Identifiers {
        let name_patterns = [re_name_zelle(), re_name_title_case(), re_name_ach(), re_name_wire()];
        let company_patterns = [re_company_prefixed(), re_company_suffixed()];

        Identifiers {
            possible_names: Self::captures(raw_description, &name_patterns),
            possible_companies: Self::captures(raw_description, &company_patterns),
            payment_method: Self::extract_payment_method(raw_description),
        }
    }

    pub fn extract_payment_method(raw_description: &str) -> Option<PaymentMethod> {
        let upper = raw_description.to_uppercase();
        if upper.contains("ZELLE") {
            Some(PaymentMethod::Zelle)
        } else if upper.contains("WIRE") {
            Some(PaymentMethod::Wire)
        } else if upper.contains("ACH") {
            Some(PaymentMethod::Ach)
        } else if upper.contains("CHECK") {
            Some(PaymentMethod::Check)
        } else {
            None
        }
    }

    fn captures(text: &str, patterns: &[&Regex]) -> Vec<String> {
        patterns
            .iter()
            .filter_map(|re| re.captures(text))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
