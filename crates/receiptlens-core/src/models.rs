//! Domain models for ReceiptLens
//!
//! Every durable entity is owned by the backend; these are read-only
//! snapshots of its JSON responses plus the request payloads the client
//! sends. Input payloads validate themselves before any network call.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum password length accepted by the backend
pub const MIN_PASSWORD_LEN: usize = 8;

/// Largest page the transactions endpoint will return
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Analytics endpoints accept a window of 1..=24 months
pub const MAX_ANALYTICS_MONTHS: u32 = 24;

/// Backend timestamps
///
/// The backend stores timezone-aware columns and sends RFC 3339 with an
/// offset (`Z` or `+00:00`). Offset-less values are read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw))),
            None => Ok(None),
        }
    }
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// Email/password pair used for both registration and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(Error::Validation("Please fill in all fields".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// A receipt parsed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub user_id: String,
    pub image_path: String,
    pub vendor: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub purchase_date: DateTime<Utc>,
    pub total_amount: f64,
    pub tax_amount: f64,
    pub currency: String,
    pub category: Option<String>,
    pub raw_ocr_text: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// A financial transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    /// Set when the backend created this transaction from a receipt upload
    pub receipt_id: Option<String>,
    pub amount: f64,
    /// Free-form, non-empty; the budget join key
    pub category: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub transaction_date: DateTime<Utc>,
    pub is_recurring: bool,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// A transaction entered directly by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: f64,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub transaction_date: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
}

impl NewTransaction {
    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(Error::Validation("Category is required".into()));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(Error::Validation(
                "Amount must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

/// Query filters for listing transactions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl TransactionFilter {
    /// Most recent `limit` transactions, no other filters
    pub fn recent(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Filter by category; blank input means no filter
    pub fn with_category(mut self, category: &str) -> Self {
        let trimmed = category.trim();
        self.category = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    /// Query parameters in a stable order
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(start) = self.start_date {
            params.push((
                "start_date".to_string(),
                start.format("%Y-%m-%dT00:00:00").to_string(),
            ));
        }
        if let Some(end) = self.end_date {
            params.push((
                "end_date".to_string(),
                end.format("%Y-%m-%dT23:59:59").to_string(),
            ));
        }
        if let Some(ref category) = self.category {
            params.push(("category".to_string(), category.clone()));
        }
        if let Some(skip) = self.skip {
            params.push(("skip".to_string(), skip.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push((
                "limit".to_string(),
                limit.clamp(1, MAX_PAGE_LIMIT).to_string(),
            ));
        }
        params
    }
}

/// A monthly spending budget for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub user_id: String,
    pub category: String,
    pub monthly_limit: f64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create-or-replace payload; the backend upserts by category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudget {
    pub category: String,
    pub monthly_limit: f64,
}

impl NewBudget {
    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(Error::Validation("Please fill in all fields".into()));
        }
        if !self.monthly_limit.is_finite() || self.monthly_limit <= 0.0 {
            return Err(Error::Validation(
                "Limit must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

/// Total spend for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySpendPoint {
    /// Format: "YYYY-MM"
    pub month: String,
    pub total_amount: f64,
}

/// Total spend for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpend {
    pub category: String,
    pub total_amount: f64,
}

/// Backend-reported spend against a budget for the current month
///
/// `over_by` is the raw `spent - limit` as sent by the backend and may be
/// negative; the alert engine recomputes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub category: String,
    pub spent: f64,
    pub limit: f64,
    pub percentage: f64,
    pub over_by: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentMonthSpend {
    pub total_spend: f64,
}

/// Check an analytics window before sending it
pub fn validate_months(months: u32) -> Result<u32> {
    if months == 0 || months > MAX_ANALYTICS_MONTHS {
        return Err(Error::Validation(format!(
            "Months must be between 1 and {}",
            MAX_ANALYTICS_MONTHS
        )));
    }
    Ok(months)
}

/// Format an amount with 2-decimal precision, e.g. `$12.50` or `-$3.00`
pub fn format_amount(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${:.2}", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_validation() {
        assert!(Credentials::new("a@b.com", "longenough").validate().is_ok());

        let err = Credentials::new("", "longenough").validate().unwrap_err();
        assert_eq!(err.user_message(""), "Please fill in all fields");

        let err = Credentials::new("a@b.com", "short").validate().unwrap_err();
        assert!(err.user_message("").contains("at least 8"));
    }

    #[test]
    fn test_new_transaction_validation() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let mut tx = NewTransaction {
            amount: 12.5,
            category: "groceries".into(),
            description: None,
            transaction_date: date,
            is_recurring: false,
        };
        assert!(tx.validate().is_ok());

        tx.category = "   ".into();
        assert!(matches!(tx.validate(), Err(Error::Validation(_))));

        tx.category = "groceries".into();
        tx.amount = f64::NAN;
        assert!(tx.validate().is_err());
        tx.amount = 0.0;
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_new_budget_validation() {
        let ok = NewBudget {
            category: "dining".into(),
            monthly_limit: 50.0,
        };
        assert!(ok.validate().is_ok());

        let zero = NewBudget {
            category: "dining".into(),
            monthly_limit: 0.0,
        };
        assert_eq!(
            zero.validate().unwrap_err().user_message(""),
            "Limit must be a positive number"
        );
    }

    #[test]
    fn test_filter_query_order_and_clamp() {
        let filter = TransactionFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: None,
            category: Some("dining".into()),
            skip: Some(10),
            limit: Some(5000),
        };
        let query = filter.to_query();
        assert_eq!(query[0], ("start_date".into(), "2024-01-01T00:00:00".into()));
        assert_eq!(query[1], ("category".into(), "dining".into()));
        assert_eq!(query[2], ("skip".into(), "10".into()));
        assert_eq!(query[3], ("limit".into(), "1000".into()));
    }

    #[test]
    fn test_blank_category_is_no_filter() {
        let filter = TransactionFilter::recent(100).with_category("  ");
        assert!(filter.category.is_none());
        let filter = TransactionFilter::recent(100).with_category(" dining ");
        assert_eq!(filter.category.as_deref(), Some("dining"));
    }

    #[test]
    fn test_validate_months() {
        assert_eq!(validate_months(6).unwrap(), 6);
        assert!(validate_months(0).is_err());
        assert!(validate_months(25).is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(12.5), "$12.50");
        assert_eq!(format_amount(0.0), "$0.00");
        assert_eq!(format_amount(-3.0), "-$3.00");
    }

    #[test]
    fn test_transaction_deserializes_backend_json() {
        let json = r#"{
            "id": "5d1c",
            "user_id": "u1",
            "receipt_id": null,
            "amount": 42.1,
            "category": "groceries",
            "description": "Receipt from Mock Store",
            "transaction_date": "2024-01-15T00:00:00",
            "is_recurring": false,
            "created_at": "2024-01-15T10:22:01.123456"
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.category, "groceries");
        assert!(tx.receipt_id.is_none());
    }

    #[test]
    fn test_timestamps_with_offset() {
        let json = r#"{
            "id": "5d1c",
            "user_id": "u1",
            "receipt_id": "r1",
            "amount": 42.1,
            "category": "groceries",
            "description": null,
            "transaction_date": "2024-01-15T00:00:00Z",
            "is_recurring": false,
            "created_at": "2024-01-15T10:22:01.123456+00:00"
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.transaction_date.to_rfc3339(), "2024-01-15T00:00:00+00:00");
        assert_eq!(tx.created_at.format("%H:%M:%S").to_string(), "10:22:01");

        let user: User = serde_json::from_str(
            r#"{"id": "u1", "email": "a@b.com", "created_at": "2024-01-15T10:22:01.123456Z"}"#,
        )
        .unwrap();
        assert_eq!(user.created_at.format("%Y-%m-%d").to_string(), "2024-01-15");
    }

    #[test]
    fn test_timestamp_offset_normalized_to_utc() {
        let at = timestamp::parse("2024-01-15T02:30:00+02:00").unwrap();
        assert_eq!(at.to_rfc3339(), "2024-01-15T00:30:00+00:00");
        assert!(timestamp::parse("2024-01-15").is_none());
        assert!(timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_budget_optional_timestamp() {
        let budget: Budget = serde_json::from_str(
            r#"{"id": "b1", "user_id": "u1", "category": "dining", "monthly_limit": 50.0,
                "created_at": "2024-01-01T00:00:00+00:00", "updated_at": null}"#,
        )
        .unwrap();
        assert!(budget.updated_at.is_none());

        let budget: Budget = serde_json::from_str(
            r#"{"id": "b1", "user_id": "u1", "category": "dining", "monthly_limit": 50.0,
                "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-02-01T08:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            budget.updated_at.map(|t| t.format("%Y-%m-%d").to_string()).as_deref(),
            Some("2024-02-01")
        );

        // Serialized form reads back unchanged, as the query cache relies on
        let value = serde_json::to_value(&budget).unwrap();
        let back: Budget = serde_json::from_value(value).unwrap();
        assert_eq!(back, budget);
    }
}
