// Copyright 2025 Cowboy AI, LLC.

//! Entities returned by the collaborators and the combined projection
//!
//! Collaborators hand back [`Customer`] and [`PurchaseTransaction`]; the
//! aggregation works on the response projections and attaches the
//! transaction set to the customer only once the join has settled.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identifier used to look up both branches. Parity selects the policy family.
pub type CustomerId = i64;

/// Set of transaction projections attached to a customer
pub type PurchaseTransactions = BTreeSet<PurchaseTransactionResponse>;

/// Customer record held by the primary source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Customer id
    pub id: CustomerId,
    /// Display name
    pub full_name: String,
    /// Contact number
    pub phone_number: String,
    /// Postal address, not projected into responses
    pub address: Option<String>,
    /// Day the customer was created
    pub created_at: NaiveDate,
}

/// Card network a purchase was paid with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// Visa
    Visa,
    /// Mastercard
    Mastercard,
    /// Discover
    Discover,
    /// American Express
    AmericanExpress,
    /// Diners Club
    DinersClub,
    /// JCB
    Jcb,
    /// Switch
    Switch,
    /// Solo
    Solo,
    /// China UnionPay
    ChinaUnionPay,
    /// Laser
    Laser,
}

impl PaymentType {
    /// All card networks, in declaration order
    pub const ALL: [PaymentType; 10] = [
        PaymentType::Visa,
        PaymentType::Mastercard,
        PaymentType::Discover,
        PaymentType::AmericanExpress,
        PaymentType::DinersClub,
        PaymentType::Jcb,
        PaymentType::Switch,
        PaymentType::Solo,
        PaymentType::ChinaUnionPay,
        PaymentType::Laser,
    ];
}

/// Money amount with two decimal places, stored in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    /// Create from minor units (cents)
    pub fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    /// Minor units (cents)
    pub fn cents(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Amount((value * 100.0).round() as i64))
    }
}

/// Purchase transaction record held by the secondary source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseTransaction {
    /// Unique transaction id
    pub id: Uuid,
    /// Amount paid
    pub amount: Amount,
    /// Card network used
    pub payment_type: PaymentType,
    /// Day of purchase
    pub created_at: NaiveDate,
}

/// Transaction projection carried in a combined result
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseTransactionResponse {
    /// Unique transaction id
    pub id: Uuid,
    /// Amount paid
    pub amount: Amount,
    /// Card network used
    pub payment_type: PaymentType,
    /// Day of purchase
    pub created_at: NaiveDate,
}

impl From<PurchaseTransaction> for PurchaseTransactionResponse {
    fn from(tx: PurchaseTransaction) -> Self {
        Self {
            id: tx.id,
            amount: tx.amount,
            payment_type: tx.payment_type,
            created_at: tx.created_at,
        }
    }
}

/// Customer projection plus the optional transaction set.
///
/// `purchase_transactions` stays `None` until the join attaches a value, and
/// is left out of the JSON entirely while it is `None`. An empty set assigned
/// by a recovery policy is always serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    /// Customer id
    pub id: CustomerId,
    /// Display name
    pub full_name: String,
    /// Contact number
    pub phone_number: String,
    /// Day the customer was created
    pub created_at: NaiveDate,
    /// Attached transaction projections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_transactions: Option<PurchaseTransactions>,
}

impl CustomerResponse {
    /// Attach the secondary branch's value, consuming the projection
    pub fn with_purchase_transactions(mut self, transactions: PurchaseTransactions) -> Self {
        self.purchase_transactions = Some(transactions);
        self
    }

    /// Number of attached transactions, `None` if nothing was attached
    pub fn transaction_count(&self) -> Option<usize> {
        self.purchase_transactions.as_ref().map(BTreeSet::len)
    }
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            full_name: customer.full_name,
            phone_number: customer.phone_number,
            created_at: customer.created_at,
            purchase_transactions: None,
        }
    }
}
