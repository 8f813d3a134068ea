// Copyright 2025 Cowboy AI, LLC.

//! Collaborators the aggregation reads from
//!
//! The composition core only knows the two traits. The in-memory sources
//! serve a generated [`DataSet`] behind a fixed simulated latency, and the
//! transaction source honours the failure-injection switch.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

use crate::config::DatasetConfig;
use crate::errors::{AggregationError, AggregationResult};
use crate::model::{Amount, Customer, CustomerId, PaymentType, PurchaseTransaction};

/// Source name reported by the in-memory transaction source
pub const PURCHASE_TRANSACTIONS: &str = "purchase-transactions";

/// Primary collaborator: customer records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerSource: Send + Sync {
    /// Look up one customer
    async fn find_customer(&self, id: CustomerId) -> AggregationResult<Customer>;
}

/// Secondary collaborator: purchase transactions per customer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurchaseTransactionSource: Send + Sync {
    /// Look up a customer's transactions, failing on purpose if `force_failure` is set
    async fn find_transactions(
        &self,
        customer_id: CustomerId,
        force_failure: bool,
    ) -> AggregationResult<HashSet<PurchaseTransaction>>;
}

/// Customers and their transactions, keyed by customer id
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    customers: HashMap<CustomerId, Customer>,
    transactions: HashMap<CustomerId, HashSet<PurchaseTransaction>>,
}

const FIRST_NAMES: [&str; 12] = [
    "Ada", "Alan", "Barbara", "Claude", "Dennis", "Edsger", "Frances", "Grace", "John", "Ken",
    "Margaret", "Radia",
];

const LAST_NAMES: [&str; 12] = [
    "Allen", "Dijkstra", "Hamilton", "Hopper", "Kernighan", "Knuth", "Liskov", "Lovelace",
    "Perlman", "Ritchie", "Shannon", "Turing",
];

const STREETS: [&str; 6] = [
    "Market Street",
    "Elm Avenue",
    "Harbor Road",
    "Maple Lane",
    "Station Road",
    "Union Square",
];

impl DataSet {
    /// Create an empty data set
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate customers `1..=config.customers`, each with between one and
    /// `config.max_transactions` transactions. A seed makes the run reproducible.
    pub fn generate(config: &DatasetConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let today = Utc::now().date_naive();
        let mut data = Self::new();

        for id in 1..=config.customers as CustomerId {
            let customer = Customer {
                id,
                full_name: format!(
                    "{} {}",
                    FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Ada"),
                    LAST_NAMES.choose(&mut rng).copied().unwrap_or("Lovelace"),
                ),
                phone_number: format!(
                    "({:03}) {:03}-{:04}",
                    rng.gen_range(200..1000),
                    rng.gen_range(200..1000),
                    rng.gen_range(0..10_000)
                ),
                address: Some(format!(
                    "{} {}",
                    rng.gen_range(1..2000),
                    STREETS.choose(&mut rng).copied().unwrap_or("Market Street")
                )),
                created_at: random_date(&mut rng, today),
            };

            let count = rng.gen_range(1..=config.max_transactions.max(1));
            let transactions = (0..count)
                .map(|_| PurchaseTransaction {
                    id: uuid::Builder::from_random_bytes(rng.gen()).into_uuid(),
                    amount: Amount::from_cents(rng.gen_range(100..100_000)),
                    payment_type: *PaymentType::ALL.choose(&mut rng).unwrap_or(&PaymentType::Visa),
                    created_at: random_date(&mut rng, today),
                })
                .collect();

            data.insert(customer, transactions);
        }

        data
    }

    /// Add or replace a customer and their transactions
    pub fn insert(&mut self, customer: Customer, transactions: HashSet<PurchaseTransaction>) {
        self.transactions.insert(customer.id, transactions);
        self.customers.insert(customer.id, customer);
    }

    /// Look up a customer
    pub fn customer(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.get(&id)
    }

    /// Look up a customer's transactions
    pub fn transactions(&self, id: CustomerId) -> Option<&HashSet<PurchaseTransaction>> {
        self.transactions.get(&id)
    }

    /// Number of customers
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    /// Whether there are no customers
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

fn random_date(rng: &mut StdRng, today: NaiveDate) -> NaiveDate {
    today - chrono::Duration::days(rng.gen_range(0..365 * 10))
}

/// Customer source backed by a [`DataSet`], with simulated latency
#[derive(Debug)]
pub struct InMemoryCustomerSource {
    data: Arc<DataSet>,
    latency: Duration,
    lookups: AtomicUsize,
}

impl InMemoryCustomerSource {
    /// Create a source that sleeps `latency` before answering
    pub fn new(data: Arc<DataSet>, latency: Duration) -> Self {
        Self {
            data,
            latency,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of lookups served
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomerSource for InMemoryCustomerSource {
    async fn find_customer(&self, id: CustomerId) -> AggregationResult<Customer> {
        info!(customer_id = id, "Getting customer by id");
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;

        self.data
            .customer(id)
            .cloned()
            .ok_or(AggregationError::CustomerNotFound(id))
    }
}

/// Transaction source backed by a [`DataSet`], with simulated latency.
///
/// A forced failure is reported only after the latency has elapsed, like a
/// remote call that errors out at the end.
#[derive(Debug)]
pub struct InMemoryTransactionSource {
    data: Arc<DataSet>,
    latency: Duration,
    started: AtomicUsize,
    completed: AtomicUsize,
}

impl InMemoryTransactionSource {
    /// Create a source that sleeps `latency` before answering
    pub fn new(data: Arc<DataSet>, latency: Duration) -> Self {
        Self {
            data,
            latency,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Lookups that have begun
    pub fn lookups_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Lookups that ran to completion, whether or not anyone still waited for them
    pub fn lookups_completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Lookups still running
    pub fn lookups_in_flight(&self) -> usize {
        self.lookups_started().saturating_sub(self.lookups_completed())
    }
}

#[async_trait]
impl PurchaseTransactionSource for InMemoryTransactionSource {
    async fn find_transactions(
        &self,
        customer_id: CustomerId,
        force_failure: bool,
    ) -> AggregationResult<HashSet<PurchaseTransaction>> {
        info!(customer_id, "Getting purchase transactions by customer id");
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.completed.fetch_add(1, Ordering::SeqCst);

        if force_failure {
            error!(customer_id, "Error while retrieving purchase transactions");
            return Err(AggregationError::source_unavailable(
                PURCHASE_TRANSACTIONS,
                "forced failure",
            ));
        }

        Ok(self
            .data
            .transactions(customer_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seed: u64) -> DatasetConfig {
        DatasetConfig {
            customers: 9,
            max_transactions: 10,
            seed: Some(seed),
        }
    }

    #[test]
    fn test_generate_covers_every_customer() {
        let data = DataSet::generate(&config(7));
        assert_eq!(data.len(), 9);

        for id in 1..=9 {
            let customer = data.customer(id).unwrap();
            assert_eq!(customer.id, id);
            let transactions = data.transactions(id).unwrap();
            assert!((1..=10).contains(&transactions.len()));
        }
        assert!(data.customer(10).is_none());
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let first = DataSet::generate(&config(42));
        let second = DataSet::generate(&config(42));

        for id in 1..=9 {
            assert_eq!(first.customer(id), second.customer(id));
            assert_eq!(first.transactions(id), second.transactions(id));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_customer_source_sleeps_then_answers() {
        let data = Arc::new(DataSet::generate(&config(1)));
        let source = InMemoryCustomerSource::new(data, Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        let customer = source.find_customer(3).await.unwrap();
        assert_eq!(customer.id, 3);
        assert!(start.elapsed() >= Duration::from_secs(2));

        let missing = source.find_customer(99).await.unwrap_err();
        assert!(matches!(missing, AggregationError::CustomerNotFound(99)));
        assert_eq!(source.lookups(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transaction_source_forced_failure() {
        let data = Arc::new(DataSet::generate(&config(1)));
        let source = InMemoryTransactionSource::new(data, Duration::from_secs(4));

        let start = tokio::time::Instant::now();
        let err = source.find_transactions(2, true).await.unwrap_err();
        assert!(err.is_source_unavailable());
        assert!(start.elapsed() >= Duration::from_secs(4));

        let found = source.find_transactions(2, false).await.unwrap();
        assert!(!found.is_empty());
        assert_eq!(source.lookups_completed(), 2);
        assert_eq!(source.lookups_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unknown_customer_has_no_transactions() {
        let source = InMemoryTransactionSource::new(Arc::new(DataSet::new()), Duration::ZERO);
        let found = source.find_transactions(5, false).await.unwrap();
        assert!(found.is_empty());
    }
}
