//! Regional price table.
//!
//! Prices are explicit per `(tier, region, method)` triple. A combination with no entry is not offered, which is how
//! regions restrict the rails they accept. The built-in table can be replaced wholesale from a JSON file.
use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use spg_common::MinorUnits;
use thiserror::Error;

use crate::{
    db_types::{PaymentMethod, Region, Tier},
    spg_api::errors::ValidationError,
};

#[derive(Debug, Clone, Error)]
pub enum PriceTableError {
    #[error("Could not read the price table. {0}")]
    Io(String),
    #[error("Could not parse the price table. {0}")]
    Parse(String),
    #[error("The price table is invalid. {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    pub tier: Tier,
    pub region: Region,
    pub method: PaymentMethod,
    pub currency: String,
    pub base: MinorUnits,
    #[serde(default)]
    pub fee: MinorUnits,
}

/// The amounts a customer pays for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub currency: String,
    pub base: MinorUnits,
    pub fee: MinorUnits,
    pub total: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    entries: HashMap<(Tier, Region, PaymentMethod), PriceEntry>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut entries = Vec::new();
        let mut add = |region: Region, method: PaymentMethod, currency: &str, bases: [i64; 3], fee_bps: u32| {
            for (tier, base) in Tier::ALL.into_iter().zip(bases) {
                let base = MinorUnits::from_major(base);
                let fee = base.basis_points(fee_bps);
                entries.push(PriceEntry { tier, region, method, currency: currency.to_string(), base, fee });
            }
        };
        add(Region::Ke, PaymentMethod::MobileMoneyTill, "KES", [200, 500, 1_200], 0);
        add(Region::Ke, PaymentMethod::CardCheckout, "KES", [200, 500, 1_200], 290);
        add(Region::Ng, PaymentMethod::CardCheckout, "NGN", [2_000, 5_000, 12_000], 150);
        add(Region::Gh, PaymentMethod::MobileMoneyTill, "GHS", [25, 60, 150], 100);
        add(Region::Gh, PaymentMethod::CardCheckout, "GHS", [25, 60, 150], 195);
        add(Region::Intl, PaymentMethod::CardCheckout, "USD", [3, 7, 18], 390);
        for region in Region::ALL {
            add(region, PaymentMethod::CryptoInvoice, "USDT", [3, 7, 18], 0);
        }
        add(Region::Intl, PaymentMethod::ExchangeOrder, "USDT", [3, 7, 18], 0);
        Self { entries: entries.into_iter().map(|e| ((e.tier, e.region, e.method), e)).collect() }
    }
}

impl PriceTable {
    /// Builds a table from explicit entries. Every entry must have a currency, a positive base price and a
    /// non-negative fee, and no triple may appear twice.
    pub fn from_entries(entries: Vec<PriceEntry>) -> Result<Self, PriceTableError> {
        let mut table = HashMap::with_capacity(entries.len());
        for entry in entries {
            if entry.currency.trim().is_empty() {
                return Err(PriceTableError::Invalid(format!(
                    "{} {} {} has no currency",
                    entry.tier, entry.region, entry.method
                )));
            }
            if entry.base.value() <= 0 || entry.fee.value() < 0 {
                return Err(PriceTableError::Invalid(format!(
                    "{} {} {} has a non-positive price or a negative fee",
                    entry.tier, entry.region, entry.method
                )));
            }
            let key = (entry.tier, entry.region, entry.method);
            if table.insert(key, entry).is_some() {
                return Err(PriceTableError::Invalid(format!("{} {} {} is listed twice", key.0, key.1, key.2)));
            }
        }
        Ok(Self { entries: table })
    }

    pub fn from_json_str(json: &str) -> Result<Self, PriceTableError> {
        let entries = serde_json::from_str::<Vec<PriceEntry>>(json).map_err(|e| PriceTableError::Parse(e.to_string()))?;
        Self::from_entries(entries)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PriceTableError> {
        let json = fs::read_to_string(path.as_ref())
            .map_err(|e| PriceTableError::Io(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_json_str(&json)
    }

    pub fn quote(&self, tier: Tier, region: Region, method: PaymentMethod) -> Result<Quote, ValidationError> {
        let entry = self
            .entries
            .get(&(tier, region, method))
            .ok_or(ValidationError::MethodNotOffered { tier, region, method })?;
        Ok(Quote { currency: entry.currency.clone(), base: entry.base, fee: entry.fee, total: entry.base + entry.fee })
    }

    /// The rails a customer in `region` can pay a `tier` subscription with.
    pub fn offered_methods(&self, tier: Tier, region: Region) -> Vec<PaymentMethod> {
        PaymentMethod::ALL.into_iter().filter(|m| self.entries.contains_key(&(tier, region, *m))).collect()
    }

    pub fn entries(&self) -> Vec<PriceEntry> {
        let mut entries = self.entries.values().cloned().collect::<Vec<_>>();
        entries.sort_by_key(|e| (e.region, e.tier, e.method));
        entries
    }
}
