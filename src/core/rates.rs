//! Static reference rates and USD normalization.
//!
//! Rates are expressed as units-per-USD ("1 USD = X currency"). Conversion
//! reconciles an optional per-record rate hint against this table before
//! falling back to it.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Hints above this value are read as "1 USD = hint units", everything else as
/// "1 unit = hint USD".
const HINT_DIRECTION_THRESHOLD: Decimal = Decimal::TEN;

/// Compiled-in units-per-USD table as (code, mantissa, scale).
const BUILTIN_RATES: &[(&str, i64, u32)] = &[
    ("USD", 1, 0),
    ("NGN", 14336190917516, 10),
    ("KES", 12530281513658, 11),
    ("TZS", 2450495049505, 9),
    ("EUR", 83262260443543, 14),
    ("GBP", 72138541150152, 14),
    ("RWF", 14208214931542, 10),
    ("UGX", 34577905067933, 10),
    ("NOK", 97708691701344, 13),
    ("AED", 36725, 4),
    ("PHP", 5944767954, 8),
    ("CAD", 13452372791339, 13),
    ("XAF", 5711219951195, 10),
];

#[derive(Debug, Clone)]
pub struct RateTable {
    units_per_usd: HashMap<String, Decimal>,
}

impl RateTable {
    /// The compiled-in reference table.
    pub fn builtin() -> Self {
        let units_per_usd = BUILTIN_RATES
            .iter()
            .map(|(code, mantissa, scale)| (code.to_string(), Decimal::new(*mantissa, *scale)))
            .collect();
        Self { units_per_usd }
    }

    /// Builds a table from arbitrary entries. Codes are upper-cased and
    /// non-positive rates are dropped.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let mut table = Self {
            units_per_usd: HashMap::new(),
        };
        table.extend(entries);
        table
    }

    /// Adds or replaces entries, e.g. from configuration.
    pub fn with_overrides<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        self.extend(entries);
        self
    }

    fn extend<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        for (code, rate) in entries {
            let code = normalize_code(code.as_ref());
            if rate <= Decimal::ZERO {
                warn!(currency = %code, %rate, "Ignoring non-positive reference rate");
                continue;
            }
            self.units_per_usd.insert(code, rate);
        }
    }

    /// Units of `currency` per one USD, if the currency is known.
    pub fn units_per_usd(&self, currency: &str) -> Option<Decimal> {
        self.units_per_usd.get(&normalize_code(currency)).copied()
    }

    /// USD value of one unit of `currency`. Unknown currencies are assumed to
    /// be at parity.
    pub fn usd_rate(&self, currency: &str) -> Decimal {
        let code = normalize_code(currency);
        if code == "USD" {
            return Decimal::ONE;
        }
        match self.units_per_usd.get(&code) {
            Some(units) => Decimal::ONE / units,
            None => Decimal::ONE,
        }
    }

    pub fn currencies(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.units_per_usd.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Converts `amount` of `currency` to USD.
    ///
    /// A positive `rate_hint` is trusted when the currency is unknown, or when
    /// it lies within 50% of the reference rate read either as "1 USD = hint
    /// units" or as "1 unit = hint USD". A trusted hint is applied by
    /// magnitude: above 10 the amount is divided by it, otherwise multiplied.
    /// Without a trusted hint the reference table (or parity) is used.
    pub fn to_usd(&self, amount: Decimal, currency: &str, rate_hint: Option<Decimal>) -> Decimal {
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let code = normalize_code(currency);
        if code == "USD" {
            return amount;
        }

        let trusted = rate_hint
            .filter(|hint| *hint > Decimal::ZERO)
            .filter(|hint| match self.units_per_usd.get(&code) {
                Some(known) => hint_matches_reference(*hint, *known),
                None => true,
            });

        match trusted {
            Some(hint) if hint > HINT_DIRECTION_THRESHOLD => amount / hint,
            Some(hint) => amount * hint,
            None => {
                if let Some(hint) = rate_hint {
                    debug!(currency = %code, %hint, "Discarding rate hint that matches neither direction");
                }
                amount * self.usd_rate(&code)
            }
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn hint_matches_reference(hint: Decimal, known: Decimal) -> bool {
    let tolerance = known * Decimal::new(5, 1);
    if (hint - known).abs() < tolerance {
        return true;
    }
    (Decimal::ONE / hint - known).abs() < tolerance
}

/// Upper-cased, trimmed currency code; empty codes read as USD.
pub fn normalize_code(currency: &str) -> String {
    let code = currency.trim();
    if code.is_empty() {
        "USD".to_string()
    } else {
        code.to_uppercase()
    }
}
