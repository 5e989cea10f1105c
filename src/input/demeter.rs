use std::fs::read_to_string;
use std::path::Path;

use rand::thread_rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DemeterStock {
    pub id: String,
    pub name: String,
    #[serde(rename = "currentPrice")]
    pub current_price: f64,
    pub amount: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DemeterTrader {
    pub id: String,
    pub name: String,
    pub money: f64,
}

// Demeter produces the bootstrap state for an exchange: the listed stocks with their reference
// price and outstanding supply, and the traders with their starting cash. The on-disk format is
// a single JSON document with `shares` and `traders` arrays, `currentPrice` spelled as in the
// wire format.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Demeter {
    pub shares: Vec<DemeterStock>,
    pub traders: Vec<DemeterTrader>,
}

impl Demeter {
    pub fn new() -> Self {
        Self {
            shares: Vec::new(),
            traders: Vec::new(),
        }
    }

    pub fn add_share(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        current_price: f64,
        amount: u64,
    ) {
        self.shares.push(DemeterStock {
            id: id.into(),
            name: name.into(),
            current_price,
            amount,
        });
    }

    pub fn add_trader(&mut self, id: impl Into<String>, name: impl Into<String>, money: f64) {
        self.traders.push(DemeterTrader {
            id: id.into(),
            name: name.into(),
            money,
        });
    }

    pub fn from_json(contents: &str) -> Self {
        serde_json::from_str(contents).unwrap()
    }

    pub fn from_file(path: &Path) -> Self {
        let contents = read_to_string(path).unwrap();
        Self::from_json(&contents)
    }

    /// A small fixed dataset for tests and for running a server without a file. `NIL` has no
    /// outstanding supply, so it lists with an empty book.
    pub fn sample() -> Self {
        let mut demeter = Self::new();
        demeter.add_share("ABC", "Abacus Corp", 100.0, 1000);
        demeter.add_share("BCD", "Bancadero", 10.0, 500);
        demeter.add_share("NIL", "Nilfond", 50.0, 0);
        demeter.add_trader("1", "Alice", 10000.0);
        demeter.add_trader("2", "Bob", 5000.0);
        demeter.add_trader("3", "Carol", 2000.0);
        demeter.add_trader("4", "Dan", 8000.0);
        demeter
    }

    pub fn random(symbols: Vec<&str>, traders: u64) -> Self {
        let price_dist: Uniform<f64> = Uniform::new(10.0, 100.0);
        let supply_dist: Uniform<u64> = Uniform::new(100, 1000);
        let cash_dist: Uniform<f64> = Uniform::new(1_000.0, 10_000.0);
        let mut rng = thread_rng();

        let mut demeter = Self::new();
        for symbol in &symbols {
            demeter.add_share(
                *symbol,
                *symbol,
                (price_dist.sample(&mut rng) * 100.0).round() / 100.0,
                supply_dist.sample(&mut rng),
            );
        }
        for trader in 1..traders + 1 {
            demeter.add_trader(
                trader.to_string(),
                format!("Trader {}", trader),
                (cash_dist.sample(&mut rng) * 100.0).round() / 100.0,
            );
        }
        demeter
    }
}

#[cfg(test)]
mod tests {
    use super::Demeter;

    #[test]
    fn test_that_json_dataset_parses() {
        let contents = r#"
        {
            "shares": [
                { "id": "ABC", "name": "Abacus Corp", "currentPrice": 100.0, "amount": 1000 }
            ],
            "traders": [
                { "id": "1", "name": "Alice", "money": 10000.0 }
            ]
        }"#;

        let demeter = Demeter::from_json(contents);

        assert_eq!(demeter.shares.len(), 1);
        assert_eq!(demeter.shares[0].id, "ABC");
        assert_eq!(demeter.shares[0].current_price, 100.0);
        assert_eq!(demeter.shares[0].amount, 1000);
        assert_eq!(demeter.traders.len(), 1);
        assert_eq!(demeter.traders[0].money, 10000.0);
    }

    #[test]
    fn test_that_current_price_round_trips_in_wire_spelling() {
        let demeter = Demeter::sample();

        let contents = serde_json::to_string(&demeter).unwrap();
        assert!(contents.contains("currentPrice"));

        let parsed = Demeter::from_json(&contents);
        assert_eq!(parsed.shares[0].current_price, 100.0);
    }

    #[test]
    fn test_that_random_respects_counts_and_bounds() {
        let demeter = Demeter::random(vec!["ABC", "BCD"], 5);

        assert_eq!(demeter.shares.len(), 2);
        assert_eq!(demeter.traders.len(), 5);
        for share in &demeter.shares {
            assert!(share.current_price >= 10.0);
            assert!(share.current_price <= 100.0);
            assert!(share.amount >= 100);
        }
        for trader in &demeter.traders {
            assert!(trader.money >= 1000.0);
        }
    }

    #[test]
    fn test_that_builders_accumulate_entries() {
        let mut demeter = Demeter::new();
        demeter.add_share("XYZ", "Xylophone", 25.0, 10);
        demeter.add_trader("9", "Zoe", 1.0);

        assert_eq!(demeter.shares.len(), 1);
        assert_eq!(demeter.traders.len(), 1);
        assert_eq!(demeter.shares[0].name, "Xylophone");
        assert_eq!(demeter.traders[0].name, "Zoe");
    }
}
