//! The ledger owns trader records: cash, funds reserved against open buy orders, holdings and
//! transaction history, plus the per-stock maps pointing at a trader's resting orders. It only
//! provides mutation primitives, each atomic for one trader; matching logic and cross-trader
//! invariants live in the exchange.
//!
//! Funds checks and reservations are fused into one critical section (`prepare_buy`) because buy
//! orders on different symbols can race on the same trader's cash. A check that released the
//! trader entry before reserving could let two racing buys both pass against the same balance.
use std::collections::HashMap;

use dashmap::DashMap;

use crate::exchange::bourse_v1::{BourseV1Error, Side, Transaction};

/// A market participant. The exchange inventory account is a `Trader` like any other, seeded at
/// bootstrap with the full supply of every stock.
#[derive(Clone, Debug)]
pub struct Trader {
    pub id: String,
    pub name: String,
    pub cash: f64,
    pub reserved_funds: f64,
    pub holdings: HashMap<String, u64>,
    /// Stock id to resting order id, at most one entry per stock. The order itself lives on the
    /// stock's book.
    pub buy_orders: HashMap<String, u64>,
    pub sell_orders: HashMap<String, u64>,
    pub transactions: Vec<Transaction>,
}

impl Trader {
    pub fn new(id: impl Into<String>, name: impl Into<String>, cash: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cash,
            reserved_funds: 0.0,
            holdings: HashMap::new(),
            buy_orders: HashMap::new(),
            sell_orders: HashMap::new(),
            transactions: Vec::new(),
        }
    }
}

pub struct Ledger {
    traders: DashMap<String, Trader>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            traders: DashMap::new(),
        }
    }

    pub fn insert(&self, trader: Trader) {
        self.traders.insert(trader.id.clone(), trader);
    }

    pub fn contains(&self, trader_id: &str) -> bool {
        self.traders.contains_key(trader_id)
    }

    pub fn get(&self, trader_id: &str) -> Option<Trader> {
        self.traders.get(trader_id).map(|entry| entry.value().clone())
    }

    pub fn name_of(&self, trader_id: &str) -> Option<String> {
        self.traders.get(trader_id).map(|entry| entry.name.clone())
    }

    /// Clones every trader record, holding one entry at a time. Sorted by id so output is stable
    /// regardless of shard iteration order.
    pub fn all(&self) -> Vec<Trader> {
        let mut traders: Vec<Trader> = self
            .traders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        traders.sort_by(|a, b| a.id.cmp(&b.id));
        traders
    }

    /// Validates a buy submission against this trader and reserves the full commitment, all under
    /// one entry lock: conflicting-order checks, then `cash - reserved >= total`, then reserve.
    pub fn prepare_buy(
        &self,
        trader_id: &str,
        stock_id: &str,
        total: f64,
    ) -> Result<(), BourseV1Error> {
        let Some(mut trader) = self.traders.get_mut(trader_id) else {
            return Err(BourseV1Error::UnknownTrader);
        };
        if trader.sell_orders.contains_key(stock_id) {
            return Err(BourseV1Error::ConflictingSellOrder);
        }
        if trader.buy_orders.contains_key(stock_id) {
            return Err(BourseV1Error::ConflictingBuyOrder);
        }
        if trader.cash - trader.reserved_funds < total {
            return Err(BourseV1Error::InsufficientFunds);
        }
        trader.reserved_funds += total;
        Ok(())
    }

    /// Validates a sell submission: conflicting-order checks, then sufficient holdings. Sells
    /// reserve nothing, the shares stay in `holdings` until they trade, so this mutates nothing.
    pub fn prepare_sell(
        &self,
        trader_id: &str,
        stock_id: &str,
        amount: u64,
    ) -> Result<(), BourseV1Error> {
        let Some(trader) = self.traders.get(trader_id) else {
            return Err(BourseV1Error::UnknownTrader);
        };
        if trader.buy_orders.contains_key(stock_id) {
            return Err(BourseV1Error::ConflictingBuyOrder);
        }
        if trader.sell_orders.contains_key(stock_id) {
            return Err(BourseV1Error::ConflictingSellOrder);
        }
        if trader.holdings.get(stock_id).copied().unwrap_or(0) < amount {
            return Err(BourseV1Error::InsufficientHoldings);
        }
        Ok(())
    }

    /// Applies the buyer's side of one fill: cash out by the executed cost, reservation released
    /// by the order's earmark for the filled units, holdings in. `release` can exceed `cost` when
    /// the aggressor got price improvement over its limit.
    pub fn settle_buy_fill(
        &self,
        trader_id: &str,
        stock_id: &str,
        cost: f64,
        release: f64,
        quantity: u64,
    ) {
        let Some(mut trader) = self.traders.get_mut(trader_id) else {
            unreachable!("buyer disappeared mid-settlement")
        };
        trader.cash -= cost;
        Self::release_funds(&mut trader, release);
        Self::adjust_holdings(&mut trader, stock_id, quantity as i64);
    }

    /// Applies the seller's side of one fill: holdings out, cash in.
    pub fn settle_sell_fill(&self, trader_id: &str, stock_id: &str, proceeds: f64, quantity: u64) {
        let Some(mut trader) = self.traders.get_mut(trader_id) else {
            unreachable!("seller disappeared mid-settlement")
        };
        trader.cash += proceeds;
        Self::adjust_holdings(&mut trader, stock_id, -(quantity as i64));
    }

    /// Drops the trader's resting buy on this stock and releases its remaining earmark. Used by
    /// cancellation; removal and release happen under one entry lock.
    pub fn release_buy_order(&self, trader_id: &str, stock_id: &str, earmark: f64) {
        let Some(mut trader) = self.traders.get_mut(trader_id) else {
            unreachable!("cancelling buy for a trader that is not on the ledger")
        };
        trader.buy_orders.remove(stock_id);
        Self::release_funds(&mut trader, earmark);
    }

    pub fn set_open_order(&self, trader_id: &str, stock_id: &str, side: Side, order_id: u64) {
        let Some(mut trader) = self.traders.get_mut(trader_id) else {
            unreachable!("resting an order for a trader that is not on the ledger")
        };
        match side {
            Side::Buy => trader.buy_orders.insert(stock_id.to_string(), order_id),
            Side::Sell => trader.sell_orders.insert(stock_id.to_string(), order_id),
        };
    }

    pub fn clear_open_order(&self, trader_id: &str, stock_id: &str, side: Side) {
        let Some(mut trader) = self.traders.get_mut(trader_id) else {
            unreachable!("clearing an order for a trader that is not on the ledger")
        };
        match side {
            Side::Buy => trader.buy_orders.remove(stock_id),
            Side::Sell => trader.sell_orders.remove(stock_id),
        };
    }

    pub fn open_order(&self, trader_id: &str, stock_id: &str, side: Side) -> Option<u64> {
        let trader = self.traders.get(trader_id)?;
        match side {
            Side::Buy => trader.buy_orders.get(stock_id).copied(),
            Side::Sell => trader.sell_orders.get(stock_id).copied(),
        }
    }

    pub fn record_transaction(&self, trader_id: &str, tx: Transaction) {
        let Some(mut trader) = self.traders.get_mut(trader_id) else {
            unreachable!("recording a transaction for a trader that is not on the ledger")
        };
        trader.transactions.push(tx);
    }

    // Clamped so an over-release can never drive the reservation negative.
    fn release_funds(trader: &mut Trader, amount: f64) {
        trader.reserved_funds = (trader.reserved_funds - amount).max(0.0);
    }

    // Prunes the entry when it lands on exactly 0. Going below 0 means a resting sell was larger
    // than its owner's holdings, which validation rules out.
    fn adjust_holdings(trader: &mut Trader, stock_id: &str, delta: i64) {
        let held = trader.holdings.get(stock_id).copied().unwrap_or(0) as i64;
        let next = held + delta;
        if next < 0 {
            unreachable!("holdings of {} would go negative", stock_id)
        }
        if next == 0 {
            trader.holdings.remove(stock_id);
        } else {
            trader.holdings.insert(stock_id.to_string(), next as u64);
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
