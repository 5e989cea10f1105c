//! The catalog owns stock records and, inside each record, the symbol's order book. A stock's
//! entry in the backing map is the unit of mutual exclusion for the whole exchange: submit,
//! cancel and the price tick all hold one stock's entry for the duration of the call, so
//! operations on one symbol never interleave while different symbols proceed in parallel.
//!
//! The book stamps orders with ids from a per-stock insertion counter. Candidate selection sorts
//! by price and then by id, which makes matching price-time deterministic.
use std::collections::VecDeque;

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;

use crate::exchange::bourse_v1::{Order, Side, Transaction};

/// Trailing transactions kept per stock. Older entries are evicted.
pub const TRANSACTION_HISTORY: usize = 10;

#[derive(Clone, Debug, Default)]
pub struct Book {
    inner: VecDeque<Order>,
    last_inserted: u64,
}

impl Book {
    pub fn new() -> Self {
        Self {
            inner: VecDeque::new(),
            last_inserted: 0,
        }
    }

    /// Ids are drawn for every submission, resting or not, so a resting remainder keeps the
    /// queue position of the submission that created it.
    pub fn next_order_id(&mut self) -> u64 {
        let order_id = self.last_inserted;
        self.last_inserted += 1;
        order_id
    }

    pub fn insert_order(&mut self, order: Order) {
        self.inner.push_back(order);
    }

    // Tolerant of orders that are already gone.
    pub fn delete_order(&mut self, order_id: u64) {
        if let Some(pos) = self.inner.iter().position(|order| order.id == order_id) {
            self.inner.remove(pos);
        }
    }

    pub fn get_mut(&mut self, order_id: u64) -> Option<&mut Order> {
        self.inner.iter_mut().find(|order| order.id == order_id)
    }

    pub fn find(&self, trader_id: &str, side: Side) -> Option<&Order> {
        self.inner
            .iter()
            .find(|order| order.trader_id == trader_id && order.side == side)
    }

    pub fn find_mut(&mut self, trader_id: &str, side: Side) -> Option<&mut Order> {
        self.inner
            .iter_mut()
            .find(|order| order.trader_id == trader_id && order.side == side)
    }

    pub fn remove_by_trader(&mut self, trader_id: &str, side: Side) -> Option<Order> {
        let pos = self
            .inner
            .iter()
            .position(|order| order.trader_id == trader_id && order.side == side)?;
        self.inner.remove(pos)
    }

    /// Ids of every resting order the aggressor crosses, best price first, ties in insertion
    /// order: ascending price for counter-sells, descending for counter-buys.
    pub fn crossing_orders(&self, aggressor: Side, limit: f64) -> Vec<u64> {
        let mut candidates: Vec<&Order> = self
            .inner
            .iter()
            .filter(|order| match aggressor {
                Side::Buy => order.side == Side::Sell && order.price <= limit,
                Side::Sell => order.side == Side::Buy && order.price >= limit,
            })
            .collect();

        match aggressor {
            Side::Buy => candidates.sort_by(|x, y| {
                x.price
                    .partial_cmp(&y.price)
                    .unwrap()
                    .then(x.id.cmp(&y.id))
            }),
            Side::Sell => candidates.sort_by(|x, y| {
                y.price
                    .partial_cmp(&x.price)
                    .unwrap()
                    .then(x.id.cmp(&y.id))
            }),
        }
        candidates.iter().map(|order| order.id).collect()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.inner.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Stock {
    pub id: String,
    pub name: String,
    /// Reference price: moves to the last executed trade price and drifts under the price feed.
    pub price: f64,
    /// Outstanding supply, informational.
    pub amount: u64,
    pub book: Book,
    pub transactions: VecDeque<Transaction>,
}

impl Stock {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64, amount: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            amount,
            book: Book::new(),
            transactions: VecDeque::new(),
        }
    }

    pub fn set_last_trade_price(&mut self, price: f64) {
        self.price = price;
    }

    pub fn append_transaction(&mut self, tx: Transaction) {
        self.transactions.push_back(tx);
        if self.transactions.len() > TRANSACTION_HISTORY {
            self.transactions.pop_front();
        }
    }

    /// Re-derives the given trader's standing sell quote from the current reference price. Used
    /// for the exchange inventory account whenever the reference price moves. Repricing does not
    /// trigger matching; resting orders only trade when an aggressor arrives.
    pub fn resync_quote(&mut self, trader_id: &str) {
        let price = self.price;
        if let Some(order) = self.book.find_mut(trader_id, Side::Sell) {
            order.price = price;
        }
    }
}

pub struct Catalog {
    stocks: DashMap<String, Stock>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            stocks: DashMap::new(),
        }
    }

    pub fn insert(&self, stock: Stock) {
        self.stocks.insert(stock.id.clone(), stock);
    }

    pub fn contains(&self, stock_id: &str) -> bool {
        self.stocks.contains_key(stock_id)
    }

    pub fn get(&self, stock_id: &str) -> Option<Stock> {
        self.stocks.get(stock_id).map(|entry| entry.value().clone())
    }

    /// The per-symbol lock: callers hold the returned entry for the whole mutating operation.
    pub fn get_mut(&self, stock_id: &str) -> Option<RefMut<'_, String, Stock>> {
        self.stocks.get_mut(stock_id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stocks.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn find_order(&self, stock_id: &str, order_id: u64) -> Option<Order> {
        let stock = self.stocks.get(stock_id)?;
        stock
            .book
            .orders()
            .into_iter()
            .find(|order| order.id == order_id)
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
