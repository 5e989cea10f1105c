use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use derive_more::{Display, Error};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Stock};
use crate::feed::PriceFeed;
use crate::input::demeter::Demeter;
use crate::ledger::{Ledger, Trader};

/// Trader id reserved for the exchange's own inventory account, seeded at bootstrap with every
/// stock's full outstanding supply and a standing sell at the reference price.
pub const EXCHANGE_ACCOUNT: &str = "0";
pub const EXCHANGE_ACCOUNT_NAME: &str = "Stock Market";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Order {
    /// Assigned from the stock's insertion counter at submission; doubles as the time component
    /// of price-time priority.
    pub id: u64,
    pub trader_id: String,
    pub stock_id: String,
    pub side: Side,
    pub price: f64,
    /// Remaining amount. An order that reaches 0 is removed from every index, never kept as a
    /// zero-quantity record.
    pub amount: u64,
    /// Remaining reservation earmark behind a buy. Starts at `price * amount`, shrinks with each
    /// fill and is released in full on cancel or on the final fill, so the buyer's reserved
    /// funds land back on exactly the value they had before the order. Always 0 for sells.
    #[serde(skip)]
    pub reserved: f64,
}

impl Order {
    pub fn buy(
        trader_id: impl Into<String>,
        stock_id: impl Into<String>,
        price: f64,
        amount: u64,
    ) -> Self {
        Self {
            id: 0,
            trader_id: trader_id.into(),
            stock_id: stock_id.into(),
            side: Side::Buy,
            price,
            amount,
            reserved: price * amount as f64,
        }
    }

    pub fn sell(
        trader_id: impl Into<String>,
        stock_id: impl Into<String>,
        price: f64,
        amount: u64,
    ) -> Self {
        Self {
            id: 0,
            trader_id: trader_id.into(),
            stock_id: stock_id.into(),
            side: Side::Sell,
            price,
            amount,
            reserved: 0.0,
        }
    }
}

/// One executed trade. Immutable once recorded; the price is always the resting order's price.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Transaction {
    pub id: u64,
    pub buyer_id: String,
    pub buyer_name: String,
    pub seller_id: String,
    pub seller_name: String,
    pub stock_id: String,
    pub price: f64,
    pub amount: u64,
    pub total: f64,
    pub date: i64,
}

/// Result of a submission: the order's final state (amount 0 when fully filled) and the trades
/// it produced, in execution order.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OrderReceipt {
    pub order: Order,
    pub fills: Vec<Transaction>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StockSnapshot {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub amount: u64,
    pub open_orders: Vec<Order>,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TraderSnapshot {
    pub id: String,
    pub name: String,
    pub cash: f64,
    pub reserved_funds: f64,
    pub holdings: HashMap<String, u64>,
    pub buy_orders: Vec<Order>,
    pub sell_orders: Vec<Order>,
}

#[derive(Debug, Display, Error)]
pub enum BourseV1Error {
    UnknownTrader,
    UnknownStock,
    UnknownOrder,
    InvalidAmount,
    InvalidPrice,
    ConflictingBuyOrder,
    ConflictingSellOrder,
    InsufficientFunds,
    InsufficientHoldings,
}

/// The matching and settlement engine. Owns the ledger and the catalog; no state lives outside
/// it.
pub struct BourseV1 {
    ledger: Ledger,
    catalog: Catalog,
    last_transaction_id: AtomicU64,
}

impl BourseV1 {
    pub fn new() -> Self {
        Self {
            ledger: Ledger::new(),
            catalog: Catalog::new(),
            last_transaction_id: AtomicU64::new(0),
        }
    }

    /// Builds a running exchange from a bootstrap dataset. Stocks and traders enter as
    /// described; the inventory account is synthesized with every stock's supply as holdings and
    /// a standing sell at the reference price. Zero-supply stocks get neither. Panics on a
    /// listing with a non-positive price; every price entering the book must satisfy the same
    /// bound submissions are checked against.
    pub fn from_demeter(data: &Demeter) -> Self {
        let bourse = Self::new();

        for share in &data.shares {
            if !share.current_price.is_finite() || share.current_price <= 0.0 {
                panic!("listing {} has a non-positive price", share.id)
            }
            bourse.catalog.insert(Stock::new(
                &share.id,
                &share.name,
                share.current_price,
                share.amount,
            ));
        }
        for trader in &data.traders {
            bourse
                .ledger
                .insert(Trader::new(&trader.id, &trader.name, trader.money));
        }

        let mut inventory = Trader::new(EXCHANGE_ACCOUNT, EXCHANGE_ACCOUNT_NAME, 0.0);
        for share in &data.shares {
            if share.amount > 0 {
                inventory.holdings.insert(share.id.clone(), share.amount);
            }
        }
        bourse.ledger.insert(inventory);

        for share in &data.shares {
            if share.amount == 0 {
                continue;
            }
            if let Some(mut stock) = bourse.catalog.get_mut(&share.id) {
                let mut order =
                    Order::sell(EXCHANGE_ACCOUNT, &share.id, share.current_price, share.amount);
                order.id = stock.book.next_order_id();
                bourse
                    .ledger
                    .set_open_order(EXCHANGE_ACCOUNT, &share.id, Side::Sell, order.id);
                stock.book.insert_order(order);
            }
        }
        bourse
    }

    pub fn place_buy_order(
        &self,
        trader_id: &str,
        stock_id: &str,
        price: f64,
        amount: u64,
    ) -> Result<OrderReceipt, BourseV1Error> {
        if !self.ledger.contains(trader_id) {
            return Err(BourseV1Error::UnknownTrader);
        }
        // Entry guard held until return: submissions on this symbol are serial.
        let Some(mut stock) = self.catalog.get_mut(stock_id) else {
            return Err(BourseV1Error::UnknownStock);
        };
        if amount == 0 {
            return Err(BourseV1Error::InvalidAmount);
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(BourseV1Error::InvalidPrice);
        }

        // Conflict and funds checks plus the reservation, atomic for the buyer. Nothing after
        // this point can fail, so the reservation never needs rolling back.
        self.ledger
            .prepare_buy(trader_id, stock_id, price * amount as f64)?;

        let mut order = Order::buy(trader_id, stock_id, price, amount);
        order.id = stock.book.next_order_id();
        let buyer_name = self.display_name(trader_id);
        debug!(
            "EXCHANGE: Accepted buy {} {} at {} from {}",
            amount, stock_id, price, trader_id
        );

        let mut fills: Vec<Transaction> = Vec::new();
        for counter_id in stock.book.crossing_orders(Side::Buy, price) {
            if order.amount == 0 {
                break;
            }
            let Some(counter) = stock.book.get_mut(counter_id) else {
                unreachable!("crossing candidate left the book mid-walk")
            };

            // The fill executes at the resting order's price, the price that was quoted.
            let quantity = order.amount.min(counter.amount);
            let fill_price = counter.price;
            let cost = fill_price * quantity as f64;
            let seller_id = counter.trader_id.clone();
            counter.amount -= quantity;
            let counter_done = counter.amount == 0;

            order.amount -= quantity;
            // Earmark released at the aggressor's limit, not the executed price; the final fill
            // releases the whole remainder so the reservation lands on exactly 0.
            let release = if order.amount == 0 {
                order.reserved
            } else {
                order.price * quantity as f64
            };
            order.reserved -= release;

            self.ledger
                .settle_buy_fill(trader_id, stock_id, cost, release, quantity);
            self.ledger
                .settle_sell_fill(&seller_id, stock_id, cost, quantity);

            if counter_done {
                stock.book.delete_order(counter_id);
                self.ledger
                    .clear_open_order(&seller_id, stock_id, Side::Sell);
            }

            let tx = Transaction {
                id: self.next_transaction_id(),
                buyer_id: trader_id.to_string(),
                buyer_name: buyer_name.clone(),
                seller_id: seller_id.clone(),
                seller_name: self.display_name(&seller_id),
                stock_id: stock_id.to_string(),
                price: fill_price,
                amount: quantity,
                total: cost,
                date: now(),
            };
            info!(
                "EXCHANGE: Matched {} {} at {} between buyer {} and seller {}",
                quantity, stock_id, fill_price, trader_id, seller_id
            );

            stock.set_last_trade_price(fill_price);
            stock.append_transaction(tx.clone());
            self.ledger.record_transaction(trader_id, tx.clone());
            self.ledger.record_transaction(&seller_id, tx.clone());
            fills.push(tx);
        }

        if order.amount > 0 {
            self.ledger
                .set_open_order(trader_id, stock_id, Side::Buy, order.id);
            stock.book.insert_order(order.clone());
            debug!(
                "EXCHANGE: Resting buy {} {} at {} from {}",
                order.amount, stock_id, price, trader_id
            );
        }
        if !fills.is_empty() {
            stock.resync_quote(EXCHANGE_ACCOUNT);
        }

        Ok(OrderReceipt { order, fills })
    }

    pub fn place_sell_order(
        &self,
        trader_id: &str,
        stock_id: &str,
        price: f64,
        amount: u64,
    ) -> Result<OrderReceipt, BourseV1Error> {
        if !self.ledger.contains(trader_id) {
            return Err(BourseV1Error::UnknownTrader);
        }
        let Some(mut stock) = self.catalog.get_mut(stock_id) else {
            return Err(BourseV1Error::UnknownStock);
        };
        if amount == 0 {
            return Err(BourseV1Error::InvalidAmount);
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(BourseV1Error::InvalidPrice);
        }

        // Holdings on this symbol only move under the entry guard held above, so the check
        // cannot go stale before the fills below consume from them.
        self.ledger.prepare_sell(trader_id, stock_id, amount)?;

        let mut order = Order::sell(trader_id, stock_id, price, amount);
        order.id = stock.book.next_order_id();
        let seller_name = self.display_name(trader_id);
        debug!(
            "EXCHANGE: Accepted sell {} {} at {} from {}",
            amount, stock_id, price, trader_id
        );

        let mut fills: Vec<Transaction> = Vec::new();
        for counter_id in stock.book.crossing_orders(Side::Sell, price) {
            if order.amount == 0 {
                break;
            }
            let Some(counter) = stock.book.get_mut(counter_id) else {
                unreachable!("crossing candidate left the book mid-walk")
            };

            let quantity = order.amount.min(counter.amount);
            let fill_price = counter.price;
            let cost = fill_price * quantity as f64;
            let buyer_id = counter.trader_id.clone();
            counter.amount -= quantity;
            let counter_done = counter.amount == 0;
            // A resting buy fills at its own limit, so the earmark release equals the cost,
            // except on the final fill which releases the whole remainder.
            let release = if counter_done { counter.reserved } else { cost };
            counter.reserved -= release;

            order.amount -= quantity;

            self.ledger
                .settle_buy_fill(&buyer_id, stock_id, cost, release, quantity);
            self.ledger
                .settle_sell_fill(trader_id, stock_id, cost, quantity);

            if counter_done {
                stock.book.delete_order(counter_id);
                self.ledger.clear_open_order(&buyer_id, stock_id, Side::Buy);
            }

            let tx = Transaction {
                id: self.next_transaction_id(),
                buyer_id: buyer_id.clone(),
                buyer_name: self.display_name(&buyer_id),
                seller_id: trader_id.to_string(),
                seller_name: seller_name.clone(),
                stock_id: stock_id.to_string(),
                price: fill_price,
                amount: quantity,
                total: cost,
                date: now(),
            };
            info!(
                "EXCHANGE: Matched {} {} at {} between buyer {} and seller {}",
                quantity, stock_id, fill_price, buyer_id, trader_id
            );

            stock.set_last_trade_price(fill_price);
            stock.append_transaction(tx.clone());
            self.ledger.record_transaction(&buyer_id, tx.clone());
            self.ledger.record_transaction(trader_id, tx.clone());
            fills.push(tx);
        }

        if order.amount > 0 {
            self.ledger
                .set_open_order(trader_id, stock_id, Side::Sell, order.id);
            stock.book.insert_order(order.clone());
            debug!(
                "EXCHANGE: Resting sell {} {} at {} from {}",
                order.amount, stock_id, price, trader_id
            );
        }
        if !fills.is_empty() {
            stock.resync_quote(EXCHANGE_ACCOUNT);
        }

        Ok(OrderReceipt { order, fills })
    }

    pub fn cancel_buy_order(
        &self,
        trader_id: &str,
        stock_id: &str,
    ) -> Result<Order, BourseV1Error> {
        if !self.ledger.contains(trader_id) {
            return Err(BourseV1Error::UnknownTrader);
        }
        let Some(mut stock) = self.catalog.get_mut(stock_id) else {
            return Err(BourseV1Error::UnknownStock);
        };
        let Some(order) = stock.book.remove_by_trader(trader_id, Side::Buy) else {
            return Err(BourseV1Error::UnknownOrder);
        };
        // The earmark is exactly the reservation still backing this order.
        self.ledger
            .release_buy_order(trader_id, stock_id, order.reserved);
        info!(
            "EXCHANGE: Cancelled buy {} {} at {} from {}",
            order.amount, stock_id, order.price, trader_id
        );
        Ok(order)
    }

    pub fn cancel_sell_order(
        &self,
        trader_id: &str,
        stock_id: &str,
    ) -> Result<Order, BourseV1Error> {
        if !self.ledger.contains(trader_id) {
            return Err(BourseV1Error::UnknownTrader);
        }
        let Some(mut stock) = self.catalog.get_mut(stock_id) else {
            return Err(BourseV1Error::UnknownStock);
        };
        let Some(order) = stock.book.remove_by_trader(trader_id, Side::Sell) else {
            return Err(BourseV1Error::UnknownOrder);
        };
        // Sells reserve nothing, so there is nothing to release.
        self.ledger.clear_open_order(trader_id, stock_id, Side::Sell);
        info!(
            "EXCHANGE: Cancelled sell {} {} at {} from {}",
            order.amount, stock_id, order.price, trader_id
        );
        Ok(order)
    }

    /// Applies one feed step to every stock, each under its own entry guard, and re-syncs the
    /// inventory account's standing sell to the new reference price.
    pub fn tick_prices(&self, feed: &PriceFeed) {
        for stock_id in self.catalog.ids() {
            if let Some(mut stock) = self.catalog.get_mut(&stock_id) {
                let previous = stock.price;
                let next = feed.next_price(previous);
                stock.price = next;
                stock.resync_quote(EXCHANGE_ACCOUNT);
                debug!("FEED: Repriced {} from {} to {}", stock_id, previous, next);
            }
        }
    }

    pub fn list_stocks(&self) -> Vec<StockSnapshot> {
        self.catalog
            .ids()
            .iter()
            .filter_map(|stock_id| self.get_stock(stock_id))
            .collect()
    }

    pub fn get_stock(&self, stock_id: &str) -> Option<StockSnapshot> {
        let stock = self.catalog.get(stock_id)?;
        let open_orders = stock.book.orders();
        let transactions: Vec<Transaction> = stock.transactions.into_iter().collect();
        Some(StockSnapshot {
            id: stock.id,
            name: stock.name,
            price: stock.price,
            amount: stock.amount,
            open_orders,
            transactions,
        })
    }

    pub fn list_traders(&self) -> Vec<TraderSnapshot> {
        self.ledger
            .all()
            .into_iter()
            .map(|trader| self.snapshot_trader(trader))
            .collect()
    }

    pub fn trader_names(&self) -> Vec<String> {
        self.ledger
            .all()
            .into_iter()
            .map(|trader| trader.name)
            .collect()
    }

    pub fn get_trader(&self, trader_id: &str) -> Option<TraderSnapshot> {
        let trader = self.ledger.get(trader_id)?;
        Some(self.snapshot_trader(trader))
    }

    /// The trailing `limit` transactions for a trader, oldest first.
    pub fn last_transactions(&self, trader_id: &str, limit: usize) -> Option<Vec<Transaction>> {
        let trader = self.ledger.get(trader_id)?;
        let skip = trader.transactions.len().saturating_sub(limit);
        Some(trader.transactions.into_iter().skip(skip).collect())
    }

    // Joins the trader's order-id maps against the books. The ledger guard is already released
    // here and book entries are taken one at a time, so a map entry can briefly point at an
    // order that has just filled; those are skipped rather than holding two guards at once.
    fn snapshot_trader(&self, trader: Trader) -> TraderSnapshot {
        let mut buy_orders = Vec::new();
        for (stock_id, order_id) in &trader.buy_orders {
            if let Some(order) = self.catalog.find_order(stock_id, *order_id) {
                buy_orders.push(order);
            }
        }
        let mut sell_orders = Vec::new();
        for (stock_id, order_id) in &trader.sell_orders {
            if let Some(order) = self.catalog.find_order(stock_id, *order_id) {
                sell_orders.push(order);
            }
        }
        buy_orders.sort_by(|x, y| x.stock_id.cmp(&y.stock_id));
        sell_orders.sort_by(|x, y| x.stock_id.cmp(&y.stock_id));

        TraderSnapshot {
            id: trader.id,
            name: trader.name,
            cash: trader.cash,
            reserved_funds: trader.reserved_funds,
            holdings: trader.holdings,
            buy_orders,
            sell_orders,
        }
    }

    fn display_name(&self, trader_id: &str) -> String {
        let Some(name) = self.ledger.name_of(trader_id) else {
            unreachable!("trader {} left the ledger mid-operation", trader_id)
        };
        name
    }

    fn next_transaction_id(&self) -> u64 {
        self.last_transaction_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for BourseV1 {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::{BourseV1, BourseV1Error, Side, EXCHANGE_ACCOUNT};
    use crate::feed::PriceFeed;
    use crate::input::demeter::Demeter;

    fn setup() -> BourseV1 {
        BourseV1::from_demeter(&Demeter::sample())
    }

    // Consumes the inventory account's standing sell on BCD so tests can build trader-only
    // books: 200 to Bob, 100 to Carol, 200 to Alice.
    fn drain_inventory_bcd(bourse: &BourseV1) {
        bourse.place_buy_order("2", "BCD", 10.0, 200).unwrap();
        bourse.place_buy_order("3", "BCD", 10.0, 100).unwrap();
        bourse.place_buy_order("1", "BCD", 10.0, 200).unwrap();
    }

    #[test]
    fn test_that_bootstrap_seeds_exchange_inventory() {
        let bourse = setup();

        let inventory = bourse.get_trader(EXCHANGE_ACCOUNT).unwrap();
        assert_eq!(inventory.name, "Stock Market");
        assert_eq!(inventory.cash, 0.0);
        assert_eq!(inventory.holdings.get("ABC").copied(), Some(1000));
        assert_eq!(inventory.holdings.get("BCD").copied(), Some(500));
        assert_eq!(inventory.sell_orders.len(), 2);

        let abc = bourse.get_stock("ABC").unwrap();
        assert_eq!(abc.open_orders.len(), 1);
        assert_eq!(abc.open_orders[0].price, 100.0);
        assert_eq!(abc.open_orders[0].amount, 1000);
        assert_eq!(abc.open_orders[0].trader_id, EXCHANGE_ACCOUNT);
    }

    #[test]
    fn test_that_zero_supply_stock_has_no_standing_sell() {
        let bourse = setup();

        let nil = bourse.get_stock("NIL").unwrap();
        assert!(nil.open_orders.is_empty());

        let inventory = bourse.get_trader(EXCHANGE_ACCOUNT).unwrap();
        assert!(inventory.holdings.get("NIL").is_none());
    }

    #[test]
    #[should_panic]
    fn test_that_bootstrap_rejects_a_non_positive_listing_price() {
        let mut source = Demeter::new();
        source.add_share("BAD", "Bad Listing", 0.0, 100);
        source.add_trader("1", "Alice", 10000.0);

        BourseV1::from_demeter(&source);
    }

    #[test]
    fn test_that_buy_from_inventory_fills_at_reference_price() {
        let bourse = setup();

        let receipt = bourse.place_buy_order("1", "ABC", 100.0, 10).unwrap();

        assert_eq!(receipt.fills.len(), 1);
        assert_eq!(receipt.fills[0].price, 100.0);
        assert_eq!(receipt.fills[0].total, 1000.0);
        assert_eq!(receipt.order.amount, 0);

        let alice = bourse.get_trader("1").unwrap();
        assert_eq!(alice.cash, 9000.0);
        assert_eq!(alice.reserved_funds, 0.0);
        assert_eq!(alice.holdings.get("ABC").copied(), Some(10));

        let inventory = bourse.get_trader(EXCHANGE_ACCOUNT).unwrap();
        assert_eq!(inventory.cash, 1000.0);
        assert_eq!(inventory.holdings.get("ABC").copied(), Some(990));
    }

    #[test]
    fn test_that_aggressive_buy_limit_fills_at_resting_price() {
        let bourse = setup();

        let receipt = bourse.place_buy_order("1", "BCD", 12.0, 10).unwrap();

        // Priced up to 12 but the resting quote was 10, so 10 is what it pays.
        assert_eq!(receipt.fills[0].price, 10.0);

        let alice = bourse.get_trader("1").unwrap();
        assert_eq!(alice.cash, 9900.0);
        assert_eq!(alice.reserved_funds, 0.0);
    }

    #[test]
    fn test_that_partial_fill_rests_the_remainder() {
        let bourse = setup();
        bourse.place_buy_order("2", "BCD", 10.0, 500).unwrap();
        bourse.place_sell_order("2", "BCD", 10.0, 5).unwrap();

        let receipt = bourse.place_buy_order("1", "BCD", 10.0, 8).unwrap();

        assert_eq!(receipt.fills.len(), 1);
        assert_eq!(receipt.fills[0].amount, 5);
        assert_eq!(receipt.fills[0].total, 50.0);
        assert_eq!(receipt.order.amount, 3);

        let alice = bourse.get_trader("1").unwrap();
        assert_eq!(alice.cash, 9950.0);
        assert_eq!(alice.reserved_funds, 30.0);
        assert_eq!(alice.holdings.get("BCD").copied(), Some(5));
        assert_eq!(alice.buy_orders.len(), 1);
        assert_eq!(alice.buy_orders[0].amount, 3);

        // Bob's sell is gone from every index.
        let bob = bourse.get_trader("2").unwrap();
        assert!(bob.sell_orders.is_empty());
        assert_eq!(bob.cash, 50.0);
        assert_eq!(bob.holdings.get("BCD").copied(), Some(495));

        let bcd = bourse.get_stock("BCD").unwrap();
        assert_eq!(bcd.open_orders.len(), 1);
        assert_eq!(bcd.open_orders[0].trader_id, "1");
    }

    #[test]
    fn test_that_consumed_inventory_sell_is_not_reseeded() {
        let bourse = setup();

        bourse.place_buy_order("2", "BCD", 10.0, 500).unwrap();

        let bcd = bourse.get_stock("BCD").unwrap();
        assert!(bcd.open_orders.is_empty());

        let inventory = bourse.get_trader(EXCHANGE_ACCOUNT).unwrap();
        assert!(inventory.holdings.get("BCD").is_none());
        assert_eq!(inventory.sell_orders.len(), 1);

        // The tick re-syncs standing quotes but never replenishes one.
        bourse.tick_prices(&PriceFeed::new());
        assert!(bourse.get_stock("BCD").unwrap().open_orders.is_empty());
    }

    #[test]
    fn test_that_buy_fills_cheapest_sell_first() {
        let bourse = setup();
        drain_inventory_bcd(&bourse);
        bourse.place_sell_order("2", "BCD", 9.0, 10).unwrap();
        bourse.place_sell_order("3", "BCD", 9.5, 10).unwrap();
        bourse.place_sell_order("1", "BCD", 8.5, 10).unwrap();

        let receipt = bourse.place_buy_order("4", "BCD", 9.6, 25).unwrap();

        let prices: Vec<f64> = receipt.fills.iter().map(|tx| tx.price).collect();
        assert_eq!(prices, vec![8.5, 9.0, 9.5]);
        let sellers: Vec<&str> = receipt.fills.iter().map(|tx| tx.seller_id.as_str()).collect();
        assert_eq!(sellers, vec!["1", "2", "3"]);

        let dan = bourse.get_trader("4").unwrap();
        assert_eq!(dan.cash, 7777.5);
        assert_eq!(dan.reserved_funds, 0.0);
        assert_eq!(dan.holdings.get("BCD").copied(), Some(25));

        // Carol's sell was only partially consumed and stays on the book.
        let carol = bourse.get_trader("3").unwrap();
        assert_eq!(carol.sell_orders.len(), 1);
        assert_eq!(carol.sell_orders[0].amount, 5);

        assert_eq!(bourse.get_stock("BCD").unwrap().price, 9.5);
    }

    #[test]
    fn test_that_sell_fills_highest_bid_first() {
        let bourse = setup();
        bourse.place_buy_order("2", "BCD", 9.0, 10).unwrap();
        bourse.place_buy_order("3", "BCD", 9.5, 10).unwrap();
        bourse.place_buy_order("1", "BCD", 10.0, 50).unwrap();

        let receipt = bourse.place_sell_order("1", "BCD", 8.0, 15).unwrap();

        let prices: Vec<f64> = receipt.fills.iter().map(|tx| tx.price).collect();
        assert_eq!(prices, vec![9.5, 9.0]);

        let alice = bourse.get_trader("1").unwrap();
        assert_eq!(alice.cash, 9640.0);
        assert_eq!(alice.holdings.get("BCD").copied(), Some(35));

        // Carol's bid filled whole: reservation lands on exactly 0.
        let carol = bourse.get_trader("3").unwrap();
        assert_eq!(carol.reserved_funds, 0.0);
        assert_eq!(carol.holdings.get("BCD").copied(), Some(10));

        // Bob's bid filled for 5 of 10: the earmark shrinks by exactly the cost.
        let bob = bourse.get_trader("2").unwrap();
        assert_eq!(bob.reserved_funds, 45.0);
        assert_eq!(bob.buy_orders[0].amount, 5);

        assert_eq!(bourse.get_stock("BCD").unwrap().price, 9.0);
    }

    #[test]
    fn test_that_trades_move_the_reference_price_and_resync_the_quote() {
        let bourse = setup();
        bourse.place_buy_order("1", "BCD", 9.7, 20).unwrap();
        bourse.place_buy_order("2", "BCD", 10.0, 100).unwrap();

        bourse.place_sell_order("2", "BCD", 9.0, 20).unwrap();

        let bcd = bourse.get_stock("BCD").unwrap();
        assert_eq!(bcd.price, 9.7);

        // The inventory account's standing sell follows the reference price immediately, not on
        // the next feed tick.
        let standing = bcd
            .open_orders
            .iter()
            .find(|order| order.trader_id == EXCHANGE_ACCOUNT)
            .unwrap();
        assert_eq!(standing.price, 9.7);
        assert_eq!(standing.amount, 400);
    }

    #[test]
    fn test_that_full_fill_clears_reservation_exactly() {
        let bourse = setup();
        bourse.place_buy_order("1", "BCD", 5.0, 10).unwrap();
        assert_eq!(bourse.get_trader("1").unwrap().reserved_funds, 50.0);
        bourse.place_buy_order("2", "BCD", 10.0, 100).unwrap();

        let receipt = bourse.place_sell_order("2", "BCD", 4.5, 10).unwrap();

        // The resting bid's price wins even though the seller asked less.
        assert_eq!(receipt.fills[0].price, 5.0);

        let alice = bourse.get_trader("1").unwrap();
        assert_eq!(alice.reserved_funds, 0.0);
        assert_eq!(alice.cash, 9950.0);
        assert_eq!(alice.holdings.get("BCD").copied(), Some(10));
        assert!(alice.buy_orders.is_empty());
    }

    #[test]
    fn test_that_cancel_buy_releases_exactly_the_reservation() {
        let bourse = setup();
        bourse.place_buy_order("1", "BCD", 5.0, 10).unwrap();

        let cancelled = bourse.cancel_buy_order("1", "BCD").unwrap();
        assert_eq!(cancelled.amount, 10);
        assert_eq!(cancelled.price, 5.0);

        let alice = bourse.get_trader("1").unwrap();
        assert_eq!(alice.reserved_funds, 0.0);
        assert_eq!(alice.cash, 10000.0);
        assert!(alice.buy_orders.is_empty());

        let bcd = bourse.get_stock("BCD").unwrap();
        assert!(bcd.open_orders.iter().all(|order| order.trader_id != "1"));

        assert!(matches!(
            bourse.cancel_buy_order("1", "BCD"),
            Err(BourseV1Error::UnknownOrder)
        ));
    }

    #[test]
    fn test_that_cancel_sell_releases_nothing() {
        let bourse = setup();
        bourse.place_buy_order("2", "BCD", 10.0, 100).unwrap();
        bourse.place_sell_order("2", "BCD", 11.0, 10).unwrap();

        let cancelled = bourse.cancel_sell_order("2", "BCD").unwrap();
        assert_eq!(cancelled.amount, 10);

        let bob = bourse.get_trader("2").unwrap();
        assert_eq!(bob.cash, 4000.0);
        assert_eq!(bob.reserved_funds, 0.0);
        assert_eq!(bob.holdings.get("BCD").copied(), Some(100));
        assert!(bob.sell_orders.is_empty());
    }

    #[test]
    fn test_that_rejected_buy_leaves_no_trace() {
        let bourse = setup();

        let res = bourse.place_buy_order("3", "BCD", 10.0, 250);
        assert!(matches!(res, Err(BourseV1Error::InsufficientFunds)));

        let carol = bourse.get_trader("3").unwrap();
        assert_eq!(carol.cash, 2000.0);
        assert_eq!(carol.reserved_funds, 0.0);
        assert!(carol.buy_orders.is_empty());

        let bcd = bourse.get_stock("BCD").unwrap();
        assert_eq!(bcd.open_orders.len(), 1);
        assert!(bcd.transactions.is_empty());
        assert!(bourse.last_transactions("3", 8).unwrap().is_empty());
    }

    #[test]
    fn test_that_funds_check_counts_existing_reservations() {
        let bourse = setup();

        // 1000 of Carol's 2000 is reserved behind a resting bid on ABC.
        bourse.place_buy_order("3", "ABC", 10.0, 100).unwrap();
        assert!(matches!(
            bourse.place_buy_order("3", "BCD", 10.0, 150),
            Err(BourseV1Error::InsufficientFunds)
        ));

        // A fill on BCD releases only the BCD earmark; the ABC reservation survives.
        bourse.place_buy_order("3", "BCD", 10.0, 90).unwrap();
        let carol = bourse.get_trader("3").unwrap();
        assert_eq!(carol.reserved_funds, 1000.0);
        assert_eq!(carol.cash, 1100.0);
    }

    #[test]
    fn test_that_conflicting_sell_blocks_buy() {
        let bourse = setup();
        bourse.place_buy_order("2", "BCD", 10.0, 100).unwrap();
        bourse.place_sell_order("2", "BCD", 11.0, 10).unwrap();

        assert!(matches!(
            bourse.place_buy_order("2", "BCD", 10.0, 5),
            Err(BourseV1Error::ConflictingSellOrder)
        ));
    }

    #[test]
    fn test_that_conflicting_buy_blocks_sell() {
        let bourse = setup();
        bourse.place_buy_order("1", "BCD", 5.0, 10).unwrap();

        // Rejected on the conflict before holdings are even looked at.
        assert!(matches!(
            bourse.place_sell_order("1", "BCD", 20.0, 5),
            Err(BourseV1Error::ConflictingBuyOrder)
        ));
    }

    #[test]
    fn test_that_second_order_on_the_same_side_is_rejected() {
        let bourse = setup();
        bourse.place_buy_order("1", "BCD", 5.0, 10).unwrap();
        assert!(matches!(
            bourse.place_buy_order("1", "BCD", 6.0, 5),
            Err(BourseV1Error::ConflictingBuyOrder)
        ));

        bourse.place_buy_order("2", "BCD", 10.0, 100).unwrap();
        bourse.place_sell_order("2", "BCD", 11.0, 10).unwrap();
        assert!(matches!(
            bourse.place_sell_order("2", "BCD", 12.0, 5),
            Err(BourseV1Error::ConflictingSellOrder)
        ));
    }

    #[test]
    fn test_that_inventory_account_cannot_cross_its_own_quote() {
        let bourse = setup();

        assert!(matches!(
            bourse.place_buy_order(EXCHANGE_ACCOUNT, "ABC", 100.0, 1),
            Err(BourseV1Error::ConflictingSellOrder)
        ));
    }

    #[test]
    fn test_that_invalid_amount_and_price_are_rejected() {
        let bourse = setup();

        assert!(matches!(
            bourse.place_buy_order("1", "ABC", 100.0, 0),
            Err(BourseV1Error::InvalidAmount)
        ));
        assert!(matches!(
            bourse.place_sell_order("1", "ABC", 100.0, 0),
            Err(BourseV1Error::InvalidAmount)
        ));
        assert!(matches!(
            bourse.place_buy_order("1", "ABC", 0.0, 1),
            Err(BourseV1Error::InvalidPrice)
        ));
        assert!(matches!(
            bourse.place_buy_order("1", "ABC", f64::NAN, 1),
            Err(BourseV1Error::InvalidPrice)
        ));
    }

    #[test]
    fn test_that_unknown_trader_or_stock_is_rejected() {
        let bourse = setup();

        assert!(matches!(
            bourse.place_buy_order("99", "ABC", 100.0, 1),
            Err(BourseV1Error::UnknownTrader)
        ));
        assert!(matches!(
            bourse.place_buy_order("1", "ZZZ", 100.0, 1),
            Err(BourseV1Error::UnknownStock)
        ));
        assert!(matches!(
            bourse.cancel_buy_order("99", "ABC"),
            Err(BourseV1Error::UnknownTrader)
        ));
        assert!(matches!(
            bourse.cancel_sell_order("1", "ZZZ"),
            Err(BourseV1Error::UnknownStock)
        ));
        assert!(bourse.get_stock("ZZZ").is_none());
        assert!(bourse.get_trader("99").is_none());
        assert!(bourse.last_transactions("99", 8).is_none());
    }

    #[test]
    fn test_that_sell_without_holdings_is_rejected() {
        let bourse = setup();

        assert!(matches!(
            bourse.place_sell_order("3", "BCD", 10.0, 5),
            Err(BourseV1Error::InsufficientHoldings)
        ));

        bourse.place_buy_order("2", "BCD", 10.0, 10).unwrap();
        assert!(matches!(
            bourse.place_sell_order("2", "BCD", 10.0, 50),
            Err(BourseV1Error::InsufficientHoldings)
        ));
    }

    #[test]
    fn test_that_cash_is_conserved_across_trading() {
        let bourse = setup();
        let total_cash: f64 = bourse.list_traders().iter().map(|t| t.cash).sum();

        bourse.place_buy_order("2", "BCD", 10.0, 100).unwrap();
        bourse.place_buy_order("1", "BCD", 10.0, 50).unwrap();
        bourse.place_sell_order("2", "BCD", 9.0, 30).unwrap();
        bourse.place_buy_order("1", "BCD", 9.0, 30).unwrap();
        bourse.place_buy_order("3", "BCD", 10.0, 20).unwrap();

        let after: Vec<_> = bourse.list_traders();
        let cash_now: f64 = after.iter().map(|t| t.cash).sum();
        assert_eq!(cash_now, total_cash);

        let held: u64 = after
            .iter()
            .filter_map(|t| t.holdings.get("BCD"))
            .sum();
        assert_eq!(held, 500);

        for trader in &after {
            assert!(trader.cash >= 0.0);
            assert!(trader.reserved_funds >= 0.0);
            assert!(trader.reserved_funds <= trader.cash);
        }
    }

    #[test]
    fn test_that_partial_resting_counter_keeps_time_priority() {
        let bourse = setup();
        drain_inventory_bcd(&bourse);
        bourse.place_sell_order("2", "BCD", 9.0, 20).unwrap();
        bourse.place_sell_order("3", "BCD", 9.0, 10).unwrap();

        let first = bourse.place_buy_order("4", "BCD", 9.0, 5).unwrap();
        assert_eq!(first.fills[0].seller_id, "2");

        // A partial fill does not forfeit Bob's place in the queue.
        let second = bourse.place_buy_order("4", "BCD", 9.0, 10).unwrap();
        assert_eq!(second.fills.len(), 1);
        assert_eq!(second.fills[0].seller_id, "2");

        let carol = bourse.get_trader("3").unwrap();
        assert_eq!(carol.sell_orders[0].amount, 10);
    }

    #[test]
    fn test_that_last_transactions_returns_the_trailing_eight() {
        let bourse = setup();

        let mut ids = Vec::new();
        for _ in 0..10 {
            let receipt = bourse.place_buy_order("2", "BCD", 10.0, 1).unwrap();
            ids.push(receipt.fills[0].id);
        }

        let last = bourse.last_transactions("2", 8).unwrap();
        let last_ids: Vec<u64> = last.iter().map(|tx| tx.id).collect();
        assert_eq!(last_ids, ids[2..].to_vec());
    }

    #[test]
    fn test_that_stock_history_is_bounded() {
        let bourse = setup();

        let mut ids = Vec::new();
        for _ in 0..12 {
            let receipt = bourse.place_buy_order("2", "BCD", 10.0, 1).unwrap();
            ids.push(receipt.fills[0].id);
        }

        let bcd = bourse.get_stock("BCD").unwrap();
        assert_eq!(bcd.transactions.len(), 10);
        assert_eq!(bcd.transactions[0].id, ids[2]);
    }

    #[test]
    fn test_that_receipt_reports_a_resting_order() {
        let bourse = setup();

        let receipt = bourse.place_buy_order("1", "BCD", 5.0, 10).unwrap();

        assert!(receipt.fills.is_empty());
        assert_eq!(receipt.order.amount, 10);
        assert_eq!(receipt.order.side, Side::Buy);
        // The inventory account's seed order drew id 0 on this book.
        assert_eq!(receipt.order.id, 1);
    }

    #[test]
    fn test_that_tick_prices_stays_in_bounds_and_resyncs_quotes() {
        let bourse = setup();
        let before: Vec<_> = bourse.list_stocks();

        bourse.tick_prices(&PriceFeed::new());

        for old in before {
            let new = bourse.get_stock(&old.id).unwrap();
            assert!(new.price >= 1.0);
            assert!(new.price >= old.price * 0.95 - 0.01);
            assert!(new.price <= old.price * 1.05 + 0.01);

            if let Some(standing) = new
                .open_orders
                .iter()
                .find(|order| order.trader_id == EXCHANGE_ACCOUNT)
            {
                assert_eq!(standing.price, new.price);
            }
        }
    }
}
