use actix_web::ResponseError;
use serde::{Deserialize, Serialize};

use crate::exchange::bourse_v1::{
    BourseV1, BourseV1Error, Order, StockSnapshot, TraderSnapshot, Transaction,
};
use crate::input::demeter::Demeter;

/// How many of a trader's trailing transactions the dedicated route reports.
pub const LAST_TRANSACTIONS: usize = 8;

pub struct AppState {
    pub bourse: BourseV1,
    pub dataset: String,
}

impl AppState {
    pub fn single(name: &str, data: Demeter) -> Self {
        Self {
            bourse: BourseV1::from_demeter(&data),
            dataset: name.into(),
        }
    }
}

// No outer lock: the exchange serializes per symbol internally, so handlers share the state
// immutably and submissions on different stocks run in parallel.
pub type BourseState = AppState;

impl ResponseError for BourseV1Error {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            BourseV1Error::UnknownTrader => actix_web::http::StatusCode::NOT_FOUND,
            BourseV1Error::UnknownStock => actix_web::http::StatusCode::NOT_FOUND,
            BourseV1Error::UnknownOrder => actix_web::http::StatusCode::NOT_FOUND,
            BourseV1Error::InvalidAmount => actix_web::http::StatusCode::BAD_REQUEST,
            BourseV1Error::InvalidPrice => actix_web::http::StatusCode::BAD_REQUEST,
            BourseV1Error::ConflictingBuyOrder => actix_web::http::StatusCode::BAD_REQUEST,
            BourseV1Error::ConflictingSellOrder => actix_web::http::StatusCode::BAD_REQUEST,
            BourseV1Error::InsufficientFunds => actix_web::http::StatusCode::BAD_REQUEST,
            BourseV1Error::InsufficientHoldings => actix_web::http::StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub dataset: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ListStocksResponse {
    pub stocks: Vec<StockSnapshot>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ListTradersResponse {
    pub traders: Vec<TraderSnapshot>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TraderNamesResponse {
    pub trader_names: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LastTransactionsResponse {
    pub trader_id: String,
    pub last_transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PlaceOrderRequest {
    pub trader_id: String,
    pub stock_id: String,
    pub price: f64,
    pub amount: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PlaceOrderResponse {
    pub order: Order,
    pub fills: Vec<Transaction>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CancelOrderRequest {
    pub trader_id: String,
    pub stock_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CancelOrderResponse {
    pub order: Order,
}

pub mod server {
    use actix_web::{get, post, web};

    use super::{
        BourseState, CancelOrderRequest, CancelOrderResponse, InfoResponse,
        LastTransactionsResponse, ListStocksResponse, ListTradersResponse, PlaceOrderRequest,
        PlaceOrderResponse, TraderNamesResponse, LAST_TRANSACTIONS,
    };
    use crate::exchange::bourse_v1::{BourseV1Error, StockSnapshot, TraderSnapshot};

    #[get("/info")]
    pub async fn info(app: web::Data<BourseState>) -> Result<web::Json<InfoResponse>, BourseV1Error> {
        Ok(web::Json(InfoResponse {
            version: "v1".to_string(),
            dataset: app.dataset.clone(),
        }))
    }

    #[get("/stocks")]
    pub async fn list_stocks(
        app: web::Data<BourseState>,
    ) -> Result<web::Json<ListStocksResponse>, BourseV1Error> {
        Ok(web::Json(ListStocksResponse {
            stocks: app.bourse.list_stocks(),
        }))
    }

    #[get("/stock/{stock_id}")]
    pub async fn get_stock(
        app: web::Data<BourseState>,
        path: web::Path<(String,)>,
    ) -> Result<web::Json<StockSnapshot>, BourseV1Error> {
        let (stock_id,) = path.into_inner();

        if let Some(stock) = app.bourse.get_stock(&stock_id) {
            Ok(web::Json(stock))
        } else {
            Err(BourseV1Error::UnknownStock)
        }
    }

    #[get("/traders")]
    pub async fn list_traders(
        app: web::Data<BourseState>,
    ) -> Result<web::Json<ListTradersResponse>, BourseV1Error> {
        Ok(web::Json(ListTradersResponse {
            traders: app.bourse.list_traders(),
        }))
    }

    #[get("/trader-names")]
    pub async fn trader_names(
        app: web::Data<BourseState>,
    ) -> Result<web::Json<TraderNamesResponse>, BourseV1Error> {
        Ok(web::Json(TraderNamesResponse {
            trader_names: app.bourse.trader_names(),
        }))
    }

    #[get("/trader/{trader_id}")]
    pub async fn get_trader(
        app: web::Data<BourseState>,
        path: web::Path<(String,)>,
    ) -> Result<web::Json<TraderSnapshot>, BourseV1Error> {
        let (trader_id,) = path.into_inner();

        if let Some(trader) = app.bourse.get_trader(&trader_id) {
            Ok(web::Json(trader))
        } else {
            Err(BourseV1Error::UnknownTrader)
        }
    }

    #[get("/trader/{trader_id}/last_transactions")]
    pub async fn last_transactions(
        app: web::Data<BourseState>,
        path: web::Path<(String,)>,
    ) -> Result<web::Json<LastTransactionsResponse>, BourseV1Error> {
        let (trader_id,) = path.into_inner();

        if let Some(last_transactions) = app.bourse.last_transactions(&trader_id, LAST_TRANSACTIONS)
        {
            Ok(web::Json(LastTransactionsResponse {
                trader_id,
                last_transactions,
            }))
        } else {
            Err(BourseV1Error::UnknownTrader)
        }
    }

    #[post("/place_buy_order")]
    pub async fn place_buy_order(
        app: web::Data<BourseState>,
        order: web::Json<PlaceOrderRequest>,
    ) -> Result<web::Json<PlaceOrderResponse>, BourseV1Error> {
        let receipt = app.bourse.place_buy_order(
            &order.trader_id,
            &order.stock_id,
            order.price,
            order.amount,
        )?;
        Ok(web::Json(PlaceOrderResponse {
            order: receipt.order,
            fills: receipt.fills,
        }))
    }

    #[post("/place_sell_order")]
    pub async fn place_sell_order(
        app: web::Data<BourseState>,
        order: web::Json<PlaceOrderRequest>,
    ) -> Result<web::Json<PlaceOrderResponse>, BourseV1Error> {
        let receipt = app.bourse.place_sell_order(
            &order.trader_id,
            &order.stock_id,
            order.price,
            order.amount,
        )?;
        Ok(web::Json(PlaceOrderResponse {
            order: receipt.order,
            fills: receipt.fills,
        }))
    }

    #[post("/cancel_buy_order")]
    pub async fn cancel_buy_order(
        app: web::Data<BourseState>,
        cancel: web::Json<CancelOrderRequest>,
    ) -> Result<web::Json<CancelOrderResponse>, BourseV1Error> {
        let order = app
            .bourse
            .cancel_buy_order(&cancel.trader_id, &cancel.stock_id)?;
        Ok(web::Json(CancelOrderResponse { order }))
    }

    #[post("/cancel_sell_order")]
    pub async fn cancel_sell_order(
        app: web::Data<BourseState>,
        cancel: web::Json<CancelOrderRequest>,
    ) -> Result<web::Json<CancelOrderResponse>, BourseV1Error> {
        let order = app
            .bourse
            .cancel_sell_order(&cancel.trader_id, &cancel.stock_id)?;
        Ok(web::Json(CancelOrderResponse { order }))
    }
}

pub mod client {
    use anyhow::Result;

    use super::{
        CancelOrderRequest, CancelOrderResponse, InfoResponse, LastTransactionsResponse,
        ListStocksResponse, ListTradersResponse, PlaceOrderRequest, PlaceOrderResponse,
        TraderNamesResponse,
    };
    use crate::exchange::bourse_v1::{StockSnapshot, TraderSnapshot};

    pub struct HttpClient {
        pub path: String,
        pub client: reqwest::Client,
    }

    impl HttpClient {
        pub async fn info(&self) -> Result<InfoResponse> {
            Ok(self
                .client
                .get(self.path.clone() + "/info")
                .send()
                .await?
                .json::<InfoResponse>()
                .await?)
        }

        pub async fn list_stocks(&self) -> Result<ListStocksResponse> {
            Ok(self
                .client
                .get(self.path.clone() + "/stocks")
                .send()
                .await?
                .json::<ListStocksResponse>()
                .await?)
        }

        pub async fn get_stock(&self, stock_id: &str) -> Result<StockSnapshot> {
            Ok(self
                .client
                .get(self.path.clone() + format!("/stock/{stock_id}").as_str())
                .send()
                .await?
                .json::<StockSnapshot>()
                .await?)
        }

        pub async fn list_traders(&self) -> Result<ListTradersResponse> {
            Ok(self
                .client
                .get(self.path.clone() + "/traders")
                .send()
                .await?
                .json::<ListTradersResponse>()
                .await?)
        }

        pub async fn trader_names(&self) -> Result<TraderNamesResponse> {
            Ok(self
                .client
                .get(self.path.clone() + "/trader-names")
                .send()
                .await?
                .json::<TraderNamesResponse>()
                .await?)
        }

        pub async fn get_trader(&self, trader_id: &str) -> Result<TraderSnapshot> {
            Ok(self
                .client
                .get(self.path.clone() + format!("/trader/{trader_id}").as_str())
                .send()
                .await?
                .json::<TraderSnapshot>()
                .await?)
        }

        pub async fn last_transactions(&self, trader_id: &str) -> Result<LastTransactionsResponse> {
            Ok(self
                .client
                .get(self.path.clone() + format!("/trader/{trader_id}/last_transactions").as_str())
                .send()
                .await?
                .json::<LastTransactionsResponse>()
                .await?)
        }

        pub async fn place_buy_order(
            &self,
            trader_id: &str,
            stock_id: &str,
            price: f64,
            amount: u64,
        ) -> Result<PlaceOrderResponse> {
            let req = PlaceOrderRequest {
                trader_id: trader_id.into(),
                stock_id: stock_id.into(),
                price,
                amount,
            };
            Ok(self
                .client
                .post(self.path.clone() + "/place_buy_order")
                .json(&req)
                .send()
                .await?
                .json::<PlaceOrderResponse>()
                .await?)
        }

        pub async fn place_sell_order(
            &self,
            trader_id: &str,
            stock_id: &str,
            price: f64,
            amount: u64,
        ) -> Result<PlaceOrderResponse> {
            let req = PlaceOrderRequest {
                trader_id: trader_id.into(),
                stock_id: stock_id.into(),
                price,
                amount,
            };
            Ok(self
                .client
                .post(self.path.clone() + "/place_sell_order")
                .json(&req)
                .send()
                .await?
                .json::<PlaceOrderResponse>()
                .await?)
        }

        pub async fn cancel_buy_order(
            &self,
            trader_id: &str,
            stock_id: &str,
        ) -> Result<CancelOrderResponse> {
            let req = CancelOrderRequest {
                trader_id: trader_id.into(),
                stock_id: stock_id.into(),
            };
            Ok(self
                .client
                .post(self.path.clone() + "/cancel_buy_order")
                .json(&req)
                .send()
                .await?
                .json::<CancelOrderResponse>()
                .await?)
        }

        pub async fn cancel_sell_order(
            &self,
            trader_id: &str,
            stock_id: &str,
        ) -> Result<CancelOrderResponse> {
            let req = CancelOrderRequest {
                trader_id: trader_id.into(),
                stock_id: stock_id.into(),
            };
            Ok(self
                .client
                .post(self.path.clone() + "/cancel_sell_order")
                .json(&req)
                .send()
                .await?
                .json::<CancelOrderResponse>()
                .await?)
        }

        pub fn new(path: String) -> Self {
            Self {
                path,
                client: reqwest::Client::new(),
            }
        }
    }
}
