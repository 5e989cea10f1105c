use std::env;
use std::path::Path;
use std::time::Duration;

use actix_web::{web, App, HttpServer};

use bourse::feed::{PriceFeed, DEFAULT_PERIOD_SECS};
use bourse::http::bourse_v1::{
    server::{
        cancel_buy_order, cancel_sell_order, get_stock, get_trader, info, last_transactions,
        list_stocks, list_traders, place_buy_order, place_sell_order, trader_names,
    },
    AppState,
};
use bourse::input::demeter::Demeter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let address: String = args[1].clone();
    let port: u16 = args[2].parse().unwrap();

    let app_state = if let Some(dataset_path) = args.get(3) {
        AppState::single(dataset_path, Demeter::from_file(Path::new(dataset_path)))
    } else {
        AppState::single("SAMPLE", Demeter::sample())
    };

    let bourse_state = web::Data::new(app_state);

    let feed_state = bourse_state.clone();
    tokio::spawn(async move {
        let feed = PriceFeed::new();
        let mut ticker = tokio::time::interval(Duration::from_secs(DEFAULT_PERIOD_SECS));
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            feed_state.bourse.tick_prices(&feed);
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(bourse_state.clone())
            .service(info)
            .service(list_stocks)
            .service(get_stock)
            .service(list_traders)
            .service(trader_names)
            .service(get_trader)
            .service(last_transactions)
            .service(place_buy_order)
            .service(place_sell_order)
            .service(cancel_buy_order)
            .service(cancel_sell_order)
    })
    .bind((address, port))?
    .run()
    .await
}
