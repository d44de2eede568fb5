use cucumber::World;
use log::*;
use mpg_engine::{
    events::EventProducers,
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    OrderApi,
    ReconciliationApi,
    ReconciliationError,
    ReconciliationResult,
    SqliteDatabase,
};
use tokio::time::sleep;

#[derive(Default, Debug, World)]
pub struct GatewayWorld {
    pub system: Option<PaymentSystem>,
    pub last_result: Option<Result<ReconciliationResult, ReconciliationError>>,
}

#[derive(Debug)]
pub struct PaymentSystem {
    pub db_path: String,
    pub orders: OrderApi<SqliteDatabase>,
    pub api: ReconciliationApi<SqliteDatabase>,
}

impl GatewayWorld {
    pub fn orders(&self) -> &OrderApi<SqliteDatabase> {
        &self.system.as_ref().expect("PaymentSystem not initialised").orders
    }

    pub fn api(&self) -> &ReconciliationApi<SqliteDatabase> {
        &self.system.as_ref().expect("PaymentSystem not initialised").api
    }

    pub fn last_result(&self) -> &Result<ReconciliationResult, ReconciliationError> {
        self.last_result.as_ref().expect("No callback has been processed yet")
    }
}

impl PaymentSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 2).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        sleep(std::time::Duration::from_millis(50)).await;
        let orders = OrderApi::new(db.clone());
        let api = ReconciliationApi::new(db, EventProducers::default());
        Self { db_path: url, orders, api }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
