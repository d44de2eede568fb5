use mockall::mock;
use mpesa_tools::{ChargeAcknowledgement, ChargeInitiator, MpesaApiError};
use mpg_common::Money;
use mpg_engine::{
    db_types::{ChargeRequest, NewChargeRequest, NewOrder, NewPayment, Order, OrderId, OrderItem, Payment},
    order_objects::OrderQueryFilter,
    LedgerError,
    OrderLedger,
    SettleResult,
};

mock! {
    pub Ledger {}
    impl Clone for Ledger {
        fn clone(&self) -> Self;
    }
    impl OrderLedger for Ledger {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError>;
        async fn fetch_order_by_gateway_reference(&self, gateway_reference: &str) -> Result<Option<Order>, LedgerError>;
        async fn fetch_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, LedgerError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, LedgerError>;
        async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, LedgerError>;
        async fn record_charge_request(&self, request: NewChargeRequest) -> Result<ChargeRequest, LedgerError>;
        async fn settle_order(&self, payment: NewPayment) -> Result<SettleResult, LedgerError>;
    }
}

mock! {
    pub Charger {}
    impl ChargeInitiator for Charger {
        async fn initiate_charge(
            &self,
            account_reference: &str,
            amount: Money,
            phone: &str,
        ) -> Result<ChargeAcknowledgement, MpesaApiError>;
    }
}
