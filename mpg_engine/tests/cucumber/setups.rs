use cucumber::given;

use crate::cucumber::{GatewayWorld, PaymentSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut GatewayWorld) {
    let system = PaymentSystem::new().await;
    world.system = Some(system);
}
