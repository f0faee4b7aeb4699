use cucumber::given;

use crate::cucumber::SubscriptionWorld;

#[given("a fresh gateway")]
async fn fresh_gateway(world: &mut SubscriptionWorld) {
    world.start();
}
