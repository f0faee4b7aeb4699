mod setups;
mod steps;
mod subscription_world;

pub use subscription_world::SubscriptionWorld;
