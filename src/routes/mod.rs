pub mod relay;

pub use relay::{create_app, create_relay_router};
