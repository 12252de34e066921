pub mod relay;

pub use relay::{
    OpenAIUpstream, RelayError, RelayMessage, RelayResult, RelaySession, RetryPolicy,
    UpstreamConfig, UpstreamConnector,
};
