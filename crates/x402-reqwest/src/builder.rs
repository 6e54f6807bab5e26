use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

use crate::client::X402Client;

/// Attaches an [`X402Client`] to a reqwest client as middleware.
///
/// On a [`Client`] this yields a [`rqm::ClientBuilder`] ready for more middleware or `build()`.
/// On a [`ClientBuilder`] the inner client is built first, which can fail.
pub trait ReqwestWithPayments<S> {
    type Output;

    fn with_payments(self, x402_client: X402Client<S>) -> Self::Output;
}

impl<S> ReqwestWithPayments<S> for Client
where
    X402Client<S>: rqm::Middleware,
{
    type Output = rqm::ClientBuilder;

    fn with_payments(self, x402_client: X402Client<S>) -> Self::Output {
        rqm::ClientBuilder::new(self).with(x402_client)
    }
}

impl<S> ReqwestWithPayments<S> for ClientBuilder
where
    X402Client<S>: rqm::Middleware,
{
    type Output = Result<rqm::ClientBuilder, reqwest::Error>;

    fn with_payments(self, x402_client: X402Client<S>) -> Self::Output {
        let client = self.build()?;
        Ok(rqm::ClientBuilder::new(client).with(x402_client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_builder_variant_builds_inner_client() {
        let builder = ClientBuilder::new().timeout(Duration::from_secs(5));
        assert!(builder.with_payments(X402Client::new()).is_ok());
    }
}
