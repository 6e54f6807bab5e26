//! Client-side x402 payment handling for reqwest.
//!
//! Per request the middleware runs a small state machine:
//!
//! ```text
//! send ──► 2xx/3xx/4xx≠402 ──► done
//!   │
//!   └──► 402 ──► pick offer ──► sign ──► resend once ──► 402 ──► PaymentVerificationFailed
//!                                              └──────► anything else ──► done
//! ```
//!
//! There is no retry loop: a refused payment is terminal.

use http::{Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};
use x402_types::proto;
use x402_types::proto::{OriginalJson, SettleResponse, v1, v2};
use x402_types::scheme::client::{
    FirstMatch, PaymentCandidate, PaymentSelector, X402Error, X402SchemeClient,
};
use x402_types::util::Base64Bytes;

/// V2 offers, base64 JSON.
pub static PAYMENT_REQUIRED_HEADER: HeaderName = HeaderName::from_static("payment-required");
/// V2 signed payload.
pub static PAYMENT_SIGNATURE_HEADER: HeaderName = HeaderName::from_static("payment-signature");
/// V1 signed payload.
pub static X_PAYMENT_HEADER: HeaderName = HeaderName::from_static("x-payment");
/// V2 settlement result.
pub static PAYMENT_RESPONSE_HEADER: HeaderName = HeaderName::from_static("payment-response");
/// V1 settlement result.
pub static X_PAYMENT_RESPONSE_HEADER: HeaderName = HeaderName::from_static("x-payment-response");

/// Default bound on building and signing one payment.
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Orchestrates registered scheme clients and payment selection.
///
/// ## Registering Scheme Clients
///
/// ```rust,ignore
/// use x402_reqwest::X402Client;
/// use x402_chain_eip155::V2Eip155ExactClient;
/// use alloy_signer_local::PrivateKeySigner;
///
/// let signer: PrivateKeySigner = "PRIVATE_KEY".parse()?;
/// let client = X402Client::new().register(V2Eip155ExactClient::new(signer));
/// ```
///
/// The registry is fixed once the client is built and only read while handling requests.
pub struct X402Client<TSelector> {
    schemes: ClientSchemes,
    selector: TSelector,
    payment_timeout: Option<Duration>,
}

impl X402Client<FirstMatch> {
    /// A client selecting the first offer any registered scheme can pay.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for X402Client<FirstMatch> {
    fn default() -> Self {
        Self {
            schemes: ClientSchemes::default(),
            selector: FirstMatch,
            payment_timeout: Some(DEFAULT_PAYMENT_TIMEOUT),
        }
    }
}

impl<TSelector> X402Client<TSelector> {
    pub fn register<S>(mut self, scheme: S) -> Self
    where
        S: X402SchemeClient + 'static,
    {
        self.schemes.push(scheme);
        self
    }

    /// Replaces the default [`FirstMatch`] selection.
    pub fn with_selector<P: PaymentSelector + 'static>(self, selector: P) -> X402Client<P> {
        X402Client {
            selector,
            schemes: self.schemes,
            payment_timeout: self.payment_timeout,
        }
    }

    /// Bounds domain-separator resolution plus signing. `None` waits indefinitely.
    pub fn with_payment_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.payment_timeout = timeout;
        self
    }

    pub fn schemes(&self) -> &ClientSchemes {
        &self.schemes
    }
}

impl<TSelector> X402Client<TSelector>
where
    TSelector: PaymentSelector,
{
    /// Builds the payment header for a 402 response.
    ///
    /// # Errors
    ///
    /// - [`X402Error::ParseError`] if the response carries no readable offers
    /// - [`X402Error::NoSchemeRegistered`] if no registered scheme can pay any offer
    /// - [`X402Error::Timeout`] if signing does not finish within the payment timeout
    /// - any error of the selected scheme's signer
    #[instrument(name = "x402.reqwest.make_payment_headers", skip_all, err)]
    pub async fn make_payment_headers(&self, res: Response) -> Result<HeaderMap, X402Error> {
        let payment_required = parse_payment_required(res)
            .await
            .ok_or_else(|| X402Error::ParseError("Invalid 402 response".to_string()))?;
        let candidates = self.schemes.candidates(&payment_required);

        let selected = self
            .selector
            .select(&candidates)
            .ok_or(X402Error::NoSchemeRegistered)?;
        debug!(
            scheme = %selected.scheme,
            chain_id = %selected.chain_id,
            offer_index = selected.offer_index,
            "Selected payment scheme"
        );

        let signed_payload = match self.payment_timeout {
            Some(timeout) => tokio::time::timeout(timeout, selected.sign())
                .await
                .map_err(|_| X402Error::Timeout)??,
            None => selected.sign().await?,
        };
        let header_name = match &payment_required {
            proto::PaymentRequired::V1(_) => X_PAYMENT_HEADER.clone(),
            proto::PaymentRequired::V2(_) => PAYMENT_SIGNATURE_HEADER.clone(),
        };
        let header_value = HeaderValue::from_str(&signed_payload)
            .map_err(|e| X402Error::InvalidPaymentHeader(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(header_name, header_value);
        Ok(headers)
    }
}

/// Registered scheme clients.
#[derive(Default)]
pub struct ClientSchemes(Vec<Arc<dyn X402SchemeClient>>);

impl ClientSchemes {
    pub fn push<T: X402SchemeClient + 'static>(&mut self, client: T) {
        self.0.push(Arc::new(client));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Candidates from every registered scheme, in the server's offer order.
    pub fn candidates(&self, payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate> {
        let mut candidates: Vec<PaymentCandidate> = self
            .0
            .iter()
            .flat_map(|client| client.accept(payment_required))
            .collect();
        // stable: ties keep registration order
        candidates.sort_by_key(|candidate| candidate.offer_index);
        candidates
    }
}

#[async_trait::async_trait]
impl<TSelector> rqm::Middleware for X402Client<TSelector>
where
    TSelector: PaymentSelector + Send + Sync + 'static,
{
    #[instrument(name = "x402.reqwest.handle", skip_all, err)]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let retry_req = req.try_clone();
        let res = next.clone().run(req, extensions).await?;

        if res.status() != StatusCode::PAYMENT_REQUIRED {
            trace!(status = ?res.status(), "No payment required, returning response");
            return Ok(res);
        }

        info!(url = %res.url(), "Received 402 Payment Required, processing payment");

        let mut retry = retry_req.ok_or_else(|| middleware_error(X402Error::RequestNotCloneable))?;
        let headers = self
            .make_payment_headers(res)
            .await
            .map_err(middleware_error)?;
        retry.headers_mut().extend(headers);

        trace!(url = %retry.url(), "Retrying request with payment headers");
        let res = next.run(retry, extensions).await?;

        if res.status() == StatusCode::PAYMENT_REQUIRED {
            let reason = parse_payment_required(res)
                .await
                .and_then(|required| required.error().map(str::to_owned));
            warn!(?reason, "Payment was not accepted");
            return Err(middleware_error(X402Error::PaymentVerificationFailed {
                reason,
            }));
        }
        Ok(res)
    }
}

fn middleware_error(error: X402Error) -> rqm::Error {
    rqm::Error::Middleware(error.into())
}

/// Recovers the payment error from a middleware error, if that is what it wraps.
pub fn x402_error(error: &rqm::Error) -> Option<&X402Error> {
    match error {
        rqm::Error::Middleware(inner) => inner.downcast_ref::<X402Error>(),
        rqm::Error::Reqwest(_) => None,
    }
}

/// Parses a 402 response into a [`proto::PaymentRequired`].
///
/// The V2 `Payment-Required` header wins. Without it, the body is read as a V1 document.
#[instrument(name = "x402.reqwest.parse_payment_required", skip(response))]
pub async fn parse_payment_required(response: Response) -> Option<proto::PaymentRequired> {
    let v2_payment_required = response
        .headers()
        .get(&PAYMENT_REQUIRED_HEADER)
        .and_then(|h| {
            Base64Bytes::from(h.as_bytes())
                .decode_json::<v2::PaymentRequired<OriginalJson>>()
                .ok()
        });
    if let Some(v2_payment_required) = v2_payment_required {
        debug!("Parsed V2 payment required from header");
        return Some(proto::PaymentRequired::V2(v2_payment_required));
    }

    let v1_payment_required = response
        .bytes()
        .await
        .ok()
        .and_then(|b| serde_json::from_slice::<v1::PaymentRequired<OriginalJson>>(&b).ok());
    if let Some(v1_payment_required) = v1_payment_required {
        debug!("Parsed V1 payment required from body");
        return Some(proto::PaymentRequired::V1(v1_payment_required));
    }

    debug!("Could not parse payment required from response");
    None
}

/// Decodes the settlement confirmation a paid response carries, V2 header first.
pub fn settlement_response(response: &Response) -> Option<SettleResponse> {
    let headers = response.headers();
    let value = headers
        .get(&PAYMENT_RESPONSE_HEADER)
        .or_else(|| headers.get(&X_PAYMENT_RESPONSE_HEADER))?;
    match Base64Bytes::from(value.as_bytes()).decode_json::<SettleResponse>() {
        Ok(settlement) => Some(settlement),
        Err(error) => {
            debug!(%error, "Undecodable settlement header");
            None
        }
    }
}
