//! Client-side payment signing for the V2 EIP-155 "exact" scheme.
//!
//! [`V2Eip155ExactClient`] turns one offer into a signed ERC-3009 payload:
//!
//! 1. resolve the offer's network to an EIP-155 chain
//! 2. resolve the asset (explicit, else the network's USDC) and its EIP-712 metadata
//! 3. parse the amount losslessly
//! 4. build a fresh [`Authorization`] valid from now for the configured window
//! 5. resolve the domain separator and sign
//!
//! # Usage
//!
//! ```ignore
//! use x402_chain_eip155::V2Eip155ExactClient;
//! use alloy_signer_local::PrivateKeySigner;
//!
//! let signer = PrivateKeySigner::random();
//! let client = V2Eip155ExactClient::new(signer);
//! ```

use alloy_primitives::Address;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use x402_types::chain::ChainId;
use x402_types::proto::v2::{self, ResourceInfo};
use x402_types::proto::{OriginalJson, PaymentRequired};
use x402_types::scheme::X402SchemeId;
use x402_types::scheme::client::{
    PaymentCandidate, PaymentCandidateSigner, X402Error, X402SchemeClient,
};
use x402_types::util::Base64Bytes;

use crate::authorization::{Authorization, parse_decimal_u256};
use crate::chain::{Eip155ChainReference, Eip155TokenDeployment};
use crate::domain_separator::{DomainQuery, DomainSeparatorResolver};
use crate::networks::USDC;
use crate::signer::{SignerLike, sign_authorization};
use crate::v2_eip155_exact::{
    ExactEvmPayload, PaymentPayload, PaymentRequirementsExtra, V2Eip155Exact,
};

/// Default lifetime of a signed authorization.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(3600);

/// Signs V2 "exact" payments on EIP-155 chains.
///
/// Cheap to clone: the signer and resolver are shared.
pub struct V2Eip155ExactClient<S> {
    signer: Arc<S>,
    resolver: Arc<DomainSeparatorResolver>,
    validity: Duration,
}

impl<S> V2Eip155ExactClient<S> {
    /// A client using the default pinned separators and local computation.
    pub fn new(signer: S) -> Self {
        Self {
            signer: Arc::new(signer),
            resolver: Arc::new(DomainSeparatorResolver::offline()),
            validity: DEFAULT_VALIDITY,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<DomainSeparatorResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Sets how long a signed authorization stays valid.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn resolver(&self) -> &Arc<DomainSeparatorResolver> {
        &self.resolver
    }
}

impl<S> Clone for V2Eip155ExactClient<S> {
    fn clone(&self) -> Self {
        Self {
            signer: Arc::clone(&self.signer),
            resolver: Arc::clone(&self.resolver),
            validity: self.validity,
        }
    }
}

impl<S> fmt::Debug for V2Eip155ExactClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("V2Eip155ExactClient")
            .field("resolver", &self.resolver)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl<S> V2Eip155ExactClient<S>
where
    S: SignerLike,
{
    /// Builds and signs a payload for `requirements`.
    ///
    /// The `accepted` field of the payload is the re-serialized offer. Use the candidates
    /// returned by [`X402SchemeClient::accept`] to echo a server's offer verbatim.
    pub async fn create_payload(
        &self,
        requirements: &v2::PaymentRequirements,
        resource: Option<ResourceInfo>,
    ) -> Result<PaymentPayload, X402Error> {
        let accepted = OriginalJson(serde_json::value::to_raw_value(requirements)?);
        self.build(requirements, accepted, resource).await
    }

    #[instrument(name = "x402.eip155.create_payload", skip_all, err, fields(network = %offer.network))]
    async fn build(
        &self,
        offer: &v2::PaymentRequirements,
        accepted: OriginalJson,
        resource: Option<ResourceInfo>,
    ) -> Result<PaymentPayload, X402Error> {
        let chain = chain_reference(&offer.network)?;
        let (asset, deployment) = resolve_asset(chain, offer.asset.as_deref())?;
        let pay_to = Address::from_str(&offer.pay_to)
            .map_err(|_| X402Error::InvalidAuthorization(format!("payTo {:?}", offer.pay_to)))?;
        let value = parse_decimal_u256(&offer.amount)
            .ok_or_else(|| X402Error::InvalidAmount(offer.amount.clone()))?;

        let authorization = Authorization::fresh(self.signer.address(), pay_to, value, self.validity);

        let extra = PaymentRequirementsExtra::from_extra(offer.extra.as_ref());
        let defaults = deployment.and_then(|d| d.eip712);
        let query = DomainQuery {
            chain,
            asset,
            name: extra
                .name
                .or_else(|| defaults.as_ref().map(|d| d.name.clone())),
            version: extra
                .version
                .or_else(|| defaults.as_ref().map(|d| d.version.clone())),
        };
        let resolved = self.resolver.resolve(&query).await?;
        let signature =
            sign_authorization(self.signer.as_ref(), &authorization, &resolved.separator).await?;
        debug!(
            %asset,
            payer = %authorization.from,
            provenance = %resolved.provenance,
            "Signed transfer authorization"
        );

        Ok(PaymentPayload {
            accepted,
            payload: ExactEvmPayload {
                signature,
                authorization,
            },
            resource,
            x402_version: v2::X402Version2,
        })
    }
}

fn chain_reference(network: &str) -> Result<Eip155ChainReference, X402Error> {
    ChainId::resolve(network)
        .and_then(|chain_id| Eip155ChainReference::try_from(&chain_id).ok())
        .ok_or_else(|| X402Error::UnsupportedNetwork(network.to_string()))
}

/// The asset address, plus its known deployment when it is the network default.
fn resolve_asset(
    chain: Eip155ChainReference,
    explicit: Option<&str>,
) -> Result<(Address, Option<Eip155TokenDeployment>), X402Error> {
    let default = USDC::by_chain(chain);
    match explicit.filter(|s| !s.is_empty()) {
        Some(explicit) => {
            let address = Address::from_str(explicit)
                .map_err(|_| X402Error::InvalidAuthorization(format!("asset {explicit:?}")))?;
            let known = default.filter(|d| d.address == address);
            Ok((address, known))
        }
        None => {
            let deployment = default.ok_or_else(|| {
                X402Error::UnsupportedNetwork(format!("{} has no default asset", chain.as_chain_id()))
            })?;
            Ok((deployment.address, Some(deployment)))
        }
    }
}

impl<S> X402SchemeId for V2Eip155ExactClient<S> {
    fn namespace(&self) -> &str {
        V2Eip155Exact.namespace()
    }

    fn scheme(&self) -> &str {
        V2Eip155Exact.scheme()
    }
}

impl<S> X402SchemeClient for V2Eip155ExactClient<S>
where
    S: SignerLike + 'static,
{
    fn accept(&self, payment_required: &PaymentRequired) -> Vec<PaymentCandidate> {
        let PaymentRequired::V2(payment_required) = payment_required else {
            return vec![];
        };
        payment_required
            .accepts
            .iter()
            .enumerate()
            .filter_map(|(offer_index, original)| {
                let offer: v2::PaymentRequirements =
                    v2::PaymentRequirements::try_from(original).ok()?;
                if offer.scheme != self.scheme() {
                    return None;
                }
                let chain_id = ChainId::resolve(&offer.network)?;
                if chain_id.namespace() != self.namespace() {
                    return None;
                }
                Some(PaymentCandidate {
                    offer_index,
                    chain_id,
                    asset: offer.asset.clone().unwrap_or_default(),
                    amount: offer.amount.clone(),
                    scheme: offer.scheme.clone(),
                    x402_version: self.x402_version(),
                    pay_to: offer.pay_to.clone(),
                    signer: Box::new(PayloadSigner {
                        client: self.clone(),
                        offer,
                        accepted: original.clone(),
                        resource: payment_required.resource.clone(),
                    }),
                })
            })
            .collect()
    }
}

struct PayloadSigner<S> {
    client: V2Eip155ExactClient<S>,
    offer: v2::PaymentRequirements,
    accepted: OriginalJson,
    resource: Option<ResourceInfo>,
}

#[async_trait]
impl<S> PaymentCandidateSigner for PayloadSigner<S>
where
    S: SignerLike,
{
    async fn sign_payment(&self) -> Result<String, X402Error> {
        let payload = self
            .client
            .build(&self.offer, self.accepted.clone(), self.resource.clone())
            .await?;
        Ok(Base64Bytes::encode_json(&payload)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Signature, address};
    use alloy_signer_local::PrivateKeySigner;
    use serde_json::json;

    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const GATE_USDC: Address = address!("0x9be8Df37C788B244cFc28E46654aD5Ec28a880AF");
    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    fn client() -> V2Eip155ExactClient<PrivateKeySigner> {
        V2Eip155ExactClient::new(TEST_KEY.parse::<PrivateKeySigner>().unwrap())
    }

    fn offer(network: &str, amount: &str) -> v2::PaymentRequirements {
        v2::PaymentRequirements {
            scheme: "exact".into(),
            network: network.into(),
            amount: amount.into(),
            pay_to: PAY_TO.into(),
            max_timeout_seconds: 60,
            asset: None,
            extra: None,
        }
    }

    fn payment_required(accepts: serde_json::Value) -> PaymentRequired {
        let doc = json!({
            "x402Version": 2,
            "resource": {"url": "https://api.example.com/premium"},
            "accepts": accepts,
        });
        PaymentRequired::V2(serde_json::from_str(&doc.to_string()).unwrap())
    }

    #[tokio::test]
    async fn test_payload_signature_recovers_to_signer() {
        let client = client();
        let payload = client
            .create_payload(&offer("eip155:10087", "1000"), None)
            .await
            .unwrap();

        let auth = &payload.payload.authorization;
        assert_eq!(auth.value, "1000");
        assert_eq!(auth.to, address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C"));

        let pinned = client
            .resolver()
            .pinned()
            .get(Eip155ChainReference::new(10087), GATE_USDC)
            .unwrap();
        let digest = auth.digest(&pinned).unwrap();
        let signature = Signature::from_raw(&payload.payload.signature).unwrap();
        let recovered = signature.recover_address_from_prehash(&digest).unwrap();
        assert_eq!(recovered, auth.from);
        assert_eq!(recovered, SignerLike::address(client.signer.as_ref()));
    }

    #[tokio::test]
    async fn test_network_name_and_caip2_sign_the_same_domain() {
        let client = client();
        let by_name = client
            .create_payload(&offer("gatelayer_testnet", "1000"), None)
            .await
            .unwrap();
        let pinned = client
            .resolver()
            .pinned()
            .get(Eip155ChainReference::new(10087), GATE_USDC)
            .unwrap();
        let auth = &by_name.payload.authorization;
        let signature = Signature::from_raw(&by_name.payload.signature).unwrap();
        let recovered = signature
            .recover_address_from_prehash(&auth.digest(&pinned).unwrap())
            .unwrap();
        assert_eq!(recovered, auth.from);
    }

    #[tokio::test]
    async fn test_window_starts_now() {
        let client = client().with_validity(Duration::from_secs(120));
        let payload = client
            .create_payload(&offer("eip155:10087", "1"), None)
            .await
            .unwrap();
        let after: u64 = payload.payload.authorization.valid_after.parse().unwrap();
        let before: u64 = payload.payload.authorization.valid_before.parse().unwrap();
        assert_eq!(before - after, 120);
        assert!(after <= x402_types::timestamp::UnixTimestamp::now().as_secs());
    }

    #[tokio::test]
    async fn test_invalid_amounts_fail_before_signing() {
        let client = client();
        for bad in ["12.5", "", "-1", "1e3"] {
            let err = client
                .create_payload(&offer("eip155:10087", bad), None)
                .await
                .unwrap_err();
            assert!(matches!(err, X402Error::InvalidAmount(v) if v == bad));
        }
    }

    #[tokio::test]
    async fn test_unknown_networks_are_unsupported() {
        let client = client();
        for network in ["mainnet-beta", "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp", "eip155:1"] {
            let err = client
                .create_payload(&offer(network, "1000"), None)
                .await
                .unwrap_err();
            assert!(
                matches!(err, X402Error::UnsupportedNetwork(_)),
                "{network}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_asset_without_metadata_is_rejected() {
        let mut requirements = offer("eip155:10087", "1000");
        requirements.asset = Some("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".into());
        let err = client()
            .create_payload(&requirements, None)
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::AssetMetadataMissing { .. }));

        requirements.extra = Some(json!({"name": "Token", "version": "1"}));
        let payload = client().create_payload(&requirements, None).await.unwrap();
        assert_eq!(payload.payload.signature.len(), 65);
    }

    #[tokio::test]
    async fn test_accept_keeps_offer_order_and_skips_foreign_offers() {
        let required = payment_required(json!([
            {"scheme": "exact", "network": "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp", "amount": "1", "payTo": "x"},
            {"scheme": "upto", "network": "eip155:10087", "amount": "1", "payTo": PAY_TO},
            {"scheme": "exact", "network": "eip155:10087", "amount": "1000", "payTo": PAY_TO},
            {"not": "an offer"},
            {"scheme": "exact", "network": "base", "amount": "5", "payTo": PAY_TO},
        ]));
        let candidates = client().accept(&required);
        let indices: Vec<_> = candidates.iter().map(|c| c.offer_index).collect();
        assert_eq!(indices, vec![2, 4]);
        assert_eq!(candidates[0].chain_id.to_string(), "eip155:10087");
        assert_eq!(candidates[1].chain_id.to_string(), "eip155:8453");
        assert_eq!(candidates[0].amount, "1000");
    }

    #[tokio::test]
    async fn test_candidate_echoes_offer_verbatim() {
        let required = payment_required(json!([
            {"scheme": "exact", "network": "eip155:10087", "amount": "1000", "payTo": PAY_TO,
             "extra": {"name": "USDC", "version": "2", "vendorField": [1, 2, 3]}},
        ]));
        let candidates = client().accept(&required);
        let header = candidates[0].sign().await.unwrap();

        let decoded: serde_json::Value = Base64Bytes::from(header.as_bytes())
            .decode_json()
            .unwrap();
        assert_eq!(decoded["x402Version"], 2);
        assert_eq!(decoded["accepted"]["extra"]["vendorField"], json!([1, 2, 3]));
        assert_eq!(decoded["resource"]["url"], "https://api.example.com/premium");
        assert_eq!(decoded["payload"]["authorization"]["value"], "1000");
        assert_eq!(decoded["payload"]["authorization"]["to"], PAY_TO);
    }

    #[test]
    fn test_v1_offers_are_not_accepted() {
        let doc = json!({
            "x402Version": 1,
            "accepts": [{"scheme": "exact", "network": "base", "maxAmountRequired": "1000"}],
        });
        let required = PaymentRequired::V1(serde_json::from_str(&doc.to_string()).unwrap());
        assert!(client().accept(&required).is_empty());
    }
}
