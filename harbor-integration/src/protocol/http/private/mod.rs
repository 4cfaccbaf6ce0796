use self::encoder::Encoder;
use crate::{
    error::SocketError,
    protocol::http::{BuildStrategy, rest::RestRequest},
};
use hmac::Mac;

/// Encoders for translating signature bytes into the `String` format a venue expects.
pub mod encoder;

/// Defines how an API requires its [`RestRequest`]s to be signed.
///
/// Each venue documents an HMAC pre-image (some combination of timestamp, key, query string and
/// body); the [`Signer`] implementation assembles it, and the generic [`RequestSigner`] drives
/// the [`Mac`] and [`Encoder`] to produce the final signed [`reqwest::Request`].
pub trait Signer {
    /// Borrowed configuration assembled from the [`RestRequest`] being signed.
    type Config<'a>
    where
        Self: 'a;

    /// Assemble the signing configuration for the provided [`RestRequest`].
    fn config<'a, Request>(
        &'a self,
        request: Request,
        builder: &reqwest::RequestBuilder,
    ) -> Result<Self::Config<'a>, SocketError>
    where
        Request: RestRequest;

    /// Feed the venue documented pre-image bytes into the [`Mac`].
    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: Mac;

    /// Attach the encoded signature (and any mandatory headers) to the request.
    fn build_signed_request<'a>(
        config: Self::Config<'a>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, SocketError>;
}

/// Generic [`BuildStrategy`] that signs [`RestRequest`]s with API specific [`Signer`] logic, a
/// hashable [`Mac`], and a signature [`Encoder`].
#[derive(Debug, Clone)]
pub struct RequestSigner<Sig, HmacMac, SignatureEncoder> {
    signer: Sig,
    mac: HmacMac,
    encoder: SignatureEncoder,
}

impl<Sig, HmacMac, SignatureEncoder> RequestSigner<Sig, HmacMac, SignatureEncoder>
where
    Sig: Signer,
    HmacMac: Mac + Clone,
    SignatureEncoder: Encoder,
{
    pub fn new(signer: Sig, mac: HmacMac, encoder: SignatureEncoder) -> Self {
        Self {
            signer,
            mac,
            encoder,
        }
    }
}

impl<Sig, HmacMac, SignatureEncoder> BuildStrategy for RequestSigner<Sig, HmacMac, SignatureEncoder>
where
    Sig: Signer,
    HmacMac: Mac + Clone,
    SignatureEncoder: Encoder,
{
    fn build<Request>(
        &self,
        request: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        // Assemble the venue documented pre-image from the request
        let config = self.signer.config(request, &builder)?;

        // Sign the pre-image bytes
        let mut mac = self.mac.clone();
        Sig::add_bytes_to_sign(&mut mac, &config);

        // Encode the signature into the format the venue expects
        let signature = self.encoder.encode(mac.finalize().into_bytes());

        Sig::build_signed_request(config, builder, signature)
    }
}
