use super::traits::RemoteError;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use std::time::{Duration, SystemTime};

/// HTTP client that signs each request with SigV4, for AWS REST endpoints the SDK does not cover.
pub struct SignedHttpClient {
    client: reqwest::Client,
    credentials: SharedCredentialsProvider,
    region: String,
    service: &'static str,
}

impl SignedHttpClient {
    pub fn new(
        credentials: SharedCredentialsProvider,
        region: impl Into<String>,
        service: &'static str,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            credentials,
            region: region.into(),
            service,
        })
    }

    /// Signs and sends a GET. The response is returned whatever its status.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, RemoteError> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| RemoteError::Signing(format!("no credentials: {}", e)))?;
        let identity = credentials.into();

        let signing_params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| RemoteError::Signing(e.to_string()))?
            .into();

        let signable = SignableRequest::new(
            "GET",
            url,
            std::iter::empty(),
            SignableBody::Bytes(&[]),
        )
        .map_err(|e| RemoteError::Signing(e.to_string()))?;

        let (instructions, _signature) = sign(signable, &signing_params)
            .map_err(|e| RemoteError::Signing(e.to_string()))?
            .into_parts();

        let mut request = self.client.get(url);
        for (name, value) in instructions.headers() {
            request = request.header(name, value);
        }

        Ok(request.send().await?)
    }
}
