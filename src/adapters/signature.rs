use crate::domain::model::SIGNATURE_FIELDS;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use url::Url;

const SIGNATURE_PATH_MARKER: &str = "/signatures/";

/// Turns relative signature references into fetchable URLs.
///
/// References are appended to the service endpoint the same way the upload
/// URL is built, so a path prefix on the endpoint is kept.
pub struct SignatureResolver {
    base_url: Url,
    endpoint: String,
    client: Client,
}

impl SignatureResolver {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(endpoint)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::new(),
        })
    }

    /// True for signature fields whose value points at a stored image.
    pub fn is_signature_ref(path: &str, value: Option<&str>) -> bool {
        SIGNATURE_FIELDS.contains(&path)
            && value.is_some_and(|value| {
                is_root_relative(value) && value.contains(SIGNATURE_PATH_MARKER)
            })
    }

    pub fn resolve(&self, reference: &str) -> Result<Url> {
        if !is_root_relative(reference) {
            return Err(EtlError::ValidationError {
                message: format!("signature reference '{}' is not a root-relative path", reference),
            });
        }

        let url = Url::parse(&format!("{}{}", self.endpoint, reference))?;
        if url.origin() != self.base_url.origin() {
            return Err(EtlError::ValidationError {
                message: format!(
                    "signature reference '{}' leaves the service host {}",
                    reference,
                    self.base_url.origin().ascii_serialization()
                ),
            });
        }
        Ok(url)
    }

    pub async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        let url = self.resolve(reference)?;
        tracing::debug!("Fetching signature image {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(EtlError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// A single leading `/`; `//host/...` and `/\host/...` name another host.
fn is_root_relative(reference: &str) -> bool {
    reference.starts_with('/') && !reference.starts_with("//") && !reference.starts_with("/\\")
}

/// Last path segment of a reference, used as the local file name.
pub fn reference_file_name(reference: &str) -> Option<&str> {
    reference
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "..")
}
