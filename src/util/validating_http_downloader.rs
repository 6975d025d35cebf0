use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use hyper::{Body, Client, Request, Response, StatusCode, Uri};
use hyper::client::HttpConnector;
use hyper::header::{HeaderMap, AUTHORIZATION, LOCATION, USER_AGENT};
use hyper_tls::HttpsConnector;
use tracing::{debug, trace};

use crate::config::{Credentials, RemoteRepository};
use crate::maven::remote_repo::{remote_url, RemoteClient, TransportError};
use crate::util::checksum::ChecksumAlgorithm;
use crate::util::validating_http_body::{ChecksumHttpBodyValidator, HttpBodyValidator, ValidatingHttpBody};

/// Maven Central answers 403 to requests without a user agent
const USER_AGENT_VALUE: &str = concat!("arti-proxy/", env!("CARGO_PKG_VERSION"));

const MAX_REDIRECTS: usize = 5;

const SHA1_HEADERS: [&str; 3] = ["x-checksum-sha1", "x-goog-meta-checksum-sha1", "etag"];
const MD5_HEADERS: [&str; 2] = ["x-checksum-md5", "x-goog-meta-checksum-md5"];

/// Downloads files from remote repositories, checking the body's integrity against a hashcode
///  if one is returned in a header.
///
/// Instances do HTTP connection caching internally, so keeping them alive has performance benefits.
pub struct ValidatingHttpDownloader {
    client: Client<HttpsConnector<HttpConnector>>,
}
impl Default for ValidatingHttpDownloader {
    fn default() -> Self {
        ValidatingHttpDownloader::new()
    }
}
impl ValidatingHttpDownloader {
    pub fn new() -> ValidatingHttpDownloader {
        ValidatingHttpDownloader {
            client: Client::builder()
                .build::<_, Body>(HttpsConnector::new()),
        }
    }

    /// GETs `url` and materializes the validated body. Redirects are followed; credentials
    ///  are only sent with the initial request.
    pub async fn get(&self, url: &str, credentials: Option<&Credentials>) -> Result<Bytes, TransportError> {
        let mut url = url.to_string();
        let mut credentials = credentials;

        for _ in 0..=MAX_REDIRECTS {
            let response = self.send(&url, credentials).await?;

            let status = response.status();
            if status.is_redirection() {
                if let Some(location) = response.headers().get(LOCATION).and_then(|h| h.to_str().ok()) {
                    debug!(from = %url, to = location, "following redirect");
                    url = resolve_location(&url, location)?;
                    credentials = None;
                    continue;
                }
            }

            if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
                return Err(TransportError::NotFound);
            }
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }

            return collect_validated(response).await;
        }

        Err(TransportError::Network(format!("too many redirects for {}", url)))
    }

    async fn send(&self, url: &str, credentials: Option<&Credentials>) -> Result<Response<Body>, TransportError> {
        let uri = Uri::try_from(url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e)))?;

        let mut builder = Request::builder()
            .method("GET")
            .uri(uri)
            .header(USER_AGENT, USER_AGENT_VALUE);
        if let Some(credentials) = credentials {
            let token = BASE64.encode(format!("{}:{}", credentials.username, credentials.password));
            builder = builder.header(AUTHORIZATION, format!("Basic {}", token));
        }
        let request = builder.body(Body::empty())
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        trace!("getting {:?}", request.uri());

        self.client.request(request)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }
}

#[async_trait]
impl RemoteClient for ValidatingHttpDownloader {
    async fn fetch(&self, remote: &RemoteRepository, path: &str, timeout: Duration) -> Result<Bytes, TransportError> {
        let url = remote_url(&remote.url, path);
        match tokio::time::timeout(timeout, self.get(&url, remote.credentials.as_ref())).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}

async fn collect_validated(response: Response<Body>) -> Result<Bytes, TransportError> {
    let validators = header_validators(response.headers());
    let mut body = ValidatingHttpBody::new(response.into_body(), validators);

    let mut data = BytesMut::new();
    while let Some(chunk) = body.try_next().await? {
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}

/// Hashes announced in response headers. Values that are not a well-formed hash (e.g. an
///  ETag that is not a SHA1) are ignored.
fn header_validators(headers: &HeaderMap) -> Vec<Box<dyn HttpBodyValidator>> {
    let mut validators: Vec<Box<dyn HttpBodyValidator>> = vec![];
    for (algorithm, names) in [(ChecksumAlgorithm::Sha1, &SHA1_HEADERS[..]), (ChecksumAlgorithm::Md5, &MD5_HEADERS[..])] {
        let expected = names.iter()
            .filter_map(|name| headers.get(*name))
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| algorithm.parse_checksum_file(value.trim_matches('"').as_bytes()));

        if let Some(expected) = expected {
            validators.push(Box::new(ChecksumHttpBodyValidator::new(algorithm, &expected)));
        }
    }
    validators
}

fn resolve_location(current: &str, location: &str) -> Result<String, TransportError> {
    if location.contains("://") {
        return Ok(location.to_string());
    }

    let current = Uri::try_from(current)
        .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    let scheme = current.scheme_str().unwrap_or("http");
    let authority = current.authority()
        .map(|a| a.as_str())
        .ok_or_else(|| TransportError::InvalidUrl(format!("no authority in {}", current)))?;

    if location.starts_with('/') {
        Ok(format!("{}://{}{}", scheme, authority, location))
    }
    else {
        let base = current.path().rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        Ok(format!("{}://{}{}/{}", scheme, authority, base, location))
    }
}
