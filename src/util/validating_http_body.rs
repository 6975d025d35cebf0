use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::{ready, Stream};
use hyper::Body;
use pin_project_lite::pin_project;
use tracing::trace;

use crate::maven::remote_repo::TransportError;
use crate::util::checksum::{ChecksumAlgorithm, StreamingDigest};

/// Streams an HTTP body through a set of validators that need to see all of it, e.g. to compare
///  the body's hash with one the remote announced in a response header.
///
/// Chunks are passed through as they arrive. If validation fails at the end of the body, a
///  final error item is appended; after an error item the stream ends.
pin_project! {
    pub struct ValidatingHttpBody {
        #[pin]
        http_body: Body,
        validators: Vec<Box<dyn HttpBodyValidator>>,
        is_failed: bool,
    }
}
impl ValidatingHttpBody {
    pub fn new(http_body: Body, validators: Vec<Box<dyn HttpBodyValidator>>) -> ValidatingHttpBody {
        ValidatingHttpBody {
            http_body,
            validators,
            is_failed: false,
        }
    }
}

impl Stream for ValidatingHttpBody {
    type Item = Result<Bytes, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_failed {
            return Poll::Ready(None);
        }

        let this = self.project();
        let inner = ready!(this.http_body.poll_next(cx));
        match inner {
            Some(Ok(data)) => {
                // available data from the wrapped HTTP body -> pass this on
                for validator in this.validators.iter_mut() {
                    validator.add_data(&data);
                }
                Poll::Ready(Some(Ok(data)))
            }
            None => {
                // wrapped HTTP body is fully drained -> finalize validation
                match this.validators.iter().find_map(|v| v.do_validate().err()) {
                    None => Poll::Ready(None),
                    Some(message) => {
                        *this.is_failed = true;
                        Poll::Ready(Some(Err(TransportError::Integrity(message))))
                    }
                }
            }
            Some(Err(e)) => {
                *this.is_failed = true;
                Poll::Ready(Some(Err(TransportError::Network(e.to_string()))))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.http_body.size_hint()
    }
}

pub trait HttpBodyValidator: Send {
    fn add_data(&mut self, data: &Bytes);

    /// Err contains a description of the mismatch
    fn do_validate(&self) -> Result<(), String>;
}

/// Validates the body against a hash announced by the remote, e.g. in an `X-Checksum-Sha1` header
pub struct ChecksumHttpBodyValidator {
    algorithm: ChecksumAlgorithm,
    digest: StreamingDigest,
    expected_hex: String,
}
impl ChecksumHttpBodyValidator {
    pub fn new(algorithm: ChecksumAlgorithm, expected_hex: &str) -> ChecksumHttpBodyValidator {
        ChecksumHttpBodyValidator {
            algorithm,
            digest: StreamingDigest::new(algorithm),
            expected_hex: expected_hex.to_ascii_lowercase(),
        }
    }
}
impl HttpBodyValidator for ChecksumHttpBodyValidator {
    fn add_data(&mut self, data: &Bytes) {
        self.digest.update(data);
    }

    fn do_validate(&self) -> Result<(), String> {
        let actual = self.digest.clone().finalize_hex();
        trace!("validating {} hash", self.algorithm);
        if actual == self.expected_hex {
            Ok(())
        }
        else {
            Err(format!("{} mismatch: expected {}, got {}", self.algorithm, self.expected_hex, actual))
        }
    }
}
