use bytes::Bytes;
use tracing::debug;

use crate::policy::PolicyOption;
use crate::util::checksum::ChecksumAlgorithm;

/// Post-fetch validation of fetched content against the checksum files fetched alongside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumPolicy {
    Ignore,
    /// a missing or mismatching checksum file rejects the fetched content
    Fail,
    /// checksum files are regenerated from the fetched content
    Fix,
}
impl PolicyOption for ChecksumPolicy {
    const OPTIONS: &'static [(&'static str, ChecksumPolicy)] = &[
        ("IGNORE", ChecksumPolicy::Ignore),
        ("FAIL", ChecksumPolicy::Fail),
        ("FIX", ChecksumPolicy::Fix),
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumFailure {
    #[error("no checksum file available")]
    Missing,
    #[error("{0} checksum does not match the content")]
    Mismatch(ChecksumAlgorithm),
}

impl ChecksumPolicy {
    /// Validates `data` against the checksum files fetched with it (`None` for those the
    ///  remote does not have). Returns the checksum files to publish next to the content.
    pub fn apply(&self, data: &[u8], fetched: Vec<(ChecksumAlgorithm, Option<Bytes>)>) -> Result<Vec<(ChecksumAlgorithm, Bytes)>, ChecksumFailure> {
        match self {
            ChecksumPolicy::Ignore => Ok(present(fetched)),
            ChecksumPolicy::Fail => {
                let present = present(fetched);
                if present.is_empty() {
                    return Err(ChecksumFailure::Missing);
                }
                if let Some((algorithm, _)) = present.iter().find(|(alg, checksum)| !alg.verify(data, checksum)) {
                    return Err(ChecksumFailure::Mismatch(*algorithm));
                }
                Ok(present)
            }
            ChecksumPolicy::Fix => {
                for (algorithm, checksum) in present(fetched) {
                    if !algorithm.verify(data, &checksum) {
                        debug!("fixing mismatching {} checksum", algorithm);
                    }
                }
                Ok(ChecksumAlgorithm::ALL.iter()
                    .map(|alg| (*alg, Bytes::from(alg.digest_hex(data))))
                    .collect())
            }
        }
    }
}

fn present(fetched: Vec<(ChecksumAlgorithm, Option<Bytes>)>) -> Vec<(ChecksumAlgorithm, Bytes)> {
    fetched.into_iter()
        .filter_map(|(alg, checksum)| checksum.map(|c| (alg, c)))
        .collect()
}
