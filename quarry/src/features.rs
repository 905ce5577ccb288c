//! Engine version detection and the feature gate consulted by compilers

use crate::json::ObjectReader;
use crate::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Search engine distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distribution {
    Elasticsearch,
    OpenSearch,
}

impl Distribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Elasticsearch => "elasticsearch",
            Distribution::OpenSearch => "opensearch",
        }
    }
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "elasticsearch" => Ok(Distribution::Elasticsearch),
            "opensearch" => Ok(Distribution::OpenSearch),
            other => Err(Error::UnknownDistribution(other.to_string())),
        }
    }
}

/// Engine version as reported by the root endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub distribution: Distribution,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn elasticsearch(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            distribution: Distribution::Elasticsearch,
            major,
            minor,
            patch,
        }
    }

    pub const fn opensearch(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            distribution: Distribution::OpenSearch,
            major,
            minor,
            patch,
        }
    }

    /// Parses a bare version number such as `7.10.2` or `8.0.0-SNAPSHOT`
    pub fn parse_number(distribution: Distribution, number: &str) -> Result<Self> {
        let release = number.split('-').next().unwrap_or(number);
        let mut parts = release.split('.');
        let mut next = || -> Result<u32> {
            match parts.next() {
                None => Ok(0),
                Some(part) => part
                    .parse()
                    .map_err(|_| Error::InvalidVersion(number.to_string())),
            }
        };
        let major = next()?;
        let minor = next()?;
        let patch = next()?;
        Ok(Self {
            distribution,
            major,
            minor,
            patch,
        })
    }

    /// Reads `version.number` and `version.distribution` from the root endpoint body
    pub fn from_info_response(body: &Value) -> Result<Self> {
        let root = ObjectReader::from_value(body)?;
        let version = root.obj("version")?;
        let distribution = match version.string_opt("distribution")? {
            Some(name) => name.parse()?,
            None => Distribution::Elasticsearch,
        };
        Self::parse_number(distribution, version.string("number")?)
    }

    fn triple(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}.{}.{}",
            self.distribution.as_str(),
            self.major,
            self.minor,
            self.patch
        )
    }
}

/// Accepts `7.10.2` (Elasticsearch) or `opensearch:2.11.0`
impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((distribution, number)) => Self::parse_number(distribution.parse()?, number),
            None => Self::parse_number(Distribution::Elasticsearch, s),
        }
    }
}

/// Capability flags that change the compiled wire shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet {
    /// Mappings and update-mapping paths nest under the `_doc` type name
    pub requires_mapping_type_name: bool,
    /// `track_total_hits` is understood and `hits.total` is an object
    pub supports_tracking_of_total_hits: bool,
}

impl FeatureSet {
    pub const ES_6_0: FeatureSet = FeatureSet {
        requires_mapping_type_name: true,
        supports_tracking_of_total_hits: false,
    };

    pub const ES_7_0: FeatureSet = FeatureSet {
        requires_mapping_type_name: false,
        supports_tracking_of_total_hits: true,
    };

    pub const OPENSEARCH_1_0: FeatureSet = FeatureSet {
        requires_mapping_type_name: false,
        supports_tracking_of_total_hits: true,
    };

    /// Picks the flags of the greatest known version threshold not above `version`
    pub fn for_version(version: &Version) -> Result<FeatureSet> {
        let thresholds: &[((u32, u32, u32), FeatureSet)] = match version.distribution {
            Distribution::Elasticsearch => &ELASTICSEARCH_THRESHOLDS,
            Distribution::OpenSearch => &OPENSEARCH_THRESHOLDS,
        };
        thresholds
            .iter()
            .rev()
            .find(|(min, _)| *min <= version.triple())
            .map(|(_, features)| *features)
            .ok_or_else(|| Error::UnsupportedVersion(version.to_string()))
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        FeatureSet::ES_7_0
    }
}

// Sorted ascending; lookup walks from the top.
const ELASTICSEARCH_THRESHOLDS: [((u32, u32, u32), FeatureSet); 3] = [
    ((6, 0, 0), FeatureSet::ES_6_0),
    ((7, 0, 0), FeatureSet::ES_7_0),
    ((8, 0, 0), FeatureSet::ES_7_0),
];

const OPENSEARCH_THRESHOLDS: [((u32, u32, u32), FeatureSet); 2] = [
    ((1, 0, 0), FeatureSet::OPENSEARCH_1_0),
    ((2, 0, 0), FeatureSet::OPENSEARCH_1_0),
];
