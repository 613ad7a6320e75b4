//! Label policy selection and application.

use std::collections::BTreeMap;
use std::str::FromStr;

use super::flatten::flatten_into;
use super::naming::sanitize_label_name;
use crate::model::ServerDetail;

/// Default root prefix for the deep-flatten policy.
pub const DEFAULT_FLATTEN_PREFIX: &str = "meta";
/// Default depth bound for the deep-flatten policy.
pub const DEFAULT_FLATTEN_DEPTH: usize = 3;

/// How server metadata becomes labels. The two policies are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LabelPolicy {
    /// `tag_<value>="1"` for each entry of the flat `tags` list.
    #[default]
    Tags,
    /// Every scalar of the detail document within `max_depth` of `prefix`.
    Flatten { prefix: String, max_depth: usize },
}

impl FromStr for LabelPolicy {
    type Err = String;

    /// Parses the policy name only; flatten parameters take their defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tags" | "tag" | "tag-list" => Ok(LabelPolicy::Tags),
            "flatten" | "deep-flatten" => Ok(LabelPolicy::Flatten {
                prefix: DEFAULT_FLATTEN_PREFIX.to_string(),
                max_depth: DEFAULT_FLATTEN_DEPTH,
            }),
            other => Err(format!(
                "unknown label policy '{other}' (expected 'tags' or 'flatten')"
            )),
        }
    }
}

impl LabelPolicy {
    /// Labels contributed by this policy for one server.
    pub fn labels_for(&self, detail: &ServerDetail, sanitize: bool) -> BTreeMap<String, String> {
        let mut raw = BTreeMap::new();
        match self {
            LabelPolicy::Tags => {
                for tag in &detail.tags {
                    raw.insert(format!("tag_{tag}"), "1".to_string());
                }
            }
            LabelPolicy::Flatten { prefix, max_depth } => {
                flatten_into(&detail.metadata, prefix, *max_depth, &mut raw);
            }
        }
        if !sanitize {
            return raw;
        }
        // Re-keying can merge names; BTreeMap order keeps the tie-break stable.
        raw.into_iter()
            .map(|(k, v)| (sanitize_label_name(&k), v))
            .collect()
    }
}
