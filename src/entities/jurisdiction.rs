// 🏛️ Jurisdiction Entity - who publishes a budget
//
// Identity is the slug: "federal", "<province>" or "<province>/<municipality>".
// The slug alone decides where the jurisdiction lives in the dataset.

use serde::{Deserialize, Serialize};

// ============================================================================
// JURISDICTION LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JurisdictionLevel {
    Federal,
    Provincial,
    Municipal,
}

impl JurisdictionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            JurisdictionLevel::Federal => "federal",
            JurisdictionLevel::Provincial => "provincial",
            JurisdictionLevel::Municipal => "municipal",
        }
    }

    /// Top-level dataset directory holding this level
    pub fn dir_name(&self) -> &'static str {
        self.as_str()
    }
}

// ============================================================================
// JURISDICTION PATH (slug → storage location)
// ============================================================================

/// Slug of the single federal jurisdiction
pub const FEDERAL_SLUG: &str = "federal";

/// A parsed, well-formed jurisdiction slug
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JurisdictionPath {
    pub slug: String,
    pub level: JurisdictionLevel,
    pub province: Option<String>,
    pub municipality: Option<String>,
}

impl JurisdictionPath {
    /// Parse a slug; `None` for anything that cannot name a jurisdiction
    ///
    /// Example: "ontario/toronto" → municipal, storage path "municipal/ontario/toronto"
    pub fn parse(slug: &str) -> Option<Self> {
        if slug == FEDERAL_SLUG {
            return Some(JurisdictionPath {
                slug: slug.to_string(),
                level: JurisdictionLevel::Federal,
                province: None,
                municipality: None,
            });
        }

        let segments: Vec<&str> = slug.split('/').collect();
        if !segments.iter().all(|s| is_valid_segment(s)) {
            return None;
        }

        match segments.as_slice() {
            [province] => Some(JurisdictionPath {
                slug: slug.to_string(),
                level: JurisdictionLevel::Provincial,
                province: Some(province.to_string()),
                municipality: None,
            }),
            [province, municipality] => Some(JurisdictionPath {
                slug: slug.to_string(),
                level: JurisdictionLevel::Municipal,
                province: Some(province.to_string()),
                municipality: Some(municipality.to_string()),
            }),
            _ => None,
        }
    }

    /// Directory of this jurisdiction inside the dataset
    pub fn storage_path(&self) -> String {
        match self.level {
            JurisdictionLevel::Federal => self.level.dir_name().to_string(),
            _ => format!("{}/{}", self.level.dir_name(), self.slug),
        }
    }

    /// Last slug segment
    pub fn leaf(&self) -> &str {
        self.municipality
            .as_deref()
            .or(self.province.as_deref())
            .unwrap_or(FEDERAL_SLUG)
    }
}

/// Segments are lowercase ASCII words joined by '-' or '_'
fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != FEDERAL_SLUG
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// "north-vancouver" → "North Vancouver"
pub fn display_name_from_slug(slug: &str) -> String {
    slug.split(|c| c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// JURISDICTION METADATA
// ============================================================================

/// Optional `jurisdiction.json` stored in a jurisdiction directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JurisdictionRecord {
    pub name: Option<String>,
    pub source_url: Option<String>,
    pub population: Option<u64>,
}

/// Jurisdiction metadata returned with every data payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionMeta {
    pub slug: String,
    pub name: String,
    pub level: JurisdictionLevel,
    /// Citation for the published figures
    pub source_url: Option<String>,
    pub population: Option<u64>,
}

impl JurisdictionMeta {
    pub fn from_record(path: &JurisdictionPath, record: Option<JurisdictionRecord>) -> Self {
        let record = record.unwrap_or_default();
        JurisdictionMeta {
            slug: path.slug.clone(),
            name: record
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| display_name_from_slug(path.leaf())),
            level: path.level,
            source_url: record.source_url,
            population: record.population,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provincial() {
        let path = JurisdictionPath::parse("ontario").unwrap();
        assert_eq!(path.level, JurisdictionLevel::Provincial);
        assert_eq!(path.storage_path(), "provincial/ontario");
        assert_eq!(path.leaf(), "ontario");
    }

    #[test]
    fn test_parse_municipal() {
        let path = JurisdictionPath::parse("british-columbia/north-vancouver").unwrap();
        assert_eq!(path.level, JurisdictionLevel::Municipal);
        assert_eq!(path.province.as_deref(), Some("british-columbia"));
        assert_eq!(path.municipality.as_deref(), Some("north-vancouver"));
        assert_eq!(
            path.storage_path(),
            "municipal/british-columbia/north-vancouver"
        );
    }

    #[test]
    fn test_parse_federal() {
        let path = JurisdictionPath::parse("federal").unwrap();
        assert_eq!(path.level, JurisdictionLevel::Federal);
        assert_eq!(path.storage_path(), "federal");
    }

    #[test]
    fn test_parse_rejects_malformed_slugs() {
        for slug in ["", "a/b/c", "../etc", "ontario/", "/ontario", "Ontario", "on tario", "ontario/.."] {
            assert!(JurisdictionPath::parse(slug).is_none(), "accepted {:?}", slug);
        }
    }

    #[test]
    fn test_display_name_from_slug() {
        assert_eq!(display_name_from_slug("ontario"), "Ontario");
        assert_eq!(display_name_from_slug("north-vancouver"), "North Vancouver");
        assert_eq!(display_name_from_slug("prince_edward_island"), "Prince Edward Island");
    }

    #[test]
    fn test_meta_prefers_record_name() {
        let path = JurisdictionPath::parse("ontario/toronto").unwrap();

        let derived = JurisdictionMeta::from_record(&path, None);
        assert_eq!(derived.name, "Toronto");
        assert!(derived.source_url.is_none());

        let record = JurisdictionRecord {
            name: Some("City of Toronto".to_string()),
            source_url: Some("https://example.org/toronto-budget".to_string()),
            population: Some(2_800_000),
        };
        let meta = JurisdictionMeta::from_record(&path, Some(record));
        assert_eq!(meta.name, "City of Toronto");
        assert_eq!(meta.population, Some(2_800_000));
        assert_eq!(meta.level, JurisdictionLevel::Municipal);
    }
}
