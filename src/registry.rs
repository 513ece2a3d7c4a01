// 🗺️ Jurisdiction Registry - which provinces and municipalities exist
//
// Derived purely from the dataset's directory structure:
//   provincial/<province>/...
//   municipal/<province>/<municipality>/...
//
// Listings are memoized per registry. OnceCell gives single-flight
// initialization: concurrent first callers block on one computation and all
// see the same value; a failed computation is not cached.

use crate::entities::{
    display_name_from_slug, JurisdictionLevel, JurisdictionMeta, JurisdictionPath,
    JurisdictionRecord, FEDERAL_SLUG,
};
use crate::error::{BudgetError, Result};
use crate::source::{join_path, DataSource};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Optional metadata record in a jurisdiction directory
pub const JURISDICTION_RECORD: &str = "jurisdiction.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    /// Municipality segment of the slug ("toronto")
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvinceMunicipalities {
    pub province: String,
    pub municipalities: Vec<Municipality>,
}

impl ProvinceMunicipalities {
    /// Full jurisdiction slugs ("ontario/toronto")
    pub fn jurisdiction_slugs(&self) -> Vec<String> {
        self.municipalities
            .iter()
            .map(|m| format!("{}/{}", self.province, m.slug))
            .collect()
    }
}

pub struct JurisdictionRegistry {
    source: Arc<dyn DataSource>,
    provinces: OnceCell<Vec<String>>,
    municipalities: OnceCell<Vec<ProvinceMunicipalities>>,
}

impl JurisdictionRegistry {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        JurisdictionRegistry {
            source,
            provinces: OnceCell::new(),
            municipalities: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Province slugs with provincial data, alphabetical.
    ///
    /// Fails with NotFound only when the dataset root itself is missing.
    pub fn list_provinces(&self) -> Result<Vec<String>> {
        self.provinces
            .get_or_try_init(|| {
                self.ensure_root()?;
                let provinces = self.subdirectories(JurisdictionLevel::Provincial.dir_name())?;
                tracing::debug!("Registry: {} provinces", provinces.len());
                Ok(provinces)
            })
            .cloned()
    }

    /// Municipalities grouped by province, both levels sorted by slug.
    ///
    /// Fails with NotFound only when the dataset root itself is missing.
    pub fn list_municipalities_by_province(&self) -> Result<Vec<ProvinceMunicipalities>> {
        self.municipalities
            .get_or_try_init(|| {
                self.ensure_root()?;
                let level_dir = JurisdictionLevel::Municipal.dir_name();

                let mut grouped = Vec::new();
                for province in self.subdirectories(level_dir)? {
                    let province_dir = join_path(level_dir, &province);
                    let mut municipalities = Vec::new();

                    for slug in self.subdirectories(&province_dir)? {
                        let dir = join_path(&province_dir, &slug);
                        let record = match self.read_jurisdiction_record(&dir) {
                            Ok(record) => record,
                            Err(e) => {
                                tracing::warn!("Ignoring unreadable {} in '{}': {}", JURISDICTION_RECORD, dir, e);
                                None
                            }
                        };
                        let name = record
                            .and_then(|r| r.name)
                            .filter(|n| !n.trim().is_empty())
                            .unwrap_or_else(|| display_name_from_slug(&slug));
                        municipalities.push(Municipality { slug, name });
                    }

                    grouped.push(ProvinceMunicipalities {
                        province,
                        municipalities,
                    });
                }

                tracing::debug!(
                    "Registry: {} municipalities across {} provinces",
                    grouped.iter().map(|g| g.municipalities.len()).sum::<usize>(),
                    grouped.len()
                );
                Ok(grouped)
            })
            .cloned()
    }

    /// Every jurisdiction slug in the dataset: federal, provinces, municipalities
    pub fn list_jurisdictions(&self) -> Result<Vec<String>> {
        let mut slugs = Vec::new();

        if self.source.dir_exists(JurisdictionLevel::Federal.dir_name())? {
            slugs.push(FEDERAL_SLUG.to_string());
        }
        slugs.extend(self.list_provinces()?);
        for group in self.list_municipalities_by_province()? {
            slugs.extend(group.jurisdiction_slugs());
        }

        Ok(slugs)
    }

    /// Metadata for a jurisdiction, or NotFound when its directory is absent
    pub fn jurisdiction_meta(&self, path: &JurisdictionPath) -> Result<JurisdictionMeta> {
        let dir = path.storage_path();
        if !self.source.dir_exists(&dir)? {
            return Err(BudgetError::not_found(format!("jurisdiction '{}'", path.slug)));
        }

        let record = self.read_jurisdiction_record(&dir)?;
        Ok(JurisdictionMeta::from_record(path, record))
    }

    fn read_jurisdiction_record(&self, dir: &str) -> Result<Option<JurisdictionRecord>> {
        let path = join_path(dir, JURISDICTION_RECORD);
        match self.source.read_record(&path)? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn ensure_root(&self) -> Result<()> {
        if self.source.dir_exists("")? {
            Ok(())
        } else {
            Err(BudgetError::not_found("dataset root"))
        }
    }

    /// Well-formed slug directories directly under `path`; empty if `path` is absent
    fn subdirectories(&self, path: &str) -> Result<Vec<String>> {
        let Some(entries) = self.source.list_entries(path)? else {
            return Ok(Vec::new());
        };

        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|e| e.is_dir())
            .filter_map(|e| {
                let well_formed = matches!(
                    JurisdictionPath::parse(&e.name),
                    Some(p) if p.level == JurisdictionLevel::Provincial
                );
                if well_formed {
                    Some(e.name)
                } else {
                    tracing::warn!("Skipping malformed jurisdiction directory '{}/{}'", path, e.name);
                    None
                }
            })
            .collect();

        names.sort();
        Ok(names)
    }
}
