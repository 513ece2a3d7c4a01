// 📅 Year Resolver - which fiscal years are published for a jurisdiction
//
// A year is a directory named with a canonical integer ("2023", not "02023")
// that holds a summary.json. Anything else in the jurisdiction directory is
// skipped. Years are returned latest first.

use crate::entities::JurisdictionPath;
use crate::error::Result;
use crate::source::{join_path, DataSource, EntryKind};

/// Record every published year directory must contain
pub const SUMMARY_RECORD: &str = "summary.json";

/// Parse a canonical year identifier
pub fn parse_year(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: u32 = name.parse().ok()?;
    // Rejects leading zeros so "2023" and "02023" can never both appear
    if year.to_string() != name {
        return None;
    }
    Some(year)
}

/// Years stored under a dataset path, descending and duplicate free.
///
/// A missing path yields an empty list; only storage failures are errors.
pub fn get_available_years(source: &dyn DataSource, path: &str) -> Result<Vec<String>> {
    let Some(entries) = source.list_entries(path)? else {
        tracing::debug!("No directory at '{}', no years", path);
        return Ok(Vec::new());
    };

    let mut years: Vec<u32> = Vec::new();
    for entry in entries {
        if entry.kind != EntryKind::Dir {
            continue;
        }

        let Some(year) = parse_year(&entry.name) else {
            tracing::debug!("Skipping non-year directory '{}' in '{}'", entry.name, path);
            continue;
        };

        let year_path = join_path(path, &entry.name);
        let has_summary = source
            .list_entries(&year_path)?
            .map_or(false, |e| {
                e.iter()
                    .any(|x| x.kind == EntryKind::File && x.name == SUMMARY_RECORD)
            });

        if has_summary {
            years.push(year);
        } else {
            tracing::warn!("Skipping year '{}': no {}", year_path, SUMMARY_RECORD);
        }
    }

    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();

    Ok(years.into_iter().map(|y| y.to_string()).collect())
}

/// Years published for a jurisdiction slug.
///
/// Unknown slugs, jurisdictions with nothing published, and unreadable storage
/// all yield an empty list: callers decide whether that means a 404.
pub fn get_available_years_for_jurisdiction(source: &dyn DataSource, slug: &str) -> Vec<String> {
    let Some(path) = JurisdictionPath::parse(slug) else {
        tracing::debug!("Unknown jurisdiction slug '{}'", slug);
        return Vec::new();
    };

    match get_available_years(source, &path.storage_path()) {
        Ok(years) => years,
        Err(e) => {
            tracing::warn!("Failed to list years for '{}': {}", slug, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryDataSource;

    fn source() -> MemoryDataSource {
        MemoryDataSource::new()
            .with_record("provincial/ontario/2021/summary.json", "{}")
            .with_record("provincial/ontario/2023/summary.json", "{}")
            .with_record("provincial/ontario/2022/summary.json", "{}")
            .with_record("provincial/ontario/jurisdiction.json", "{}")
            .with_record("provincial/ontario/drafts/summary.json", "{}")
            .with_record("provincial/ontario/02020/summary.json", "{}")
            .with_record("provincial/ontario/2019/notes.txt", "wip")
            .with_record("municipal/ontario/toronto/2024/summary.json", "{}")
            .with_record("federal/2024/summary.json", "{}")
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2023"), Some(2023));
        assert_eq!(parse_year("02023"), None);
        assert_eq!(parse_year("2023-24"), None);
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("drafts"), None);
    }

    #[test]
    fn test_years_descending_and_filtered() {
        let years = get_available_years(&source(), "provincial/ontario").unwrap();
        assert_eq!(years, vec!["2023", "2022", "2021"]);
    }

    #[test]
    fn test_years_strictly_descending() {
        let years = get_available_years_for_jurisdiction(&source(), "ontario");
        let numeric: Vec<u32> = years.iter().map(|y| y.parse().unwrap()).collect();
        assert!(numeric.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_years_for_each_level() {
        let source = source();
        assert_eq!(get_available_years_for_jurisdiction(&source, "ontario/toronto"), vec!["2024"]);
        assert_eq!(get_available_years_for_jurisdiction(&source, "federal"), vec!["2024"]);
    }

    #[test]
    fn test_unknown_jurisdiction_is_empty() {
        let source = source();
        assert!(get_available_years_for_jurisdiction(&source, "unknown/unknown").is_empty());
        assert!(get_available_years_for_jurisdiction(&source, "quebec").is_empty());
        assert!(get_available_years_for_jurisdiction(&source, "../secrets").is_empty());
    }

    #[test]
    fn test_missing_dataset_is_empty() {
        assert!(get_available_years_for_jurisdiction(&MemoryDataSource::absent(), "ontario").is_empty());
    }
}
