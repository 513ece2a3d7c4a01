// Shared in-memory datasets for unit tests

use crate::source::MemoryDataSource;

pub const ONTARIO_2023_SUMMARY: &str = r#"{
    "revenue": [
        { "name": "Taxes", "amount": 1900 },
        { "name": "Fees", "amount": 100 }
    ],
    "spending": [
        {
            "name": "Health",
            "amount": 1000,
            "children": [
                { "name": "Hospitals", "amount": 600 },
                { "name": "OHIP", "amount": 400 }
            ]
        },
        { "name": "Education", "amount": 800 },
        { "name": "Other", "amount": 200 }
    ]
}"#;

pub const ONTARIO_2022_SUMMARY: &str = r#"{
    "revenue": [
        { "name": "Taxes", "amount": 1700 },
        { "name": "Fees", "amount": 90 },
        { "name": "Investment Income", "amount": -10 }
    ],
    "spending": [
        { "name": "Health", "amount": 950 },
        { "name": "Education", "amount": 780 }
    ]
}"#;

pub const TORONTO_2024_SUMMARY: &str = r#"{
    "revenue": [
        { "name": "Property Tax", "amount": 500 },
        { "name": "Transfers", "amount": 300 }
    ],
    "spending": [
        { "name": "Transit", "amount": 450 },
        { "name": "Police", "amount": 300 },
        { "name": "Parks", "amount": 100 }
    ]
}"#;

pub const FEDERAL_2024_SUMMARY: &str = r#"{
    "revenue": [{ "name": "Income Tax", "amount": 400 }],
    "spending": [{ "name": "Defence", "amount": 400 }]
}"#;

/// Ontario (two years), Toronto (deficit year), federal, plus directory noise
pub fn ontario_source() -> MemoryDataSource {
    MemoryDataSource::new()
        .with_record(
            "provincial/ontario/jurisdiction.json",
            r#"{ "name": "Ontario", "source_url": "https://www.ontario.ca/page/budget", "population": 15000000 }"#,
        )
        .with_record("provincial/ontario/2023/summary.json", ONTARIO_2023_SUMMARY)
        .with_record("provincial/ontario/2022/summary.json", ONTARIO_2022_SUMMARY)
        .with_record("provincial/ontario/drafts/summary.json", "{ not json")
        .with_record("provincial/ontario/2019/notes.txt", "unpublished")
        .with_record(
            "municipal/ontario/toronto/jurisdiction.json",
            r#"{ "name": "City of Toronto", "population": 2800000 }"#,
        )
        .with_record("municipal/ontario/toronto/2024/summary.json", TORONTO_2024_SUMMARY)
        .with_record("federal/2024/summary.json", FEDERAL_2024_SUMMARY)
}
