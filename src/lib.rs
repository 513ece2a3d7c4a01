// Budget Flow - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod config;
pub mod source;         // Data sources: directory tree, in-memory
pub mod store;          // SQLite snapshot source + importer
pub mod entities;       // Jurisdiction, department tree, sankey graph
pub mod registry;       // Jurisdiction Registry
pub mod years;          // Year Resolver
pub mod expansion;      // Department Expansion
pub mod builder;        // Sankey Graph Builder
pub mod audit;          // Flow conservation report
pub mod loader;         // Jurisdiction Data Loader
pub mod scale;          // Presentation scaling
#[cfg(feature = "claims")]
pub mod claims;         // Land-claims lookup client

#[cfg(test)]
mod fixtures;

// Re-export commonly used types
pub use error::{BudgetError, Result, ValidationIssue};
pub use config::FlowConfig;
pub use source::{DataSource, Entry, EntryKind, FsDataSource, MemoryDataSource};
pub use store::{import_dataset, setup_snapshot, ImportSummary, SqliteDataSource};
pub use entities::{
    AmountPolicy, DepartmentNode, DepartmentRecord, DepartmentRow, DepartmentTree,
    ExpandedDepartment, JurisdictionLevel, JurisdictionMeta, JurisdictionPath, NodeKind,
    SankeyData, SankeyLink, SankeyNode,
};
pub use registry::{JurisdictionRegistry, Municipality, ProvinceMunicipalities};
pub use years::{get_available_years, get_available_years_for_jurisdiction};
pub use expansion::{expand_departments, expand_subtree};
pub use builder::{bucket_children, SankeyBuilder, HUB_NODE_ID, REVENUE_NODE_ID};
pub use audit::{audit_flows, BalanceStatus, FlowAudit, NodeBalance};
pub use loader::{BudgetLoader, JurisdictionData, SummaryRecord, YearBudget};
pub use scale::Scale;
#[cfg(feature = "claims")]
pub use claims::{ClaimRecord, ClaimsClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
