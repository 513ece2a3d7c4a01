// Entity Models
//
// Every entity is rebuilt from the published dataset on each request and never
// mutated afterwards.
//
// - jurisdiction: slug, level, metadata
// - department: the department/program tree (arena) and its expanded rows
// - sankey: nodes and links handed to the chart

pub mod department;
pub mod jurisdiction;
pub mod sankey;

pub use department::{
    slugify, AmountPolicy, DepartmentIndex, DepartmentNode, DepartmentRecord, DepartmentRow,
    DepartmentTree, ExpandedDepartment, BUCKET_SEPARATOR,
};
pub use jurisdiction::{
    display_name_from_slug, JurisdictionLevel, JurisdictionMeta, JurisdictionPath,
    JurisdictionRecord, FEDERAL_SLUG,
};
pub use sankey::{
    NodeKind, SankeyData, SankeyLink, SankeyNode, Stage, STAGE_DEPARTMENT, STAGE_HUB,
    STAGE_REVENUE,
};
