// 📦 Jurisdiction Data Loader - (slug, year) → metadata, summary flow, drill-down
//
// Every call validates its inputs against what the Year Resolver would list,
// so a (slug, year) pair is servable iff it is enumerable. Absent inputs fail
// with NotFound; malformed records fail with Validation. Nothing is cached
// between calls: each request rebuilds its entities from the source.

use crate::audit::{audit_flows, FlowAudit};
use crate::builder::SankeyBuilder;
use crate::config::FlowConfig;
use crate::entities::{
    AmountPolicy, DepartmentRecord, DepartmentRow, DepartmentTree, ExpandedDepartment,
    JurisdictionMeta, JurisdictionPath, SankeyData,
};
use crate::error::{BudgetError, Result, ValidationIssue};
use crate::expansion::expand_departments;
use crate::registry::{JurisdictionRegistry, ProvinceMunicipalities};
use crate::source::{join_path, DataSource};
use crate::years::{get_available_years, get_available_years_for_jurisdiction, SUMMARY_RECORD};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Optional flat spending tree that overrides summary.json's spending array
pub const DEPARTMENTS_RECORD: &str = "departments.csv";

/// Contents of summary.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(default)]
    pub revenue: Vec<DepartmentRecord>,
    #[serde(default)]
    pub spending: Vec<DepartmentRecord>,
}

/// Payload for one jurisdiction page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurisdictionData {
    pub jurisdiction: JurisdictionMeta,
    pub year: String,
    /// Top-level revenue sources and departments only
    pub sankey: SankeyData,
    pub total_revenue: f64,
    pub total_spending: f64,
    /// total_revenue − total_spending (negative = deficit)
    pub net_balance: f64,
    pub per_capita_spending: Option<f64>,
}

/// Validated trees for one (jurisdiction, year)
#[derive(Debug, Clone)]
pub struct YearBudget {
    pub jurisdiction: JurisdictionMeta,
    pub year: String,
    pub revenue: DepartmentTree,
    pub spending: DepartmentTree,
}

pub struct BudgetLoader {
    registry: JurisdictionRegistry,
    builder: SankeyBuilder,
}

impl BudgetLoader {
    pub fn new(source: Arc<dyn DataSource>, config: FlowConfig) -> Self {
        BudgetLoader {
            registry: JurisdictionRegistry::new(source),
            builder: SankeyBuilder::new(config),
        }
    }

    pub fn registry(&self) -> &JurisdictionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &FlowConfig {
        self.builder.config()
    }

    fn source(&self) -> &dyn DataSource {
        self.registry.source().as_ref()
    }

    pub fn list_provinces(&self) -> Result<Vec<String>> {
        self.registry.list_provinces()
    }

    pub fn list_municipalities_by_province(&self) -> Result<Vec<ProvinceMunicipalities>> {
        self.registry.list_municipalities_by_province()
    }

    /// Descending years for a slug; empty (never an error) when nothing is published
    pub fn get_available_years_for_jurisdiction(&self, slug: &str) -> Vec<String> {
        get_available_years_for_jurisdiction(self.source(), slug)
    }

    /// Jurisdiction metadata plus the summary flow graph
    pub fn get_jurisdiction_data(&self, slug: &str, year: &str) -> Result<JurisdictionData> {
        let budget = self.load_year(slug, year)?;
        let sankey = self.builder.build(&budget.revenue, &budget.spending);

        let total_revenue = budget.revenue.total();
        let total_spending = budget.spending.total();
        let per_capita_spending = budget
            .jurisdiction
            .population
            .filter(|p| *p > 0)
            .map(|p| total_spending / p as f64);

        Ok(JurisdictionData {
            jurisdiction: budget.jurisdiction,
            year: budget.year,
            sankey,
            total_revenue,
            total_spending,
            net_balance: total_revenue - total_spending,
            per_capita_spending,
        })
    }

    /// Full spending tree in pre-order for drill-down tables
    pub fn get_expanded_departments(&self, slug: &str, year: &str) -> Result<Vec<ExpandedDepartment>> {
        let budget = self.load_year(slug, year)?;
        Ok(expand_departments(&budget.spending))
    }

    /// Conservation report for the summary graph
    pub fn audit(&self, slug: &str, year: &str) -> Result<FlowAudit> {
        let data = self.get_jurisdiction_data(slug, year)?;
        Ok(audit_flows(&data.sankey, self.config().conservation_tolerance))
    }

    /// Validate (slug, year) and load both trees
    pub fn load_year(&self, slug: &str, year: &str) -> Result<YearBudget> {
        let not_found = || BudgetError::not_found(format!("{} / {}", slug, year));

        let path = JurisdictionPath::parse(slug).ok_or_else(not_found)?;
        let dir = path.storage_path();

        if !get_available_years(self.source(), &dir)?.iter().any(|y| y == year) {
            tracing::debug!("No published year '{}' for '{}'", year, slug);
            return Err(not_found());
        }

        let jurisdiction = self.registry.jurisdiction_meta(&path)?;
        let year_dir = join_path(&dir, year);
        let context = format!("{}/{}", slug, year);

        let summary_body = self
            .source()
            .read_record(&join_path(&year_dir, SUMMARY_RECORD))?
            .ok_or_else(not_found)?;
        let summary: SummaryRecord = serde_json::from_str(&summary_body)
            .map_err(|e| malformed(&context, SUMMARY_RECORD, e.to_string()))?;

        let revenue = DepartmentTree::from_records(
            &summary.revenue,
            AmountPolicy::signed(),
            &format!("{} revenue", context),
        )?;

        let spending_policy = AmountPolicy {
            allow_negative: self.config().allow_negative_spending,
        };
        let spending_context = format!("{} spending", context);

        let spending = match self
            .source()
            .read_record(&join_path(&year_dir, DEPARTMENTS_RECORD))?
        {
            Some(csv_body) => {
                let rows = DepartmentRow::parse_csv(&csv_body)
                    .map_err(|e| malformed(&context, DEPARTMENTS_RECORD, e.to_string()))?;
                DepartmentTree::from_rows(&rows, spending_policy, &spending_context)?
            }
            None => DepartmentTree::from_records(&summary.spending, spending_policy, &spending_context)?,
        };

        tracing::debug!(
            "Loaded {}: {} revenue records, {} spending records",
            context,
            revenue.len(),
            spending.len()
        );

        Ok(YearBudget {
            jurisdiction,
            year: year.to_string(),
            revenue,
            spending,
        })
    }
}

fn malformed(context: &str, record: &str, message: String) -> BudgetError {
    BudgetError::Validation {
        context: context.to_string(),
        issues: vec![ValidationIssue::new(record, "format", message)],
    }
}
