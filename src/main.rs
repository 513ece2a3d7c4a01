use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use budget_flow::{
    import_dataset, BudgetError, BudgetLoader, DataSource, ExpandedDepartment, FlowConfig,
    FsDataSource, Scale, SqliteDataSource, HUB_NODE_ID,
};

#[derive(Parser)]
#[command(name = "budget-flow")]
#[command(about = "Explore published government budgets as flow graphs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Dataset root (federal/, provincial/, municipal/)
    #[arg(long, global = true, env = "BUDGET_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Read from an imported SQLite snapshot instead of the directory tree
    #[arg(long, global = true, env = "BUDGET_DB")]
    db: Option<PathBuf>,

    /// Flow configuration (JSON)
    #[arg(long, global = true, env = "BUDGET_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List provinces with provincial data
    Provinces,

    /// List municipalities grouped by province
    Municipalities,

    /// List published fiscal years for a jurisdiction
    Years { slug: String },

    /// Summary flow graph for a jurisdiction and year
    Show {
        slug: String,
        year: String,
        /// raw | thousands | millions | billions (default: picked from the totals)
        #[arg(long)]
        scale: Option<Scale>,
    },

    /// Full department/program table for a jurisdiction and year
    Departments {
        slug: String,
        year: String,
        /// Also export the table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        scale: Option<Scale>,
    },

    /// Flow conservation report
    Audit { slug: String, year: String },

    /// Import the directory tree into a SQLite snapshot
    Import {
        #[arg(value_name = "DB")]
        snapshot: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Provinces => run_provinces(&cli),
        Commands::Municipalities => run_municipalities(&cli),
        Commands::Years { slug } => run_years(&cli, slug),
        Commands::Show { slug, year, scale } => run_show(&cli, slug, year, *scale),
        Commands::Departments {
            slug,
            year,
            csv,
            scale,
        } => run_departments(&cli, slug, year, csv.as_deref(), *scale),
        Commands::Audit { slug, year } => run_audit(&cli, slug, year),
        Commands::Import { snapshot } => run_import(&cli, snapshot),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "budget_flow=debug,info" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_source(cli: &Cli) -> Result<Arc<dyn DataSource>> {
    match &cli.db {
        Some(db) => {
            let snapshot = SqliteDataSource::open(db)
                .with_context(|| format!("Failed to open snapshot {}", db.display()))?;
            Ok(Arc::new(snapshot))
        }
        None => Ok(Arc::new(FsDataSource::new(&cli.data_dir))),
    }
}

fn open_loader(cli: &Cli) -> Result<BudgetLoader> {
    let config = match &cli.config {
        Some(path) => FlowConfig::from_file(path)?,
        None => FlowConfig::default(),
    };
    config.validate()?;

    Ok(BudgetLoader::new(open_source(cli)?, config))
}

/// NotFound is an expected outcome: report it and exit with status 2
fn found<T>(result: budget_flow::Result<T>, slug: &str, year: &str) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(BudgetError::NotFound(_)) => {
            eprintln!("❌ No published budget for '{}' in {}", slug, year);
            std::process::exit(2);
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load {} {}", slug, year)),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_provinces(cli: &Cli) -> Result<()> {
    let provinces = open_loader(cli)?.list_provinces()?;
    if cli.json {
        return print_json(&provinces);
    }

    println!("🗺️  Provinces ({})", provinces.len());
    for province in provinces {
        println!("   {}", province);
    }
    Ok(())
}

fn run_municipalities(cli: &Cli) -> Result<()> {
    let grouped = open_loader(cli)?.list_municipalities_by_province()?;
    if cli.json {
        return print_json(&grouped);
    }

    for group in grouped {
        println!("🏙️  {} ({})", group.province, group.municipalities.len());
        for m in &group.municipalities {
            println!("   {:<30} {}/{}", m.name, group.province, m.slug);
        }
    }
    Ok(())
}

fn run_years(cli: &Cli, slug: &str) -> Result<()> {
    let years = open_loader(cli)?.get_available_years_for_jurisdiction(slug);
    if cli.json {
        return print_json(&years);
    }

    if years.is_empty() {
        println!("No published years for '{}'", slug);
    } else {
        println!("📅 {}: {}", slug, years.join(", "));
    }
    Ok(())
}

fn run_show(cli: &Cli, slug: &str, year: &str, scale: Option<Scale>) -> Result<()> {
    let loader = open_loader(cli)?;
    let data = found(loader.get_jurisdiction_data(slug, year), slug, year)?;
    if cli.json {
        return print_json(&data);
    }

    let scale = scale.unwrap_or_else(|| {
        Scale::for_amount(data.total_revenue.abs().max(data.total_spending.abs()))
    });

    println!("💰 {} - {}", data.jurisdiction.name, data.year);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   Revenue:   {}", scale.format(data.total_revenue));
    println!("   Spending:  {}", scale.format(data.total_spending));
    println!("   Balance:   {}", scale.format(data.net_balance));
    if let Some(per_capita) = data.per_capita_spending {
        println!("   Per capita spending: {}", Scale::Raw.format(per_capita));
    }
    if let Some(url) = &data.jurisdiction.source_url {
        println!("   Source: {}", url);
    }

    println!("\n📥 Revenue sources");
    for link in data.sankey.links_to(HUB_NODE_ID) {
        let label = data.sankey.node(&link.source).map_or(link.source.as_str(), |n| n.label.as_str());
        println!("   {:<40} {:>12}", label, scale.format(link.value));
    }

    println!("\n📤 Spending");
    for link in data.sankey.links_from(HUB_NODE_ID) {
        let label = data.sankey.node(&link.target).map_or(link.target.as_str(), |n| n.label.as_str());
        println!("   {:<40} {:>12}", label, scale.format(link.value));
    }

    Ok(())
}

fn run_departments(
    cli: &Cli,
    slug: &str,
    year: &str,
    csv_out: Option<&Path>,
    scale: Option<Scale>,
) -> Result<()> {
    let loader = open_loader(cli)?;
    let rows = found(loader.get_expanded_departments(slug, year), slug, year)?;

    if let Some(path) = csv_out {
        write_departments_csv(path, &rows)?;
        println!("✓ Wrote {} rows to {}", rows.len(), path.display());
    }

    if cli.json {
        return print_json(&rows);
    }

    let max = rows.iter().map(|r| r.amount.abs()).fold(0.0, f64::max);
    let scale = scale.unwrap_or_else(|| Scale::for_amount(max));

    println!("🏛️  {} {} ({} rows)", slug, year, rows.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for row in &rows {
        let name = format!("{}{}", "  ".repeat(row.depth), row.name);
        println!(
            "   {:<48} {:>12} {:>6.1}%",
            name,
            scale.format(row.amount),
            row.share_of_parent * 100.0
        );
    }
    Ok(())
}

fn write_departments_csv(path: &Path, rows: &[ExpandedDepartment]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn run_audit(cli: &Cli, slug: &str, year: &str) -> Result<()> {
    let loader = open_loader(cli)?;
    let audit = found(loader.audit(slug, year), slug, year)?;
    if cli.json {
        return print_json(&audit);
    }

    println!("⚖️  {}", audit.summary());
    for node in audit.divergent_nodes() {
        println!(
            "   {:<40} in {:>14.2}  out {:>14.2}  ({})",
            node.label,
            node.inflow,
            node.outflow,
            node.status.as_str()
        );
    }
    Ok(())
}

fn run_import(cli: &Cli, db: &Path) -> Result<()> {
    println!("🗄️  Importing {} → {}", cli.data_dir.display(), db.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let source = FsDataSource::new(&cli.data_dir);
    let conn = Connection::open(db).with_context(|| format!("Failed to open {}", db.display()))?;
    let summary = import_dataset(&source, &conn).context("Import failed")?;

    println!("✓ Inserted:  {} records", summary.inserted);
    println!("✓ Updated:   {} records", summary.updated);
    println!("✓ Unchanged: {} records", summary.unchanged);
    println!("✓ Removed:   {} entries", summary.removed);
    println!("✓ Directories: {}", summary.directories);

    Ok(())
}
