// Command-line driver: load the assessment export once, apply the location
// filters, then run one dashboard view and write its tables to the output
// directory with a markdown preview on stdout.
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use scms_dashboard::aggregate::{self, FieldSpec, GroupKey, Metric, Reduction};
use scms_dashboard::config::{self, AppConfig};
use scms_dashboard::error::AppError;
use scms_dashboard::filter::{filter_records, FilterCriteria};
use scms_dashboard::ranking::{self, Polarity};
use scms_dashboard::types::SchoolRecord;
use scms_dashboard::util::{format_int, format_number, format_opt};
use scms_dashboard::{classify_schools, kpi, loader, output, reports, telemetry};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "scms-dashboard",
    about = "School infrastructure dashboards over the SCMS assessment export",
    version
)]
struct Cli {
    /// CSV export of the assessment sheet (overrides SCMS_DATA_PATH)
    #[arg(long)]
    data: Option<PathBuf>,
    /// Directory for generated files (overrides SCMS_OUTPUT_DIR)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Rows shown per preview table (overrides SCMS_PREVIEW_ROWS)
    #[arg(long)]
    preview: Option<usize>,
    #[command(flatten)]
    filter: FilterArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Kigali City, Secondary Cities or Rural Districts
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    province: Option<String>,
    #[arg(long)]
    district: Option<String>,
    #[arg(long)]
    sector: Option<String>,
    /// Restrict to a school by name; repeat for several
    #[arg(long = "school")]
    schools: Vec<String>,
}

impl FilterArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria::from_selection(
            self.location.as_deref(),
            self.province.as_deref(),
            self.district.as_deref(),
            self.sector.as_deref(),
            &self.schools,
        )
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Urgent / attention / good partitions
    Alerts,
    /// Rank groups on one metric
    Rank(RankArgs),
    /// Gap of each group's infrastructure index to the target
    Gaps(GapArgs),
    /// Overview, maintenance and safety headline figures
    Kpis,
    /// Maintenance figures of two provinces side by side
    Compare {
        #[arg(long)]
        left: String,
        #[arg(long)]
        right: String,
    },
    /// Every table plus summary.json
    Report,
}

#[derive(Args, Debug)]
struct RankArgs {
    /// province, district, sector or location
    #[arg(long, default_value = "district", value_parser = parse_group_key)]
    by: GroupKey,
    #[arg(long, default_value = "infrastructure_health", value_parser = parse_metric)]
    metric: Metric,
    /// Lower values rank first
    #[arg(long)]
    ascending: bool,
}

#[derive(Args, Debug)]
struct GapArgs {
    #[arg(long, default_value = "district", value_parser = parse_group_key)]
    by: GroupKey,
    /// Overrides SCMS_INFRA_TARGET
    #[arg(long)]
    target: Option<f64>,
}

fn parse_group_key(s: &str) -> Result<GroupKey, String> {
    GroupKey::from_name(s)
        .ok_or_else(|| format!("unknown group '{s}' (province, district, sector, location)"))
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    Metric::from_name(s).ok_or_else(|| {
        let names: Vec<&str> = Metric::all().iter().map(Metric::name).collect();
        format!("unknown metric '{s}', expected one of: {}", names.join(", "))
    })
}

struct Session<'a> {
    config: &'a AppConfig,
    criteria: FilterCriteria,
    records: &'a [SchoolRecord],
    subset: Vec<&'a SchoolRecord>,
}

impl Session<'_> {
    fn path(&self, file: &str) -> PathBuf {
        self.config.output_dir.join(file)
    }

    fn export_note(path: &Path) -> String {
        format!("full table exported to {}", path.display())
    }
}

fn run_alerts(s: &Session<'_>) -> Result<(), AppError> {
    let report = classify_schools(&s.subset);
    let rows = reports::alert_rows(&report);
    let path = s.path("alerts.csv");
    output::write_csv(&path, &rows)?;
    println!(
        "Alerts: {} urgent, {} attention, {} good of {} schools",
        format_int(report.urgent_count),
        format_int(report.attention_count),
        format_int(report.good_count),
        format_int(report.total_count)
    );
    output::preview_table(
        "School Alerts",
        Some(Session::export_note(&path).as_str()),
        &rows,
        s.config.preview_rows,
    );
    Ok(())
}

fn run_rank(s: &Session<'_>, args: &RankArgs) -> Result<(), AppError> {
    let mut fields = aggregate::district_metric_config();
    if !fields.iter().any(|f| f.name == args.metric.name()) {
        fields.push(FieldSpec::new(args.metric.name(), args.metric, Reduction::Mean));
    }
    let ranked = scms_dashboard::aggregate_and_rank(
        &s.subset,
        args.by,
        &fields,
        args.metric.name(),
        Polarity::from_ascending(args.ascending),
    );
    let rows = reports::group_ranking_rows(&ranked, args.by, args.metric.name());
    let path = s.path(&format!(
        "ranking_{}.csv",
        args.by.label().to_ascii_lowercase()
    ));
    output::write_csv(&path, &rows)?;
    output::preview_table(
        &format!("{} Ranking by {}", args.by.label(), args.metric),
        Some(Session::export_note(&path).as_str()),
        &rows,
        s.config.preview_rows,
    );
    let bottom = ranking::bottom_n(&ranked, s.config.preview_rows);
    if !bottom.is_empty() {
        println!("Lowest ranked:");
        for r in bottom {
            println!("  {:>3}. {} ({})", r.rank, r.item.key, format_opt(r.value, 2));
        }
    }
    Ok(())
}

fn run_gaps(s: &Session<'_>, args: &GapArgs) -> Result<(), AppError> {
    let target = match args.target {
        Some(t) => config::validate_target(t)?,
        None => s.config.infra_target,
    };
    let rows = aggregate::aggregate(
        s.subset.iter().copied(),
        args.by,
        &aggregate::district_metric_config(),
    );
    let gaps = ranking::group_gaps(&rows, aggregate::INFRA_INDEX, target);
    let table = reports::gap_rows(&gaps);
    let path = s.path(&format!("gaps_{}.csv", args.by.label().to_ascii_lowercase()));
    output::write_csv(&path, &table)?;
    output::preview_table(
        &format!(
            "Infrastructure Gap by {} (target {})",
            args.by.label(),
            format_number(target, 2)
        ),
        Some(Session::export_note(&path).as_str()),
        &table,
        s.config.preview_rows,
    );
    Ok(())
}

fn run_kpis(s: &Session<'_>) -> Result<(), AppError> {
    let overview = kpi::overview_kpis(&s.subset);
    let maintenance = kpi::maintenance_kpis(&s.subset);
    println!(
        "Schools {} | Students {} | S/C {} | S/T {} | Infra {} ({})",
        format_int(overview.total_schools),
        format_int(overview.total_students),
        format_opt(overview.avg_student_classroom, 1),
        format_opt(overview.avg_student_teacher, 1),
        format_opt(overview.avg_infrastructure, 2),
        overview.infrastructure_band.label()
    );
    println!(
        "Maintenance {}% | Delayed {} | Gap index {} | Degradation {}%/yr",
        format_number(maintenance.pct_doing_maintenance, 1),
        format_int(maintenance.delayed_count),
        format_number(maintenance.gap_index, 3),
        format_number(maintenance.degradation_rate, 2)
    );
    for rec in maintenance.recommendations() {
        println!("  - {rec}");
    }
    let safety = kpi::safety_kpis(&s.subset);
    println!(
        "Safety {} | Utilities {} | Hygiene {} | Access {}% | PTA {}% | Water {}% | Overall {}",
        format_opt(safety.avg_safety_compliance, 1),
        format_opt(safety.avg_utilities_reliability, 1),
        format_opt(safety.avg_hygiene, 2),
        format_number(safety.pct_accessibility, 1),
        format_number(safety.pct_pta, 1),
        format_number(safety.pct_water_available, 1),
        format_opt(safety.avg_overall_score, 1)
    );

    let risks = reports::risk_rows(&s.subset);
    let path = s.path("maintenance_risk.csv");
    output::write_csv(&path, &risks)?;
    output::preview_table(
        "Schools at Risk",
        Some(Session::export_note(&path).as_str()),
        &risks,
        s.config.preview_rows,
    );
    Ok(())
}

fn run_compare(s: &Session<'_>, left: &str, right: &str) -> Result<(), AppError> {
    let comparison = kpi::compare_provinces(s.records, left, right);
    let path = s.path("province_comparison.json");
    output::write_json(&path, &comparison)?;
    println!("\n{left} vs {right}");
    for c in &comparison {
        println!(
            "  {:<20} {:>10} {:>10}  {:?}",
            c.metric,
            format_opt(c.left, 2),
            format_opt(c.right, 2),
            c.winner
        );
    }
    Ok(())
}

fn run_report(s: &Session<'_>) -> Result<(), AppError> {
    run_alerts(s)?;
    run_rank(
        s,
        &RankArgs {
            by: GroupKey::District,
            metric: Metric::InfrastructureHealth,
            ascending: false,
        },
    )?;
    let sectors = scms_dashboard::aggregate_and_rank(
        &s.subset,
        GroupKey::Sector,
        &aggregate::sector_metric_config(),
        aggregate::INFRA_INDEX,
        Polarity::HigherIsBetter,
    );
    let sector_rows = reports::group_ranking_rows(&sectors, GroupKey::Sector, aggregate::INFRA_INDEX);
    output::write_csv(&s.path("ranking_sector.csv"), &sector_rows)?;
    run_gaps(
        s,
        &GapArgs {
            by: GroupKey::District,
            target: None,
        },
    )?;
    run_kpis(s)?;

    let districts = scms_dashboard::aggregate_and_rank(
        &s.subset,
        GroupKey::District,
        &aggregate::district_metric_config(),
        aggregate::INFRA_INDEX,
        Polarity::HigherIsBetter,
    );
    let leaders: Vec<_> = ranking::top_n(&districts, 5).iter().map(|r| &r.item).collect();
    let radar = ranking::radar_profiles(&leaders, &ranking::district_radar_axes());
    output::write_json(&s.path("district_radar.json"), &radar)?;

    let alerts = classify_schools(&s.subset);
    let summary = reports::generate_summary(
        &s.subset,
        &s.criteria,
        &alerts,
        Local::now().date_naive(),
    );
    let path = s.path("summary.json");
    output::write_json(&path, &summary)?;
    println!(
        "Summary ({}): {} schools, {} urgent, {} with critical inspection issues",
        path.display(),
        format_int(summary.alerts.total),
        format_int(summary.alerts.urgent),
        format_int(summary.schools_with_critical_issues)
    );
    Ok(())
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(data) = cli.data {
        config.data_path = data;
    }
    if let Some(dir) = cli.output {
        config.output_dir = dir;
    }
    if let Some(rows) = cli.preview {
        config.preview_rows = rows;
    }

    telemetry::init(&config.telemetry)?;
    output::ensure_dir(&config.output_dir)?;

    let (dataset, load_report) = loader::load_and_clean(&config.data_path)?;
    println!(
        "Processing dataset... ({} rows loaded, {} skipped)",
        format_int(load_report.loaded_rows),
        format_int(load_report.parse_errors)
    );
    if !load_report.defects.is_empty() {
        println!(
            "Note: {} values outside their documented range were kept as-is.",
            format_int(load_report.defects.len())
        );
    }

    let criteria = cli.filter.criteria();
    let subset = filter_records(&dataset, &criteria);
    info!(selection = %criteria.describe(), schools = subset.len(), "filter applied");
    println!(
        "Selection: {} ({} schools)",
        criteria.describe(),
        format_int(subset.len())
    );

    let session = Session {
        config: &config,
        criteria,
        records: dataset.records(),
        subset,
    };

    match &cli.command {
        Command::Alerts => run_alerts(&session),
        Command::Rank(args) => run_rank(&session, args),
        Command::Gaps(args) => run_gaps(&session, args),
        Command::Kpis => run_kpis(&session),
        Command::Compare { left, right } => run_compare(&session, left, right),
        Command::Report => run_report(&session),
    }
}
