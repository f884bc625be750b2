use clap::{Args, Parser, Subcommand};
use dc_app::{AppResult, Dashboard, DashboardConfig, JobSnapshot, JobState, ViewSettings};
use dc_client::SeriesRow;
use dc_core::{DemandType, EnergyUnit, ScenarioKey, SectorName, Year};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dc-cli")]
#[command(about = "demandcast CLI - scenario views over a demand forecasting service", long_about = None)]
struct Cli {
    /// Dashboard config file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the analysis service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Override the project path sent to the service
    #[arg(long, global = true)]
    project: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List scenarios of the project
    Scenarios,
    /// Show available models and the derived model selection of a scenario
    Models { scenario: String },
    /// Print the consolidated projection of a scenario
    Consolidate {
        scenario: String,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Print the consolidated projections of two scenarios
    Compare {
        primary: String,
        target: String,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Print one sector's series, optionally against a second scenario
    Sector {
        scenario: String,
        sector: String,
        /// Scenario to compare against
        #[arg(long)]
        against: Option<String>,
    },
    /// Run a forecast and follow its progress
    Forecast {
        scenario: String,
        /// Sectors to forecast (defaults to all)
        #[arg(long, value_delimiter = ',')]
        sectors: Vec<String>,
    },
    /// Dump the persisted dashboard state as JSON
    State,
}

#[derive(Args)]
struct ViewArgs {
    #[arg(long)]
    start: Option<Year>,
    #[arg(long)]
    end: Option<Year>,
    /// gross, net or onGrid
    #[arg(long)]
    demand_type: Option<DemandType>,
    /// kWh, MWh, GWh or TWh
    #[arg(long)]
    unit: Option<EnergyUnit>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("✗ {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<ExitCode> {
    let mut config = DashboardConfig::load_or_default(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.service.base_url = base_url;
    }
    if let Some(project) = cli.project {
        config.service.project_path = project;
    }
    config.validate()?;
    let dashboard = Dashboard::connect(config);

    match cli.command {
        Commands::Scenarios => cmd_scenarios(&dashboard).await,
        Commands::Models { scenario } => cmd_models(&dashboard, &scenario.into()).await,
        Commands::Consolidate { scenario, view } => {
            cmd_consolidate(&dashboard, &scenario.into(), &view).await
        }
        Commands::Compare {
            primary,
            target,
            view,
        } => cmd_compare(&dashboard, &primary.into(), &target.into(), &view).await,
        Commands::Sector {
            scenario,
            sector,
            against,
        } => {
            cmd_sector(
                &dashboard,
                &scenario.into(),
                &sector.into(),
                against.map(ScenarioKey::from).as_ref(),
            )
            .await
        }
        Commands::Forecast { scenario, sectors } => {
            cmd_forecast(&dashboard, &scenario.into(), sectors).await
        }
        Commands::State => cmd_state(&dashboard),
    }
}

async fn cmd_scenarios(dashboard: &Dashboard) -> AppResult<ExitCode> {
    let scenarios = dashboard.catalog().scenarios().await?;
    if scenarios.is_empty() {
        println!("No scenarios found in project");
    } else {
        println!("Scenarios in project:");
        for key in scenarios {
            println!("  {key}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_models(dashboard: &Dashboard, key: &ScenarioKey) -> AppResult<ExitCode> {
    let state = dashboard.open_scenario(key).await?;
    let available = dashboard.catalog().models(key).await?;
    let selections = dashboard.defaults().ensure_model_selections(key).await?;

    println!("Scenario '{key}' (data through {}):", dashboard.store().max_year(key));
    for (sector, models) in &available {
        let chosen = selections
            .get(sector)
            .map(|m| m.as_str())
            .unwrap_or("-");
        let listed: Vec<&str> = models.iter().map(|m| m.as_str()).collect();
        println!("  {sector}: {chosen}  (available: {})", listed.join(", "));
    }
    tracing::debug!(scenario = %key, selection = %state.active_selection, "cli.models");
    Ok(ExitCode::SUCCESS)
}

impl ViewArgs {
    fn settings(&self) -> ViewSettings {
        ViewSettings {
            start: self.start,
            end: self.end,
            demand_type: self.demand_type,
            unit: self.unit,
        }
    }
}

async fn cmd_consolidate(
    dashboard: &Dashboard,
    key: &ScenarioKey,
    view: &ViewArgs,
) -> AppResult<ExitCode> {
    dashboard.open_scenario(key).await?;
    dashboard.apply_view(&[key], &view.settings()).await?;

    let orchestrator = dashboard.consolidated();
    orchestrator.show_single(key).await?;
    orchestrator.settled().await;

    let state = orchestrator.single_state();
    match (state.data, state.error) {
        (_, Some(error)) => {
            eprintln!("✗ {key}: {}", error.message);
            Ok(ExitCode::FAILURE)
        }
        (Some(data), None) => {
            let unit = dashboard.store().get(key).unit;
            print_rows(&data.in_unit(unit).rows, unit);
            Ok(ExitCode::SUCCESS)
        }
        (None, None) => Ok(ExitCode::SUCCESS),
    }
}

async fn cmd_compare(
    dashboard: &Dashboard,
    primary: &ScenarioKey,
    target: &ScenarioKey,
    view: &ViewArgs,
) -> AppResult<ExitCode> {
    dashboard.open_scenario(primary).await?;
    dashboard
        .apply_view(&[primary, target], &view.settings())
        .await?;

    let orchestrator = dashboard.consolidated();
    orchestrator.enter_comparison(primary, target).await?;
    orchestrator.settled().await;

    let unit = dashboard.store().get(primary).unit;
    let (a, b) = orchestrator.comparison_states();
    let mut code = ExitCode::SUCCESS;
    for (key, state) in [(primary, a), (target, b)] {
        println!("# {key}");
        if let Some(error) = state.error {
            eprintln!("✗ {key}: {}", error.message);
            code = ExitCode::FAILURE;
        } else if let Some(data) = state.data {
            print_rows(&data.in_unit(unit).rows, unit);
        }
    }
    Ok(code)
}

async fn cmd_sector(
    dashboard: &Dashboard,
    key: &ScenarioKey,
    sector: &SectorName,
    against: Option<&ScenarioKey>,
) -> AppResult<ExitCode> {
    dashboard.open_scenario(key).await?;
    let view = dashboard.sector_data();
    match against {
        Some(target) => view.compare(key, target, sector).await?,
        None => view.show(key, sector).await?,
    }
    view.settled().await;

    let unit = dashboard.store().get(key).unit;
    let mut sides = vec![(key, view.primary_state())];
    if let Some(target) = against {
        sides.push((target, view.target_state()));
    }
    let mut code = ExitCode::SUCCESS;
    for (scenario, state) in sides {
        println!("# {scenario} / {sector}");
        if let Some(error) = state.error {
            eprintln!("✗ {scenario}: {}", error.message);
            code = ExitCode::FAILURE;
            continue;
        }
        if let Some(data) = state.data {
            let data = data.in_unit(unit);
            if let Some(year) = data.forecast_start_year {
                println!("# forecast from {year}");
            }
            print_rows(&data.rows, unit);
        }
    }
    Ok(code)
}

async fn cmd_forecast(
    dashboard: &Dashboard,
    key: &ScenarioKey,
    sectors: Vec<String>,
) -> AppResult<ExitCode> {
    let sectors: Vec<SectorName> = if sectors.is_empty() {
        dashboard.catalog().profile(key).await?.sectors
    } else {
        sectors.into_iter().map(SectorName::from).collect()
    };
    println!("Running forecast for scenario: {key} ({} sectors)", sectors.len());

    let started = Instant::now();
    let mut last_emit = Instant::now();
    let mut last_percent = -1.0f64;
    let snapshot = dashboard
        .forecasts()
        .run(
            key,
            sectors,
            Some(&mut |job: &JobSnapshot| {
                let emit_now = job.state.is_terminal()
                    || (job.percent - last_percent).abs() >= 0.5
                    || last_emit.elapsed().as_millis() >= 100;
                if emit_now {
                    render_progress(job, started.elapsed().as_secs_f64());
                    last_percent = job.percent;
                    last_emit = Instant::now();
                }
            }),
        )
        .await;
    clear_progress_line();

    for (sector, reason) in &snapshot.tally.failed {
        println!("  ✗ {sector}: {reason}");
    }
    match &snapshot.state {
        JobState::Completed => {
            if let Some(result) = snapshot.result {
                println!(
                    "✓ Forecast completed: {}/{} sectors succeeded",
                    result.successful_sectors, result.total_sectors
                );
            }
            dashboard.reload_scenario(key).await?;
            Ok(ExitCode::SUCCESS)
        }
        JobState::Failed(reason) => {
            eprintln!("✗ {reason}");
            Ok(ExitCode::FAILURE)
        }
        JobState::Idle | JobState::Running => Ok(ExitCode::FAILURE),
    }
}

fn cmd_state(dashboard: &Dashboard) -> AppResult<ExitCode> {
    println!("{}", dashboard.store().snapshot().to_json()?);
    Ok(ExitCode::SUCCESS)
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_progress(job: &JobSnapshot, elapsed_s: f64) {
    let width = 28usize;
    let filled = ((job.percent / 100.0 * width as f64).round() as usize).min(width);
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let mut line = format!(
        "\r[{}] {:>6.2}%  done={} failed={}  elapsed={:.1}s",
        bar,
        job.percent,
        job.tally.completed.len(),
        job.tally.failed.len(),
        elapsed_s
    );
    if let Some(sector) = &job.current_sector {
        line.push_str(&format!("  sector={sector}"));
    }
    if !job.message.is_empty() {
        line.push_str(&format!("  {}", job.message));
    }
    print!("{line}");
    let _ = io::stdout().flush();
}

/// CSV with one column per series, sorted by name.
fn print_rows(rows: &[SeriesRow], unit: EnergyUnit) {
    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.values.keys().map(String::as_str))
        .collect();
    let header: Vec<&str> = columns.iter().copied().collect();
    println!("# unit: {}", unit.label());
    println!("year,{}", header.join(","));
    for row in rows {
        let values: Vec<String> = header
            .iter()
            .map(|c| row.values.get(*c).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        println!("{},{}", row.year, values.join(","));
    }
}
