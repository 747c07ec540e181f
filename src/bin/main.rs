use anyhow::Context;
use aqi_forecast::prelude::*;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "aqi-forecast")]
#[command(about = "Air-quality forecasting and AQI CLI")]
#[command(version)]
struct Cli {
    /// JSON pipeline configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Directory for persisted model sets
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List locations matching a query
    Search { query: String },
    /// Train the models of a location
    Train {
        query: String,
        #[arg(short, long)]
        model: Option<ModelKind>,
    },
    /// Forecast a location's air quality
    Predict {
        query: String,
        #[arg(long, default_value_t = 24)]
        hours: usize,
        #[arg(short, long)]
        model: Option<ModelKind>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = cli.model_dir {
        config = config.with_model_dir(dir);
    }
    if let Commands::Train { model: Some(kind), .. } | Commands::Predict { model: Some(kind), .. } = &cli.command {
        config = config.with_model_kind(*kind);
    }

    let pipeline = ForecastPipeline::new(Arc::new(SyntheticSource::now()), config)?;

    match cli.command {
        Commands::Search { query } => {
            let locations = pipeline.search(&query).await.map_err(user_facing)?;
            if locations.is_empty() {
                println!("No locations match '{}'", query);
            }
            for location in locations {
                println!(
                    "{:<16} {:<16} {:<3} ({:.4}, {:.4}) {}",
                    location.id, location.name, location.country_code, location.latitude, location.longitude, location.timezone
                );
            }
        }
        Commands::Train { query, .. } => {
            let location = pipeline.resolve(&query).await.map_err(user_facing)?;
            let report = pipeline.train(&location).await.map_err(user_facing)?;

            println!(
                "Trained {} models for {} on {} hourly rows in {} ms",
                report.model_kind, location.name, report.training_samples, report.duration_ms
            );
            println!("{:<6} {:>8} {:>10} {:>10} {:>8}", "", "imputed", "cv rmse", "cv mae", "cv r2");
            for (pollutant, metrics) in &report.metrics {
                let imputed = report
                    .imputation
                    .iter()
                    .find(|s| s.pollutant == *pollutant)
                    .map(|s| s.imputed)
                    .unwrap_or(0);
                match &metrics.mean {
                    Some(m) => println!(
                        "{:<6} {:>8} {:>10.4} {:>10.4} {:>8.3}",
                        pollutant.code(),
                        imputed,
                        m.rmse,
                        m.mae,
                        m.r2
                    ),
                    None => println!("{:<6} {:>8} {:>10} {:>10} {:>8}", pollutant.code(), imputed, "-", "-", "-"),
                }
            }
        }
        Commands::Predict { query, hours, json, .. } => {
            let result = pipeline.predict_query(&query, hours).await.map_err(user_facing)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            let current = result.headline();
            println!(
                "{}, {}: AQI {} ({}), primary pollutant {}",
                result.location.name,
                result.location.country,
                current.aqi,
                current.category,
                current.primary_pollutant.display_name()
            );
            println!("{}", current.recommendation);
            println!();
            for (pollutant, c) in &result.current_concentrations {
                println!(
                    "  {:<6} {:>10.3} {:<6} sub-AQI {:>3}{}",
                    pollutant.code(),
                    c.value,
                    c.unit,
                    c.sub_index,
                    if c.observed { "" } else { " (imputed)" }
                );
            }
            println!();
            println!("{:>4}  {:<17} {:>4}  {:<31} {}", "+h", "time (UTC)", "AQI", "category", "primary");
            for hour in &result.forecast {
                println!(
                    "{:>4}  {:<17} {:>4}  {:<31} {}",
                    hour.hours_ahead,
                    hour.timestamp.format("%Y-%m-%d %H:%M"),
                    hour.aqi.aqi,
                    hour.aqi.category.label(),
                    hour.aqi.primary_pollutant.code()
                );
            }
        }
    }

    Ok(())
}

fn user_facing(error: ForecastError) -> anyhow::Error {
    log::debug!("{:?}", error);
    anyhow::anyhow!("{} ({})", error.user_message(), error)
}
