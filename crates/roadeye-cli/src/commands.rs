use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use tokio::sync::{mpsc, watch};
use tracing::warn;

use roadeye_core::models::Detection;
use roadeye_core::store::LoadOutcome;
use roadeye_core::sync::{DetectOutcome, RefreshOutcome, SyncEvent};
use roadeye_core::utils::{format_date_time, format_distance, format_relative_time, truncate_text};
use roadeye_core::{
    Coordinate, HazardId, HazardRecord, HazardType, NewHazard, Severity, SyncController,
};

/// Width of the description column in hazard listings
const DESCRIPTION_WIDTH: usize = 40;

/// Buffered sync events between the refresh loop and the printer
const EVENT_CHANNEL_CAPACITY: usize = 16;

pub struct ReportArgs {
    pub hazard_type: HazardType,
    pub severity: Severity,
    pub description: Option<String>,
    pub image: Option<PathBuf>,
}

// ============================================================================
// Output
// ============================================================================

fn hazard_line(hazard: &HazardRecord) -> String {
    let distance = hazard
        .distance
        .map(format_distance)
        .unwrap_or_else(|| "?".to_string());
    let verified = if hazard.verified { "✓" } else { " " };
    let description = hazard
        .description
        .as_deref()
        .map(|d| truncate_text(d, DESCRIPTION_WIDTH))
        .unwrap_or_default();
    format!(
        "{:>8}  {:<12} {:<6} {} {:<16} {}  [{}]",
        distance,
        hazard.hazard_type.display_name(),
        hazard.severity.as_str(),
        verified,
        format_relative_time(&hazard.timestamp, &Utc::now()),
        description,
        hazard.id,
    )
}

fn print_hazards(hazards: &[HazardRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hazards)?);
        return Ok(());
    }
    if hazards.is_empty() {
        println!("No hazards nearby.");
        return Ok(());
    }
    for hazard in hazards {
        println!("{}", hazard_line(hazard));
    }
    Ok(())
}

fn print_detection(detection: &Detection) {
    match (&detection.hazard, detection.confidence) {
        (Some(candidate), Some(confidence)) if detection.detected => println!(
            "Detected {} ({}) with {:.0}% confidence",
            candidate.hazard_type,
            candidate.severity,
            confidence * 100.0
        ),
        (Some(candidate), None) if detection.detected => {
            println!("Detected {} ({})", candidate.hazard_type, candidate.severity)
        }
        _ => println!("No hazard detected."),
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))
}

// ============================================================================
// Commands
// ============================================================================

pub async fn nearby(controller: &SyncController, refresh: bool, json: bool) -> Result<()> {
    controller.start().await;
    let store = controller.store();

    match controller.refresh_map(refresh).await {
        Ok(RefreshOutcome::CacheFresh) => {
            eprintln!("Using cached hazards ({})", store.cache_age_display());
        }
        Ok(_) => {}
        // Stale data beats no data when offline
        Err(e) if !store.is_empty() => {
            warn!(error = %e, "Refresh failed, showing cached hazards");
            eprintln!(
                "Offline: showing cached hazards ({}): {}",
                store.cache_age_display(),
                e
            );
        }
        Err(e) => return Err(e.into()),
    }

    print_hazards(&store.hazards(), json)
}

pub async fn alerts(controller: &SyncController, json: bool) -> Result<()> {
    controller.refresh_alerts().await?;
    print_hazards(&controller.store().nearby_hazards(), json)
}

pub async fn watch(controller: Arc<SyncController>) -> Result<()> {
    controller.start().await;

    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (stop_tx, stop_rx) = watch::channel(false);
    let worker = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run_periodic(tx, stop_rx).await })
    };

    eprintln!(
        "Refreshing every {}s, press Ctrl-C to stop",
        controller.options().refresh_interval.as_secs()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(SyncEvent::MapRefreshed(RefreshOutcome::Applied { count })) => {
                    println!("[{}] map: {} hazards", Local::now().format("%H:%M:%S"), count);
                }
                Some(SyncEvent::MapRefreshed(_)) => {}
                Some(SyncEvent::AlertsRefreshed { .. }) => {
                    println!("[{}] nearest:", Local::now().format("%H:%M:%S"));
                    for hazard in controller.store().nearby_hazards().iter().take(5) {
                        println!("  {}", hazard_line(hazard));
                    }
                }
                Some(SyncEvent::Error(message)) => eprintln!("Refresh failed: {}", message),
                None => break,
            },
            _ = &mut ctrl_c => {
                let _ = stop_tx.send(true);
                break;
            }
        }
    }

    drop(rx);
    worker.await?;
    Ok(())
}

pub async fn report(
    controller: &SyncController,
    position: Option<Coordinate>,
    args: ReportArgs,
) -> Result<()> {
    let position =
        position.ok_or_else(|| anyhow::anyhow!("--lat and --lon are required to report"))?;

    let mut hazard = NewHazard::new(args.hazard_type, position, args.severity);
    hazard.description = args.description;
    if let Some(ref path) = args.image {
        hazard.image = Some(read_image(path)?);
    }

    let reported = controller.report(hazard).await?;
    println!("Reported {}", reported.summary());
    println!("  id: {}", reported.id);
    println!("  at: {}", format_date_time(&reported.timestamp.with_timezone(&Local)));
    Ok(())
}

pub async fn detect(controller: &SyncController, image: &Path, dry_run: bool) -> Result<()> {
    let bytes = read_image(image)?;

    if dry_run {
        let detection = controller.detect(&bytes).await?;
        print_detection(&detection);
        return Ok(());
    }

    match controller.detect_and_report(bytes).await? {
        DetectOutcome::NothingDetected(detection) => print_detection(&detection),
        DetectOutcome::Reported(hazard) => {
            println!("Reported {}", hazard.summary());
            println!("  id: {}", hazard.id);
        }
    }
    Ok(())
}

pub async fn verify(controller: &SyncController, id: &str) -> Result<()> {
    controller.verify(&HazardId::from(id)).await?;
    println!("Verified {}", id);
    Ok(())
}

pub async fn delete(controller: &SyncController, id: &str) -> Result<()> {
    controller.delete(&HazardId::from(id)).await?;
    println!("Deleted {}", id);
    Ok(())
}

pub async fn show(controller: &SyncController, id: &str, json: bool) -> Result<()> {
    let hazard = controller.lookup(&HazardId::from(id)).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&hazard)?);
        return Ok(());
    }

    println!("{}", hazard.summary());
    println!("  id:        {}", hazard.id);
    println!("  location:  {}", hazard.location);
    if let Some(distance) = hazard.distance {
        println!("  distance:  {}", format_distance(distance));
    }
    println!("  reported:  {}", format_date_time(&hazard.timestamp.with_timezone(&Local)));
    if let Some(ref by) = hazard.reported_by {
        println!("  by:        {}", by);
    }
    println!(
        "  verified:  {} ({} confirmations)",
        if hazard.verified { "yes" } else { "no" },
        hazard.verify_count
    );
    if let Some(ref url) = hazard.image_url {
        println!("  image:     {}", url);
    }
    Ok(())
}

pub async fn cache_info(controller: &SyncController) -> Result<()> {
    let ttl = controller.store().cache_ttl();
    match controller.start().await {
        LoadOutcome::Adopted { count, captured_at } => {
            println!("Cached hazards: {}", count);
            println!(
                "Captured:       {} ({})",
                format_date_time(&captured_at.with_timezone(&Local)),
                controller.store().cache_age_display()
            );
            println!("Fresh for:      {}s", (ttl - (Utc::now() - captured_at)).num_seconds().max(0));
        }
        LoadOutcome::Expired { captured_at } => {
            println!(
                "Cached snapshot expired (captured {})",
                format_date_time(&captured_at.with_timezone(&Local))
            );
        }
        LoadOutcome::Missing => println!("No cached hazards."),
        LoadOutcome::Unreadable => println!("Cached hazards could not be read and will be replaced."),
    }
    Ok(())
}

pub async fn clear(controller: &SyncController) -> Result<()> {
    controller.store().purge().await;
    println!("Hazard cache cleared.");
    Ok(())
}
