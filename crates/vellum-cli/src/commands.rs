// CLI subcommand dispatch.

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use vellum_core::app::Inventory;
use vellum_core::domain::{ArtifactDescriptor, ArtifactLocation, PageId, RetentionPolicy};
use vellum_core::impls::HttpGateway;
use vellum_core::{BackupMode, Vault, VaultBuilder, VaultConfig};

#[derive(Subcommand)]
pub enum Command {
    /// Snapshot a page into a new artifact
    Capture {
        page_id: String,
    },
    /// List a page's artifacts, newest first
    List {
        page_id: String,
    },
    /// Summarize one artifact without restoring it
    Show {
        location: String,
    },
    /// Replay an artifact onto its page after backing up its current state
    Restore {
        location: String,
        /// Restore even when the current state cannot be backed up
        #[arg(long)]
        allow_unprotected: bool,
    },
    /// Evict artifacts outside the retention policy
    Retain {
        /// Override retention.max_artifacts_per_page
        #[arg(long)]
        max_artifacts: Option<usize>,
        /// Override retention.max_age_days
        #[arg(long)]
        max_age_days: Option<u32>,
    },
    /// Archive a page after backing it up
    Archive {
        page_id: String,
        /// Archive even when the backup cannot be written
        #[arg(long)]
        allow_unprotected: bool,
    },
    /// Artifact counts and sizes per page
    Status,
    /// Run retention periodically until interrupted
    Watch,
}

pub async fn run(cmd: Command, config: VaultConfig, json: bool) -> anyhow::Result<()> {
    match cmd {
        Command::Capture { page_id } => {
            let vault = open_vault(config, true)?;
            let descriptor = vault.capture_page(&parse_page(&page_id)?).await?;
            print(json, &descriptor, || describe_line(&descriptor))
        }
        Command::List { page_id } => {
            let vault = open_vault(config, false)?;
            let descriptors = vault.list_artifacts(&parse_page(&page_id)?).await?;
            print(json, &descriptors, || {
                descriptors
                    .iter()
                    .map(describe_line)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Show { location } => {
            let vault = open_vault(config, false)?;
            let snapshot = vault.load_artifact(&ArtifactLocation::new(location)).await?;
            let summary = json!({
                "page_id": snapshot.page_id(),
                "captured_at": snapshot.captured_at,
                "properties": snapshot.properties().len(),
                "top_level_blocks": snapshot.blocks.len(),
                "total_blocks": snapshot.block_count(),
            });
            print(json, &summary, || {
                format!(
                    "page {} captured {}: {} properties, {} top-level blocks ({} total)",
                    snapshot.page_id(),
                    snapshot
                        .captured_at
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| "unknown".into()),
                    snapshot.properties().len(),
                    snapshot.blocks.len(),
                    snapshot.block_count(),
                )
            })
        }
        Command::Restore {
            location,
            allow_unprotected,
        } => {
            let vault = open_vault(config, true)?;
            let receipt = vault
                .restore_artifact(
                    &ArtifactLocation::new(location),
                    backup_mode(allow_unprotected),
                )
                .await
                .context("restore aborted; the page may be partially restored")?;
            let backup = receipt.backup.descriptor().cloned();
            print(
                json,
                &json!({ "restored": receipt.page_id, "backup": backup }),
                || match &backup {
                    Some(d) => format!(
                        "restored page {}, previous state at {}",
                        receipt.page_id, d.location
                    ),
                    None => format!(
                        "restored page {} WITHOUT a backup of its previous state",
                        receipt.page_id
                    ),
                },
            )
        }
        Command::Retain {
            max_artifacts,
            max_age_days,
        } => {
            let vault = open_vault(config, false)?;
            let configured = vault.retention_policy();
            let policy = RetentionPolicy {
                max_artifacts_per_page: max_artifacts.or(configured.max_artifacts_per_page),
                max_age_days: max_age_days.or(configured.max_age_days),
            };
            let report = vault.evict(&policy).await?;
            let failed: Vec<_> = report
                .failures
                .iter()
                .map(|f| json!({ "location": f.descriptor.location, "error": f.error.to_string() }))
                .collect();
            print(
                json,
                &json!({ "evicted": report.evicted_count(), "failed": failed }),
                || format!("evicted {} artifact(s)", report.evicted_count()),
            )?;
            if !report.is_complete() {
                bail!("{} artifact(s) could not be deleted", report.failures.len());
            }
            Ok(())
        }
        Command::Archive {
            page_id,
            allow_unprotected,
        } => {
            let vault = open_vault(config, true)?;
            let receipt = vault
                .archive_page(&parse_page(&page_id)?, backup_mode(allow_unprotected))
                .await
                .context("page was not archived")?;
            let backup = receipt.backup.descriptor().cloned();
            print(
                json,
                &json!({ "archived": receipt.page_id, "backup": backup }),
                || match &backup {
                    Some(d) => format!("archived page {}, backup at {}", receipt.page_id, d.location),
                    None => format!("archived page {} WITHOUT a backup", receipt.page_id),
                },
            )
        }
        Command::Status => {
            let vault = open_vault(config, false)?;
            let inventory = vault.inventory().await?;
            print(json, &inventory, || inventory_table(&inventory))
        }
        Command::Watch => {
            let vault = open_vault(config, false)?;
            let handle = vault.spawn_retention_loop();
            info!(
                interval_secs = vault.config().retention.interval_secs,
                "retention loop running, Ctrl-C to stop"
            );
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            let passes = handle.shutdown_and_join().await;
            info!(passes, "retention loop stopped");
            Ok(())
        }
    }
}

/// Storage-only commands never reach the remote side, so a missing token is
/// only an error when `needs_remote` is set.
fn open_vault(config: VaultConfig, needs_remote: bool) -> anyhow::Result<Vault> {
    let gateway = if needs_remote {
        HttpGateway::from_env(&config.gateway)?
    } else {
        let token = std::env::var(&config.gateway.token_env).unwrap_or_default();
        HttpGateway::new(&config.gateway, &token)?
    };
    Ok(VaultBuilder::new(config).gateway(Arc::new(gateway)).build()?)
}

fn backup_mode(allow_unprotected: bool) -> BackupMode {
    if allow_unprotected {
        BackupMode::BestEffort
    } else {
        BackupMode::Required
    }
}

fn parse_page(raw: &str) -> anyhow::Result<PageId> {
    PageId::parse(raw).with_context(|| format!("invalid page id {raw:?}"))
}

fn describe_line(d: &ArtifactDescriptor) -> String {
    format!(
        "{}  {:>9} B  {}",
        d.captured_at.to_rfc3339(),
        d.size_bytes,
        d.location
    )
}

fn inventory_table(inventory: &Inventory) -> String {
    let mut lines: Vec<String> = inventory
        .pages
        .iter()
        .map(|p| {
            format!(
                "{}  {} artifact(s)  {} B  newest {}  oldest {}",
                p.page_id,
                p.artifacts,
                p.total_bytes,
                p.newest.to_rfc3339(),
                p.oldest.to_rfc3339()
            )
        })
        .collect();
    lines.push(format!(
        "total: {} artifact(s), {} B",
        inventory.total_artifacts, inventory.total_bytes
    ));
    lines.join("\n")
}

fn print<T: Serialize>(
    json: bool,
    value: &T,
    human: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let text = human();
        if !text.is_empty() {
            println!("{text}");
        }
    }
    Ok(())
}
