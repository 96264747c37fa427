//! `caredesk import <entity> <file>`: bulk load from CSV or JSON

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use caredesk_core::entity::{Entity, EntityKind};
use caredesk_core::import::{map_rows, read_rows, RawRow, RowIssue};
use caredesk_core::with_entity;
use clap::Parser;
use tracing::info;

use super::parse_entity;
use crate::context::AppContext;
use crate::ui;

#[derive(Parser, Debug)]
pub struct ImportArgs {
    #[arg(value_parser = parse_entity)]
    pub entity: EntityKind,

    /// CSV file with a header row, or a JSON array of objects
    pub file: PathBuf,

    /// Map and validate rows without sending anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

pub async fn run_import(ctx: &AppContext, args: ImportArgs) -> Result<()> {
    let rows = read_rows(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    info!(file = %args.file.display(), rows = rows.len(), "read import file");

    with_entity!(args.entity, E => import::<E>(ctx, &rows, args.dry_run).await)
}

fn print_issues(issues: &[RowIssue]) {
    for issue in issues {
        eprintln!("  row {}: {}", issue.row, issue.reason);
    }
}

async fn import<E: Entity>(ctx: &AppContext, rows: &[RawRow], dry_run: bool) -> Result<()> {
    if dry_run {
        let batch = map_rows::<E>(rows);
        print_issues(&batch.issues);
        println!("{} (dry run)", batch.summary);
        return Ok(());
    }

    let mut list = ctx.manager::<E>()?;
    let report = ui::with_spinner_async(
        format!("Importing {} records", E::LABEL.to_lowercase()),
        "Import finished",
        list.import_rows(rows),
    )
    .await
    .with_context(|| format!("Failed to import {} records", E::LABEL))?;

    ui::print_notices(list.take_notices());
    print_issues(&report.issues);
    println!("{}", report.summary);
    if report.summary.accepted == 0 && report.summary.total > 0 {
        bail!("No rows were accepted");
    }
    Ok(())
}
