//! Single-record commands: show, create, update, delete

use anyhow::{anyhow, bail, Context, Result};
use caredesk_core::entity::{Entity, EntityKind};
use caredesk_core::error::SubmitError;
use caredesk_core::form::DialogForm;
use caredesk_core::list::EntityListManager;
use caredesk_core::with_entity;
use clap::Parser;

use super::{parse_entity, parse_pair};
use crate::context::AppContext;
use crate::ui;

#[derive(Parser, Debug)]
pub struct ShowArgs {
    #[arg(value_parser = parse_entity)]
    pub entity: EntityKind,

    /// Record id
    pub id: String,
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    #[arg(value_parser = parse_entity)]
    pub entity: EntityKind,

    /// Field assignment, e.g. --set name_en=Haifa --set contact.phone=04-1234567
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_pair)]
    pub fields: Vec<(String, String)>,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    #[arg(value_parser = parse_entity)]
    pub entity: EntityKind,

    /// Record id
    pub id: String,

    /// Field assignment; empty value clears an optional field
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_pair, required = true)]
    pub fields: Vec<(String, String)>,
}

#[derive(Parser, Debug)]
pub struct DeleteArgs {
    #[arg(value_parser = parse_entity)]
    pub entity: EntityKind,

    /// Record ids (deleted in parallel)
    #[arg(required = true)]
    pub ids: Vec<String>,
}

pub async fn run_show(ctx: &AppContext, args: ShowArgs) -> Result<()> {
    with_entity!(args.entity, E => show::<E>(ctx, &args.id).await)
}

pub async fn run_create(ctx: &AppContext, args: CreateArgs) -> Result<()> {
    with_entity!(args.entity, E => {
        let mut list = ctx.manager::<E>()?;
        let mut form = DialogForm::<E>::new();
        form.open_create();
        submit(&mut list, &mut form, &args.fields).await
    })
}

pub async fn run_update(ctx: &AppContext, args: UpdateArgs) -> Result<()> {
    with_entity!(args.entity, E => {
        let mut list = ctx.manager::<E>()?;
        let record = find::<E>(&mut list, &args.id).await?;
        let mut form = DialogForm::<E>::new();
        form.open_edit(&record);
        submit(&mut list, &mut form, &args.fields).await
    })
}

pub async fn run_delete(ctx: &AppContext, args: DeleteArgs) -> Result<()> {
    with_entity!(args.entity, E => {
        let mut list = ctx.manager::<E>()?;
        let outcome = list.bulk_remove(&args.ids).await;
        ui::print_notices(list.take_notices());
        for (id, error) in &outcome.failures {
            eprintln!("  {id}: {error}");
        }
        if outcome.failed > 0 {
            bail!("{}", outcome);
        }
        println!("{outcome}");
        Ok(())
    })
}

async fn find<E: Entity>(list: &mut EntityListManager<E>, id: &str) -> Result<E> {
    list.fetch(false).await;
    if let Some(error) = list.error() {
        bail!("Failed to load {} records: {}", E::LABEL, error);
    }
    list.raw()
        .iter()
        .find(|record| record.id() == Some(id))
        .cloned()
        .ok_or_else(|| anyhow!("{} '{}' not found", E::LABEL, id))
}

async fn show<E: Entity>(ctx: &AppContext, id: &str) -> Result<()> {
    let mut list = ctx.manager::<E>()?;
    let record = find(&mut list, id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Apply assignments to the draft and submit; field errors are listed.
async fn submit<E: Entity>(
    list: &mut EntityListManager<E>,
    form: &mut DialogForm<E>,
    fields: &[(String, String)],
) -> Result<()> {
    for (field, value) in fields {
        form.set_field(field, value)
            .with_context(|| format!("Cannot set {field}"))?;
    }

    let result = list.submit_form(form).await;
    ui::print_notices(list.take_notices());
    match result {
        Ok(saved) => {
            println!("{}", serde_json::to_string_pretty(&saved)?);
            Ok(())
        }
        Err(SubmitError::Invalid { errors }) => {
            for (field, message) in &errors {
                eprintln!("  {field}: {message}");
            }
            bail!("{} is invalid: {} field(s) failed validation", E::LABEL, errors.len())
        }
        Err(SubmitError::Gateway(e)) => {
            Err(anyhow::Error::new(e).context(format!("Failed to save {}", E::LABEL)))
        }
    }
}
