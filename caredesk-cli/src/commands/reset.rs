//! `caredesk reset <entity>`: forget saved filters, sort and view settings

use anyhow::{Context, Result};
use caredesk_core::entity::{Entity, EntityKind};
use caredesk_core::list::EntityListManager;
use caredesk_core::with_entity;
use clap::Parser;

use super::parse_entity;
use crate::context::AppContext;

#[derive(Parser, Debug)]
pub struct ResetArgs {
    #[arg(value_parser = parse_entity)]
    pub entity: EntityKind,

    /// View key whose display preference should also be cleared
    #[arg(long)]
    pub view_key: Option<String>,
}

pub async fn run_reset(ctx: &AppContext, args: ResetArgs) -> Result<()> {
    with_entity!(args.entity, E => reset::<E>(ctx, args.view_key.as_deref()))
}

fn reset<E: Entity>(ctx: &AppContext, view_key: Option<&str>) -> Result<()> {
    let gateway = ctx.gateway::<E>()?;
    let mut list = match view_key {
        Some(key) => EntityListManager::with_view_key(ctx.session.clone(), gateway, key),
        None => EntityListManager::new(ctx.session.clone(), gateway),
    };
    list.reset_state()
        .with_context(|| format!("Failed to reset {} view state", E::LABEL))?;
    println!("Reset saved view state for {}", E::KEY);
    Ok(())
}
