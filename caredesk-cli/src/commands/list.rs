//! `caredesk list <entity>`: one tab view page

use anyhow::{bail, Result};
use caredesk_core::entity::{Entity, EntityKind};
use caredesk_core::list::FetchState;
use caredesk_core::persist::ViewPreference;
use caredesk_core::query::SortState;
use clap::{Parser, ValueEnum};

use super::{parse_entity, parse_pair};
use crate::context::AppContext;
use crate::{render, ui};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Table,
    Cards,
}

impl From<ViewMode> for ViewPreference {
    fn from(mode: ViewMode) -> Self {
        match mode {
            ViewMode::Table => ViewPreference::Table,
            ViewMode::Cards => ViewPreference::Cards,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Entity key (city, street, address, contract, insured_person, policy,
    /// provider_internal_code, crosswalk)
    #[arg(value_parser = parse_entity)]
    pub entity: EntityKind,

    /// Set a filter, e.g. --filter status=active (use "all" to clear one)
    #[arg(long = "filter", short = 'f', value_name = "KEY=VALUE", value_parser = parse_pair)]
    pub filters: Vec<(String, String)>,

    /// Free-text search across the entity's text fields
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Drop every saved filter before applying new ones
    #[arg(long)]
    pub clear_filters: bool,

    /// Sort field (persisted)
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending (with --sort)
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Page number (1-based)
    #[arg(long, short = 'p', default_value_t = 1)]
    pub page: u32,

    /// Rows per page (persisted, max 100)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Rendering mode (persisted per view)
    #[arg(long, value_enum)]
    pub view: Option<ViewMode>,

    /// Skip the cache and refetch
    #[arg(long)]
    pub refresh: bool,

    /// Print the page as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run_list(ctx: &AppContext, args: ListArgs) -> Result<()> {
    ctx.load_labels(args.entity).await;
    caredesk_core::with_entity!(args.entity, E => list_page::<E>(ctx, &args).await)
}

async fn list_page<E: Entity>(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let mut list = ctx.manager::<E>()?;

    if args.clear_filters {
        list.set_filters(Default::default());
    }
    for (key, value) in &args.filters {
        list.set_filter(key.as_str(), value.as_str());
    }
    if let Some(term) = &args.search {
        list.set_search(term.as_str());
    }
    if let Some(field) = &args.sort {
        list.set_sort(if args.desc {
            SortState::desc(field.as_str())
        } else {
            SortState::asc(field.as_str())
        });
    }
    if let Some(size) = args.page_size {
        list.set_page_size(size);
    }
    if let Some(mode) = args.view {
        list.set_view_preference(mode.into());
    }

    let state = list.fetch(args.refresh).await;
    list.set_page(args.page);
    let view = list.view();

    if let Some(warning) = &view.warning {
        eprintln!("⚠ {warning}");
    }
    if state == FetchState::Failed {
        if let Some(error) = &view.error {
            bail!("Failed to load {} records: {}", E::LABEL, error);
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view.page)?);
    } else {
        match list.view_preference() {
            ViewPreference::Table => print!("{}", render::table(&view.page, view.selected)),
            ViewPreference::Cards => print!("{}", render::cards(&view.page, view.selected)),
        }
    }
    ui::print_notices(list.take_notices());
    Ok(())
}
