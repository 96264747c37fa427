//! Command implementations for the caredesk CLI

pub mod import;
pub mod list;
pub mod records;
pub mod reset;
#[cfg(feature = "server")]
pub mod serve;

use caredesk_core::entity::EntityKind;

// Re-export dispatcher functions for flat access from main.rs
pub use import::run_import;
pub use list::run_list;
pub use records::{run_create, run_delete, run_show, run_update};
pub use reset::run_reset;
#[cfg(feature = "server")]
pub use serve::run_serve;

/// clap value parser for entity keys (`city`, `insured-person`, `cities`)
pub fn parse_entity(s: &str) -> Result<EntityKind, String> {
    EntityKind::from_key(s).map_err(|e| e.to_string())
}

/// clap value parser for `KEY=VALUE`; the value may be empty.
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_split_on_first_equals() {
        assert_eq!(
            parse_pair("notes=a=b").unwrap(),
            ("notes".to_owned(), "a=b".to_owned())
        );
        assert_eq!(parse_pair("status=").unwrap().1, "");
        assert!(parse_pair("=x").is_err());
        assert!(parse_pair("plain").is_err());
    }

    #[test]
    fn entity_keys_accept_cli_spellings() {
        assert_eq!(parse_entity("insured-person").unwrap(), EntityKind::InsuredPerson);
        assert_eq!(parse_entity("cities").unwrap(), EntityKind::City);
        assert!(parse_entity("invoice").is_err());
    }
}
