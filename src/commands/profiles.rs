//! Listing cluster profiles and picking one interactively

use crate::config::ProfileStore;
use crate::error::{LoginError, Result};
use inquire::Select;
use serde::Serialize;
use std::io::{self, IsTerminal};

#[derive(Serialize)]
struct ProfileEntry<'a> {
    cluster: &'a str,
    issuer: &'a str,
    aliases: &'a [String],
}

/// One line per cluster: `cluster<TAB>alias,alias<TAB>issuer`
pub fn format_list(store: &ProfileStore) -> String {
    store
        .profiles
        .iter()
        .map(|(cluster, p)| format!("{}\t{}\t{}\n", cluster, p.aliases.join(","), p.issuer))
        .collect()
}

/// The profiles as JSON, without login secrets
pub fn format_list_json(store: &ProfileStore) -> Result<String> {
    let entries: Vec<ProfileEntry<'_>> = store
        .profiles
        .iter()
        .map(|(cluster, p)| ProfileEntry {
            cluster,
            issuer: &p.issuer,
            aliases: &p.aliases,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}

pub fn list(store: &ProfileStore, json: bool) -> Result<()> {
    if json {
        println!("{}", format_list_json(store)?);
    } else {
        print!("{}", format_list(store));
    }
    Ok(())
}

fn picker_label(cluster: &str, aliases: &[String]) -> String {
    format!("{} ({})", cluster, aliases.join(", "))
}

/// Ask for a cluster and return its first alias
pub fn pick_alias(store: &ProfileStore) -> Result<String> {
    if !io::stdin().is_terminal() {
        return Err(LoginError::AliasMissing);
    }
    if store.is_empty() {
        return Err(LoginError::Other(
            "no clusters configured\n\n  Add a cluster to your profile file".into(),
        ));
    }

    let labels: Vec<String> = store
        .profiles
        .iter()
        .map(|(cluster, p)| picker_label(cluster, &p.aliases))
        .collect();

    let selected = Select::new("Select cluster:", labels.clone())
        .with_page_size(20)
        .prompt()
        .map_err(|e| match e {
            inquire::InquireError::NotTTY => LoginError::NoTty,
            _ => LoginError::Cancelled,
        })?;

    let index = labels
        .iter()
        .position(|l| *l == selected)
        .ok_or(LoginError::Cancelled)?;
    store
        .profiles
        .values()
        .nth(index)
        .and_then(|p| p.aliases.iter().find(|a| !a.trim().is_empty()))
        .cloned()
        .ok_or(LoginError::Cancelled)
}
