//! Sites command: list site profiles.

use std::process::ExitCode;

use console::style;

use crate::config::{ConfigError, Settings};

pub fn cmd_sites(settings: &Settings, name: Option<&str>) -> anyhow::Result<ExitCode> {
    let Some(name) = name else {
        println!("{}", style("Site profiles").bold());
        println!("{}", "-".repeat(60));
        for (name, profile) in &settings.profiles {
            let domains = if profile.domains.is_empty() {
                "(any)".to_string()
            } else {
                profile.domains.join(", ")
            };
            let load_more = if profile.load_more_selector.is_some() {
                "load more"
            } else {
                "single page"
            };
            println!(
                "  {:<12} {:<28} {:<12} {} categories",
                style(name).cyan(),
                domains,
                load_more,
                profile.categories.len()
            );
        }
        return Ok(ExitCode::SUCCESS);
    };

    let profile = settings
        .profiles
        .get(name)
        .ok_or_else(|| ConfigError::UnknownSite(name.to_string()))?;

    println!("{}", style(format!("Profile: {}", name)).bold());
    println!("  Domains:     {}", profile.domains.join(", "));
    println!("  Containers:  {}", profile.container_selectors.join(" | "));
    if let Some(item) = &profile.item_selector {
        println!("  Items:       {}", item);
    }
    if let Some(load_more) = &profile.load_more_selector {
        println!("  Load more:   {}", load_more);
    }
    println!("  Required:    {}", profile.required.describe());

    if profile.categories.is_empty() {
        println!("  No categories");
    } else {
        println!();
        println!("{}", style("Categories").bold());
        for (category, url) in &profile.categories {
            println!("  {} {}", style(format!("{:<30}", category)).cyan(), url);
        }
    }

    Ok(ExitCode::SUCCESS)
}
