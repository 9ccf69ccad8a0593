//! config command - Show or create configuration

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use crate::core::config::{Config, WorkspaceConfig};

/// Print where configuration is read from and written to.
pub fn path(root: &Path) -> Result<()> {
    let global = Config::global_config_path().context("Failed to locate global config")?;
    let loaded = Config::load(Some(root)).context("Failed to load config")?;

    match loaded.config.global_config_loaded_from() {
        Some(from) => println!("global: {}", from.display()),
        None => println!("global: {} (not present)", global.display()),
    }
    match loaded.config.workspace_config_loaded_from() {
        Some(from) => println!("workspace: {}", from.display()),
        None => println!(
            "workspace: {} (not present)",
            Config::workspace_config_path(root).display()
        ),
    }
    Ok(())
}

/// Print the effective configuration.
pub fn show(root: &Path) -> Result<()> {
    let loaded = Config::load(Some(root)).context("Failed to load config")?;
    for warning in &loaded.warnings {
        eprintln!("warning: {} ({})", warning.message, warning.path.display());
    }
    let config = loaded.config;

    println!("# Effective Configuration");
    println!("base_branch = {}", config.base_branch());
    println!("remote = {}", config.remote());
    match config.jobs() {
        Some(jobs) => println!("jobs = {}", jobs),
        None => println!("jobs = (host parallelism)"),
    }
    println!("commit_message = {:?}", config.commit_message());
    match config.workflow_source() {
        Some(source) => println!("workflow_source = {}", source.display()),
        None => println!("workflow_source = (not set)"),
    }
    println!("pull_request.title = {}", config.pr_title().unwrap_or_else(|| "(commit message)".into()));
    println!("pull_request.draft = {}", config.pr_draft());
    println!("forge.api_base = {}", config.forge_api_base());
    println!(
        "forge.token_env = {} ({})",
        config.token_env(),
        if config.forge_token().is_some() { "set" } else { "unset" }
    );

    let mut pins: Vec<_> = config.pins().into_iter().collect();
    pins.sort();
    for (module, version) in pins {
        println!("pins.{} = {}", module, version);
    }
    Ok(())
}

/// Write a workspace config with the defaults spelled out.
pub fn init(root: &Path, force: bool) -> Result<()> {
    let path = Config::workspace_config_path(root);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let config = WorkspaceConfig {
        base_branch: Some("main".to_string()),
        remote: Some("origin".to_string()),
        ..WorkspaceConfig::default()
    };
    let written = Config::write_workspace(root, &config).context("Failed to write config")?;
    println!("Wrote {}", written.display());
    Ok(())
}
