use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use veggie::codec;
use veggie::VeggieConfig;

fn config_with(profile_dir: Option<PathBuf>) -> VeggieConfig {
    let cfg = VeggieConfig::from_env();
    match profile_dir {
        Some(dir) => cfg.with_profile_dir(dir),
        None => cfg,
    }
}

/// Список профилей (имена файлов без .json), опционально JSON.
pub fn exec_list(profile_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let cfg = config_with(profile_dir);
    let names = codec::list(cfg.profile_dir())
        .with_context(|| format!("list profiles at {}", cfg.profile_dir().display()))?;
    if json {
        println!("{}", serde_json::to_string(&names)?);
        return Ok(());
    }
    if names.is_empty() {
        println!("(no profiles in {})", cfg.profile_dir().display());
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

/// Показать карту overrides одного профиля.
pub fn exec_show(name: String, profile_dir: Option<PathBuf>) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("provide profile name"));
    }
    let cfg = config_with(profile_dir);
    let data = codec::load(&name, cfg.profile_dir())
        .with_context(|| format!("load profile '{}'", name))?;

    println!("Profile {} ({} override(s))", codec::profile_name_of(&name), data.len());
    for (url, o) in data.iter() {
        if o.hang {
            println!("  - {url} -> hang");
        } else {
            println!("  - {url} -> {} {}", o.status, o.response);
        }
    }
    Ok(())
}
