// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `govctl config show` / `govctl config check`.

use anyhow::Context;
use governor::GovernorConfig;
use std::path::{Path, PathBuf};

pub fn show(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = super::load_config(config_path.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn check(file: &Path) -> anyhow::Result<()> {
    let config = GovernorConfig::from_file(file).with_context(|| format!("{} is invalid", file.display()))?;
    let domains: Vec<String> = config.domain_ids().iter().map(ToString::to_string).collect();
    if domains.is_empty() {
        anyhow::bail!("{}: no domains enabled", file.display());
    }
    println!("{}: ok ({})", file.display(), domains.join(", "));
    Ok(())
}
