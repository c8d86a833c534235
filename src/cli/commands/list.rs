//! pspm list - show what the lockfile pins.

use crate::config::InstallContext;
use crate::error::Result;
use crate::lockfile::Lockfile;

pub fn run(ctx: &InstallContext) -> Result<()> {
    let Some(lockfile) = Lockfile::load(&ctx.project_root)? else {
        println!("no lockfile; nothing installed");
        return Ok(());
    };

    for (key, entry) in &lockfile.packages {
        match &entry.deprecated {
            Some(message) => println!("{key}@{} (deprecated: {message})", entry.version),
            None => println!("{key}@{}", entry.version),
        }
    }
    for (key, entry) in &lockfile.github_packages {
        println!("{key}@{} ({})", entry.git_ref, entry.version);
    }
    for (key, entry) in &lockfile.local_packages {
        println!("{key} -> {}", entry.resolved_path);
    }
    if lockfile.is_empty() {
        println!("lockfile is empty");
    }
    Ok(())
}
