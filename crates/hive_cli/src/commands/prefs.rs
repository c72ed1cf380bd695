//! Prefs command - Show or change layout preferences.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use hive_client::{LayoutPreferences, PreferencesStore};

use super::Context;

#[derive(Args)]
pub struct PrefsArgs {
    #[command(subcommand)]
    command: PrefsCommand,
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// Print the current preferences
    Show,

    /// Change one or more preferences
    Set {
        /// Session drawer width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Whether the session drawer is collapsed
        #[arg(long)]
        collapsed: Option<bool>,
    },
}

pub async fn execute(args: PrefsArgs, ctx: &Context) -> Result<()> {
    let store = PreferencesStore::new(ctx.workspace_root()?);

    match args.command {
        PrefsCommand::Show => {
            let prefs = store
                .load()
                .with_context(|| format!("Failed to read {}", store.path().display()))?;
            print_prefs(&prefs);
        }
        PrefsCommand::Set { width, collapsed } => {
            if width.is_none() && collapsed.is_none() {
                anyhow::bail!("Invalid arguments: pass --width and/or --collapsed");
            }
            let prefs = store
                .update(|p| apply(p, width, collapsed))
                .with_context(|| format!("Failed to write {}", store.path().display()))?;
            ctx.say(format!("✅ Saved {}", store.path().display()));
            print_prefs(&prefs);
        }
    }
    Ok(())
}

fn apply(prefs: &mut LayoutPreferences, width: Option<u32>, collapsed: Option<bool>) {
    if let Some(width) = width {
        prefs.drawer_width = width;
    }
    if let Some(collapsed) = collapsed {
        prefs.drawer_collapsed = collapsed;
    }
}

fn print_prefs(prefs: &LayoutPreferences) {
    println!("drawerWidth:     {}", prefs.drawer_width);
    println!("drawerCollapsed: {}", prefs.drawer_collapsed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_apply_only_given_fields() {
        let mut prefs = LayoutPreferences::default();
        apply(&mut prefs, None, Some(true));
        assert_eq!(prefs.drawer_width, 280);
        assert!(prefs.drawer_collapsed);

        apply(&mut prefs, Some(360), None);
        assert_eq!(prefs.drawer_width, 360);
        assert!(prefs.drawer_collapsed);
    }

    #[test]
    fn test_update_persists() {
        let temp = tempdir().unwrap();
        let store = PreferencesStore::new(temp.path());
        store.update(|p| apply(p, Some(300), None)).unwrap();

        let reloaded = PreferencesStore::new(temp.path()).load().unwrap();
        assert_eq!(reloaded.drawer_width, 300);
        assert!(!reloaded.drawer_collapsed);
    }
}
