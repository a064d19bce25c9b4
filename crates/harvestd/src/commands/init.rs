//! Module for writing a starter configuration file

use super::*;

/// Options for [`Commands::Init`].
#[derive(Args, Clone, Debug)]
pub struct InitOptions {
  /// Overwrite an existing configuration file
  #[arg(long, action = ArgAction::SetTrue)]
  pub force: bool,
}

/// Function for the [`Commands::Init`] in the CLI.
pub async fn init(path: Option<&PathBuf>, options: &InitOptions) -> Result<()> {
  let path = path.cloned().unwrap_or_else(Config::default_path);

  if path.exists() && !options.force {
    println!(
      "{} Config already exists at {}; pass --force to overwrite it",
      style(WARNING_PREFIX).yellow(),
      style(path.display()).cyan()
    );
    return Ok(());
  }

  let config = Config::example();
  config.save(&path)?;
  info!("Wrote config to {}", path.display());

  println!("{} Created config at {}", style(SUCCESS_PREFIX).green(), style(path.display()).cyan());
  let profiles = config.profiles.keys().cloned().collect::<Vec<_>>();
  for (index, name) in profiles.iter().enumerate() {
    let branch = if index + 1 == profiles.len() { TREE_LEAF } else { TREE_BRANCH };
    println!("   {} profile {}", style(branch).dim(), style(name).yellow());
  }
  Ok(())
}
