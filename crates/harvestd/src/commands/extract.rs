//! Module for the standalone extraction pass

use harvest::extract::ExtractPass;

use super::*;

/// Options for [`Commands::Extract`].
#[derive(Args, Clone, Debug)]
pub struct ExtractOptions {
  /// Folder searched recursively for `*.tar` and `*.tar.gz` archives
  pub source_dir: PathBuf,

  /// Folder receiving one sub-folder per archive
  pub dest_dir: PathBuf,

  /// Archives unpacked at once
  #[arg(long, default_value_t = 10)]
  pub parallel: usize,
}

/// Function for [`Commands::Extract`].
pub async fn extract(options: &ExtractOptions) -> Result<()> {
  if !options.source_dir.is_dir() {
    return Err(HarvestdError::Usage(format!(
      "{} is not a directory",
      options.source_dir.display()
    )));
  }

  let stats = ExtractPass::new(options.parallel).run(&options.source_dir, &options.dest_dir).await?;

  println!(
    "{} Extracted {} of {} archives into {}",
    style(SUCCESS_PREFIX).green(),
    style(stats.extracted).cyan(),
    style(stats.found).cyan(),
    style(options.dest_dir.display()).cyan()
  );
  let lines =
    [("failed", stats.failed), ("PDF only", stats.pdfs), ("files deleted", stats.deleted_files)];
  for (index, (label, value)) in lines.iter().enumerate() {
    let branch = if index + 1 == lines.len() { TREE_LEAF } else { TREE_BRANCH };
    println!("   {} {label}: {}", style(branch).dim(), style(value).cyan());
  }
  Ok(())
}
