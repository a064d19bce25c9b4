//! Module for regrouping downloaded archives into per-paper folders

use harvest::organize::OrganizePass;

use super::*;

/// Options for [`Commands::Organize`].
#[derive(Args, Clone, Debug)]
pub struct OrganizeOptions {
  /// Folder holding `<id>vN.tar.gz` archives
  pub sources_dir: PathBuf,

  /// Folder receiving one `YYMM-NNNNN/` folder per paper
  pub output_dir: PathBuf,
}

/// Function for [`Commands::Organize`].
pub async fn organize(config: Option<&PathBuf>, options: &OrganizeOptions) -> Result<()> {
  if !options.sources_dir.is_dir() {
    return Err(HarvestdError::Usage(format!(
      "{} is not a directory",
      options.sources_dir.display()
    )));
  }

  let config = load_config(config)?;
  let stats = OrganizePass::new(&config)?.run(&options.sources_dir, &options.output_dir).await?;

  println!(
    "{} Organized {} papers into {}",
    style(SUCCESS_PREFIX).green(),
    style(stats.papers).cyan(),
    style(options.output_dir.display()).cyan()
  );
  let lines = [
    ("versions unpacked", stats.versions_extracted),
    ("failed to unpack", stats.extraction_failures),
    ("PDF only", stats.pdfs),
    ("stub citations", stats.bib_fallbacks),
    ("skipped files", stats.skipped),
  ];
  for (index, (label, value)) in lines.iter().enumerate() {
    let branch = if index + 1 == lines.len() { TREE_LEAF } else { TREE_BRANCH };
    println!("   {} {label}: {}", style(branch).dim(), style(value).cyan());
  }
  if stats.bib_fallbacks > 0 {
    println!(
      "{} {} papers got a stub references.bib, arXiv could not be reached for them",
      style(WARNING_PREFIX).yellow(),
      stats.bib_fallbacks
    );
  }
  Ok(())
}
