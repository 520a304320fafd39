//! Styled status output for the terminal.

use console::style;

use super::*;

pub static INFO_PREFIX: &str = "ℹ ";
pub static SUCCESS_PREFIX: &str = "✓ ";
pub static ERROR_PREFIX: &str = "✗ ";
pub static WARNING_PREFIX: &str = "! ";
pub static ITEM_PREFIX: &str = "├─";
pub static LAST_ITEM_PREFIX: &str = "└─";

#[derive(Debug)]
pub enum ResponseContent<'a> {
  Success(&'a str),
  Info(&'a str),
  Warning(&'a str),
  Error(&'a PrestepsCliError),
  /// Output files of a finished run, listed as a tree.
  Files(&'a [PathBuf]),
}

pub trait UserInteraction {
  fn reply(&self, content: ResponseContent) -> Result<()>;
}

/// Writes replies to the terminal, errors to stderr and everything else to stdout.
#[derive(Debug, Default)]
pub struct Terminal;

impl UserInteraction for Terminal {
  fn reply(&self, content: ResponseContent) -> Result<()> {
    match content {
      ResponseContent::Success(message) =>
        println!("{} {}", style(SUCCESS_PREFIX).green(), style(message).green()),
      ResponseContent::Info(message) => println!("{} {message}", style(INFO_PREFIX).blue()),
      ResponseContent::Warning(message) =>
        println!("{} {}", style(WARNING_PREFIX).yellow(), style(message).yellow()),
      ResponseContent::Error(error) =>
        eprintln!("{} {}", style(ERROR_PREFIX).red(), style(error).red()),
      ResponseContent::Files(files) => {
        for (idx, file) in files.iter().enumerate() {
          let prefix = if idx + 1 == files.len() { LAST_ITEM_PREFIX } else { ITEM_PREFIX };
          println!("{} {}", style(prefix).dim(), style(file.display()).cyan());
        }
      },
    }
    Ok(())
  }
}
