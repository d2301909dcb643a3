mod styling;
mod summary;
mod tables;

pub use styling::{dim, magenta_bold};
pub use summary::{print_build_listing, print_build_status, print_failure_report};

/// Prints the `jenlens` banner to stderr.
///
/// Displays the tool name, version, and description at the start of
/// execution. Goes to stderr so piped stdout stays clean JSON.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔎 jenlens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Jenkins build inspection tool")
    );
}
