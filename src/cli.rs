use clap::Parser;

/// The machine takes exactly two positional arguments plus one optional
/// literal flag, rather than a richer flagged CLI: a program image path,
/// a decimal RAM size, and an optional `-debug` token. `-debug` is
/// parsed as a plain positional (not an option) since that is its
/// documented external shape; `allow_hyphen_values` keeps clap from
/// mistaking it for an unknown flag.
#[derive(Parser)]
#[command(author, version, about, disable_help_flag = true, disable_version_flag = true)]
pub struct CliArguments {
    /// Path to the program image file (whitespace-separated integers)
    pub image: String,

    /// RAM size in cells (must be at least 4)
    pub ram_size: String,

    /// Literal "-debug" to enable the per-instruction trace
    #[arg(allow_hyphen_values = true)]
    pub debug_flag: Option<String>,
}

impl CliArguments {
    pub fn debug_requested(&self) -> bool {
        self.debug_flag.as_deref() == Some("-debug")
    }
}
