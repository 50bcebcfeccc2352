use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Disk image path
    #[arg(short, long)]
    pub disk: PathBuf,

    /// Total sectors of the image
    #[arg(short, long, default_value_t = 1024)]
    pub sectors: usize,

    /// Format the image before anything else
    #[arg(short, long)]
    pub format: bool,

    /// Copy a host file into the file system
    #[arg(long, num_args = 2, value_names = ["HOST", "PATH"])]
    pub copy: Option<Vec<String>>,

    /// Create a directory
    #[arg(long, value_name = "PATH")]
    pub mkdir: Option<String>,

    /// List a directory
    #[arg(short, long, value_name = "PATH")]
    pub list: Option<String>,

    /// Remove a file or directory
    #[arg(long, value_name = "PATH")]
    pub remove: Option<String>,

    /// Apply --list/--remove recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Dump the whole file system state
    #[arg(short, long)]
    pub print: bool,
}
