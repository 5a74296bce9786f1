//! 명령줄 인자 정의

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Emulator frontend: app updates and content import.
#[derive(Parser, Debug)]
#[command(name = "yuzu-frontend")]
#[command(version, about)]
pub struct Cli {
    /// Config file [default: $YUZU_FRONTEND_CONFIG or config/frontend.toml].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print import results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check the version endpoint without downloading anything.
    CheckUpdate,

    /// Check, confirm, download and hand the package to the installer.
    Update {
        /// Accept the update without asking.
        #[arg(short, long)]
        yes: bool,
    },

    /// Install a prod.keys file.
    ImportKeys { file: PathBuf },

    /// Install a key_retail.bin file for amiibo.
    ImportAmiiboKeys { file: PathBuf },

    /// Replace installed firmware with the NCA files in a zip archive.
    ImportFirmware { archive: PathBuf },

    /// Install update/DLC files into NAND.
    InstallContent {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Program ID of the selected game; files are checked against it first.
        #[arg(long, value_name = "ID")]
        program_id: Option<String>,

        /// Install even if the files do not match --program-id.
        #[arg(long)]
        force: bool,
    },

    /// Zip the whole user directory. Ctrl+C cancels.
    ExportBackup { destination: PathBuf },

    /// Replace the user directory with a backup archive.
    ImportBackup { archive: PathBuf },

    /// Register a game folder.
    AddGamesDir {
        path: PathBuf,

        /// Scan subfolders too.
        #[arg(long)]
        deep_scan: bool,
    },

    /// List registered game folders.
    ListGamesDirs,
}
