//! Command-line interface and resolved configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pcc_gen::Platform;

#[derive(Debug, Parser)]
#[command(
    name = "pcc",
    version,
    about = "a small C compiler targeting AArch64",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Source file to compile
    pub source: PathBuf,

    /// Output file path (default: output.bin, or output.s with -S)
    #[arg(short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Optimization level; MIR folding runs when the level is above 0
    #[arg(short = 'O', value_name = "N", default_value_t = 0)]
    pub opt_level: i32,

    /// Emit textual assembly instead of a binary container
    #[arg(short = 'S')]
    pub assembly: bool,

    /// Target architecture
    #[arg(short = 'a', value_enum, default_value_t = Arch::Arm64)]
    pub arch: Arch,

    /// Target platform (selects the startup stub and syscall numbers)
    #[arg(short = 'p', value_enum, default_value_t = PlatformArg::Linux)]
    pub platform: PlatformArg,

    /// Wrap the output as a shared library (ELF type DYN)
    #[arg(long)]
    pub shared: bool,

    /// Position-independent code (reserved, no effect yet)
    #[arg(long)]
    pub fpic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Arch {
    Arm64,
    #[value(name = "x86_64")]
    X86_64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Linux,
    Macos,
    Windows,
    Bare,
}

impl PlatformArg {
    pub fn to_platform(self) -> Platform {
        match self {
            PlatformArg::Linux => Platform::Linux,
            PlatformArg::Macos => Platform::MacOs,
            PlatformArg::Windows => Platform::Windows,
            PlatformArg::Bare => Platform::Bare,
        }
    }
}

/// Resolved compilation settings.
#[derive(Debug)]
pub struct Config {
    pub source: PathBuf,
    pub output: PathBuf,
    pub opt_level: i32,
    pub assembly: bool,
    pub arch: Arch,
    pub platform: Platform,
    pub shared: bool,
    pub fpic: bool,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let output = cli.output.unwrap_or_else(|| {
            PathBuf::from(if cli.assembly { "output.s" } else { "output.bin" })
        });
        Config {
            source: cli.source,
            output,
            opt_level: cli.opt_level,
            assembly: cli.assembly,
            arch: cli.arch,
            platform: cli.platform.to_platform(),
            shared: cli.shared,
            fpic: cli.fpic,
        }
    }
}
