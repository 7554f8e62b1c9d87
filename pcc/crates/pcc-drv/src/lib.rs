//! pcc-drv - the compiler driver.
//!
//! Orchestrates the batch pipeline with full ownership transfer between
//! stages: preprocess -> lex -> parse -> MIR -> optimize -> AArch64
//! codegen -> encode/relocate -> container. Every stage error is fatal;
//! `main` prints the chain and exits non-zero.

mod config;
mod source;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub use config::{Arch, Cli, Config, PlatformArg};
use pcc_gen::Platform;

pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("PCC_LOG"))
        .with_writer(std::io::stderr)
        .init();
    let config = Config::from(Cli::parse());
    Session::new(config).run()
}

/// One compilation from a source path to an output file.
pub struct Session {
    config: Config,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Session { config }
    }

    pub fn run(&self) -> Result<()> {
        let config = &self.config;
        debug!(target: "driver", source = %config.source.display(), "compiling");

        if config.arch == Arch::X86_64 {
            bail!("x86_64 code generation is not implemented yet; use -a arm64");
        }

        let text = source::load(&config.source)?;
        let tokens = pcc_lex::tokenize(&text).context("lexical analysis failed")?;
        let program = pcc_par::parse(&tokens).context("parsing failed")?;
        let mut mir = pcc_mir::generate(&program).context("MIR generation failed")?;
        pcc_mir::optimize(&mut mir, config.opt_level);

        let insts =
            pcc_gen::generate_insts(&mir, config.platform).context("code generation failed")?;

        let image = if config.assembly {
            pcc_gen::render_asm(&insts, config.platform).into_bytes()
        } else {
            let section =
                pcc_gen::encode_text(&insts, config.platform).context("encoding failed")?;
            match config.platform {
                Platform::Linux => pcc_gen::write_elf64(&section, config.shared)
                    .context("ELF emission failed")?,
                Platform::Bare => pcc_gen::write_flat(&section),
                Platform::MacOs | Platform::Windows => bail!(
                    "the Mach-O/PE container writers are external; \
                     use -S to emit assembly for this platform"
                ),
            }
        };

        std::fs::write(&config.output, image)
            .with_context(|| format!("cannot write output file {}", config.output.display()))?;
        debug!(target: "driver", output = %config.output.display(), "done");
        Ok(())
    }
}
