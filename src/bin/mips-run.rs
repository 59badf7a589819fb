use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mips_rs::{AsmConfig, Assembler, SimConfig, SimState, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Assemble a MIPS source file and run it on the simulator")]
struct Opts {
    /// Simulator configuration (JSON, any field may be omitted)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Stop after this many instructions
    #[arg(long, default_value_t = 1_000_000usize)]
    max_steps: usize,
    /// Console input for read syscalls; `-` reads it from stdin
    #[arg(long)]
    input: Option<String>,
    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,
    #[arg(value_name = "SOURCE")]
    source: PathBuf,
}

fn load_config(path: Option<&PathBuf>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let cfg = load_config(opts.config.as_ref())?;
    let source = std::fs::read_to_string(&opts.source)
        .with_context(|| format!("reading {}", opts.source.display()))?;

    let assembly = Assembler::with_config(AsmConfig {
        text_base: cfg.text_base,
        data_base: cfg.data_base,
    })
    .assemble(&source);
    if !assembly.is_ok() {
        for e in &assembly.errors {
            eprintln!("{}: {}\n    {}", opts.source.display(), e, e.text.trim());
        }
        bail!("assembly failed with {} error(s)", assembly.errors.len());
    }

    let mut sim = Simulator::with_config(cfg);
    sim.load_program(&assembly.words, &assembly.data)?;
    match opts.input.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            sim.provide_input(&buf);
        }
        Some(text) => sim.provide_input(text),
        None => {}
    }

    let snap = sim.run(opts.max_steps);
    print!("{}", snap.output);
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    }
    match snap.state {
        SimState::Finished => {
            eprintln!(
                "\n[{}] exit code {}",
                snap.termination_reason.as_deref().unwrap_or("finished"),
                snap.exit_code.unwrap_or(0)
            );
            Ok(())
        }
        SimState::Error => bail!("runtime error: {}", snap.error.unwrap_or_default()),
        SimState::InputWait => bail!("program is waiting for input at pc {:#010x}", snap.pc),
        other => bail!("stopped after {} steps in state {other} at pc {:#010x}", opts.max_steps, snap.pc),
    }
}
