use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use mips_rs::{disassemble_one, AsmConfig, Assembler};
use mips_tools::AssembleReport;

#[derive(Parser, Debug)]
#[command(author, version, about = "MIPS two-pass assembler")]
struct Opts {
    /// Input assembly file
    #[arg(value_name = "SOURCE")]
    input: PathBuf,
    /// Output format: listing, hex (one word per line) or json
    #[arg(long, value_enum, default_value_t = Format::Listing)]
    format: Format,
    /// Print the symbol table after the listing
    #[arg(long)]
    symbols: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Listing,
    Hex,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let source = std::fs::read_to_string(&opts.input)
        .with_context(|| format!("reading {}", opts.input.display()))?;
    let cfg = AsmConfig::default();
    let mut asm = Assembler::with_config(cfg);
    let out = asm.assemble(&source);

    if let Format::Json = opts.format {
        println!("{}", serde_json::to_string_pretty(&AssembleReport::from(&out))?);
        return Ok(());
    }

    for e in &out.errors {
        eprintln!("{}:{}: {}", opts.input.display(), e.line, e.message);
    }
    match opts.format {
        Format::Hex => {
            for w in &out.words {
                println!("0x{w:08x}");
            }
        }
        _ => {
            let mut pc = cfg.text_base;
            for w in &out.words {
                println!("{pc:#010x}: {w:08x}  {}", disassemble_one(*w, pc));
                pc = pc.wrapping_add(4);
            }
            if !out.data.is_empty() {
                println!("\n.data @ {:#010x} ({} bytes)", cfg.data_base, out.data.len());
                for (i, chunk) in out.data.chunks(16).enumerate() {
                    let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
                    println!("{:#010x}: {}", cfg.data_base as usize + i * 16, hex.join(" "));
                }
            }
        }
    }
    if opts.symbols {
        println!();
        for (name, addr) in asm.symbols().iter() {
            println!("{addr:#010x} {name}");
        }
    }
    if !out.errors.is_empty() {
        bail!("{} error(s)", out.errors.len());
    }
    Ok(())
}
