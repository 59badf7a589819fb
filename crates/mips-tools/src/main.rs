use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use mips_rs::{disassemble_one, hex, Disassembler};
use mips_tools::DisassembleReport;

#[derive(Parser, Debug)]
#[command(author, version, about = "MIPS disassembler CLI", long_about = None)]
struct Cli {
    /// Address of the first word, used for branch and jump targets
    #[arg(long, default_value = "0x00400000", value_parser = parse_u32)]
    base: u32,
    /// Read hex words from a file, one per line
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,
    /// Prefix each line with its address and raw word (text format only)
    #[arg(long)]
    show_words: bool,
    /// Output format: text or json
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Hex words (used when no --file is given)
    #[arg(value_name = "WORD")]
    words: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

/// Address-annotated listing; bad lines are shown but do not advance.
fn listing(lines: &[String], base: u32) -> String {
    let mut buf = String::new();
    let mut pc = base;
    for (i, line) in lines.iter().enumerate() {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        match hex::parse_word(text) {
            Some(w) => {
                let _ = writeln!(buf, "{pc:#010x}: {w:08x}  {}", disassemble_one(w, pc));
                pc = pc.wrapping_add(4);
            }
            None => {
                let _ = writeln!(buf, "Error line {}: invalid hex word '{text}'", i + 1);
            }
        }
    }
    buf
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let lines: Vec<String> = match &cli.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect(),
        None => cli.words.clone(),
    };
    let base = cli.base;

    match cli.format {
        OutputFormat::Text if cli.show_words => print!("{}", listing(&lines, base)),
        OutputFormat::Text => {
            let out = Disassembler::new(base).disassemble_hex(&lines);
            println!("{}", out.text);
        }
        OutputFormat::Json => {
            let report = DisassembleReport::from(Disassembler::new(base).disassemble_hex(&lines));
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
