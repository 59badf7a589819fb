pub mod wire;

pub use wire::{AssembleReport, DisassembleReport, LoadRequest, WordView};
