use thiserror::Error;

/// Every failure mode the emulator can surface, from a bad CLI argument
/// down to a fault raised mid-execution. The CLI entry point maps variants
/// to the documented process exit codes; nothing here is ever unwound
/// through a panic.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error("RAM size must be at least {min} cells, got {got}")]
    RamTooSmall { got: usize, min: usize },

    #[error("program image has {image_len} cells, which does not fit in {ram_size} cells of RAM")]
    ImageTooLarge { image_len: usize, ram_size: usize },

    #[error("memory access out of range: address {addr} (RAM has {ram_size} cells)")]
    MemoryOutOfRange { addr: i64, ram_size: usize },

    #[error("division by zero at IP {ip}")]
    DivisionByZero { ip: i32 },

    #[error("modulo by zero at IP {ip}")]
    ModuloByZero { ip: i32 },

    #[error("could not read program image {path}: {source}")]
    ImageIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("program image {path} contains a cell that is not a valid integer: {source}")]
    ImageParse {
        path: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("RAM size argument {raw:?} is not a valid non-negative integer: {source}")]
    RamSizeParse {
        raw: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("I/O error on port device: {0}")]
    PortIo(#[from] std::io::Error),
}
