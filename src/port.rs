use std::fs::{File, OpenOptions};
use std::io::{Read, Write};

use crate::error::EmuError;

/// Buffered stdin cursor shared by the terminal port's character- and
/// numeric-mode reads. Refills from the process's real stdin in small
/// chunks and hands out either single bytes or whitespace-delimited
/// integer tokens from the same backing buffer.
struct InputCursor {
    buf: Vec<u8>,
    pos: usize,
}

impl InputCursor {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
        }
    }

    fn refill(&mut self) -> std::io::Result<bool> {
        let mut chunk = [0u8; 256];
        let n = std::io::stdin().lock().read(&mut chunk)?;
        if n == 0 {
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    fn next_byte(&mut self) -> std::io::Result<Option<u8>> {
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
            if !self.refill()? {
                return Ok(None);
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }

    /// A single non-whitespace character, skipping any leading ASCII
    /// whitespace first, matching `std::cin >> a` in the original.
    fn next_char(&mut self) -> std::io::Result<Option<u8>> {
        loop {
            match self.next_byte()? {
                None => return Ok(None),
                Some(b) if b.is_ascii_whitespace() => continue,
                Some(b) => return Ok(Some(b)),
            }
        }
    }

    fn next_token(&mut self) -> std::io::Result<Option<i32>> {
        let mut token: Vec<u8> = Vec::new();
        loop {
            match self.next_byte()? {
                None => break,
                Some(b) if b.is_ascii_whitespace() => {
                    if !token.is_empty() {
                        break;
                    }
                }
                Some(b) => token.push(b),
            }
        }
        if token.is_empty() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&token);
        Ok(text.trim().parse::<i32>().ok())
    }
}

/// Port 0. `state` 0 is character mode (send/receive one character at a
/// time), `state` 1 is numeric mode (send/receive a decimal integer).
pub struct TerminalPort {
    state: i32,
    input: InputCursor,
}

impl TerminalPort {
    pub fn new() -> Self {
        Self {
            state: 0,
            input: InputCursor::new(),
        }
    }

    fn send_value(&mut self, value: i32) -> Result<(), EmuError> {
        if self.state == 0 {
            print!("{}", (value as u8) as char);
        } else {
            print!("{}", value);
        }
        std::io::stdout().flush()?;
        Ok(())
    }

    fn send_signal(&mut self, signal: i32) {
        self.state = signal;
    }

    fn recv_value(&mut self) -> Result<i32, EmuError> {
        if self.state == 0 {
            Ok(self.input.next_char()?.map(|b| b as i32).unwrap_or(0))
        } else {
            Ok(self.input.next_token()?.unwrap_or(0))
        }
    }

    fn recv_signal(&self) -> i32 {
        self.state
    }
}

/// Port 1. A single-file handle built up byte-by-byte through
/// `send_value` before being opened with a control signal. `state` codes
/// are 0 idle, 1 open-for-read, 2 open-for-write, 3 open failure, 4
/// mode-violation close, 5 illegal command.
pub struct FilePort {
    state: i32,
    filename: String,
    handle: Option<File>,
}

impl FilePort {
    const CLOSE: i32 = 0;
    const OPEN_READ: i32 = 1;
    const OPEN_WRITE: i32 = 2;

    pub fn new() -> Self {
        Self {
            state: 0,
            filename: String::new(),
            handle: None,
        }
    }

    fn close(&mut self) {
        self.handle = None;
        self.filename.clear();
    }

    fn send_signal(&mut self, signal: i32) {
        match signal {
            Self::CLOSE => {
                self.close();
                self.state = 0;
            }
            Self::OPEN_READ => {
                if self.handle.is_some() {
                    self.close();
                    self.state = 4;
                } else {
                    match OpenOptions::new().read(true).open(&self.filename) {
                        Ok(f) => {
                            self.handle = Some(f);
                            self.state = 1;
                        }
                        Err(_) => {
                            self.close();
                            self.state = 3;
                        }
                    }
                }
            }
            Self::OPEN_WRITE => {
                if self.handle.is_some() {
                    self.close();
                    self.state = 4;
                } else {
                    match OpenOptions::new()
                        .read(true)
                        .write(true)
                        .create(true)
                        .truncate(true)
                        .open(&self.filename)
                    {
                        Ok(f) => {
                            self.handle = Some(f);
                            self.state = 2;
                        }
                        Err(_) => {
                            self.close();
                            self.state = 3;
                        }
                    }
                }
            }
            _ => {
                self.close();
                self.state = 4;
            }
        }
    }

    fn send_value(&mut self, value: i32) -> Result<(), EmuError> {
        match &mut self.handle {
            Some(f) => {
                if self.state == Self::OPEN_WRITE {
                    f.write_all(&[value as u8])?;
                } else {
                    self.close();
                    self.state = 5;
                }
            }
            None => self.filename.push(value as u8 as char),
        }
        Ok(())
    }

    // `state == 2` (write mode) is checked here rather than `state == 1`
    // (read mode); this mirrors the original source's handler exactly,
    // see the Open Question in DESIGN.md.
    fn recv_value(&mut self) -> Result<i32, EmuError> {
        match &mut self.handle {
            Some(f) => {
                if self.state == Self::OPEN_WRITE {
                    let mut byte = [0u8; 1];
                    match f.read(&mut byte)? {
                        1 => Ok(byte[0] as i32),
                        _ => Ok(0),
                    }
                } else {
                    self.close();
                    self.state = 5;
                    Ok(0)
                }
            }
            None => {
                self.close();
                self.state = 0;
                Ok(0)
            }
        }
    }

    fn recv_signal(&self) -> i32 {
        self.state
    }
}

/// The CPU's port table is a small sealed set of device variants
/// dispatched by a match; the CPU owns every port exclusively and never
/// aliases it.
pub enum PortUnit {
    Terminal(TerminalPort),
    File(FilePort),
}

impl PortUnit {
    pub fn send_value(&mut self, value: i32) -> Result<(), EmuError> {
        match self {
            PortUnit::Terminal(t) => t.send_value(value),
            PortUnit::File(f) => f.send_value(value),
        }
    }

    pub fn send_signal(&mut self, signal: i32) {
        match self {
            PortUnit::Terminal(t) => t.send_signal(signal),
            PortUnit::File(f) => f.send_signal(signal),
        }
    }

    pub fn recv_value(&mut self) -> Result<i32, EmuError> {
        match self {
            PortUnit::Terminal(t) => t.recv_value(),
            PortUnit::File(f) => f.recv_value(),
        }
    }

    pub fn recv_signal(&self) -> i32 {
        match self {
            PortUnit::Terminal(t) => t.recv_signal(),
            PortUnit::File(f) => f.recv_signal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_cursor_next_char_skips_leading_whitespace() {
        let mut cursor = InputCursor {
            buf: b"  \t\n x y".to_vec(),
            pos: 0,
        };
        assert_eq!(cursor.next_char().unwrap(), Some(b'x'));
        assert_eq!(cursor.next_char().unwrap(), Some(b'y'));
    }

    #[test]
    fn terminal_starts_in_character_mode() {
        let t = TerminalPort::new();
        assert_eq!(t.recv_signal(), 0);
    }

    #[test]
    fn terminal_signal_switches_mode() {
        let mut t = TerminalPort::new();
        t.send_signal(1);
        assert_eq!(t.recv_signal(), 1);
    }

    #[test]
    fn file_port_accumulates_filename_before_open() {
        let mut f = FilePort::new();
        f.send_value('/' as i32).unwrap();
        f.send_value('t' as i32).unwrap();
        assert_eq!(f.filename, "/t");
        assert_eq!(f.recv_signal(), 0);
    }

    #[test]
    fn file_port_write_then_read_roundtrip() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tetracore-port-test-{}.tmp", std::process::id()));
        let path_str = path.to_str().unwrap().to_string();

        let mut f = FilePort::new();
        for b in path_str.bytes() {
            f.send_value(b as i32).unwrap();
        }
        f.send_signal(FilePort::OPEN_WRITE);
        assert_eq!(f.recv_signal(), 2);
        f.send_value('A' as i32).unwrap();
        f.send_value('B' as i32).unwrap();
        f.send_signal(FilePort::CLOSE);
        assert_eq!(f.recv_signal(), 0);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "AB");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn file_port_reopen_while_open_is_mode_violation() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tetracore-port-test2-{}.tmp", std::process::id()));
        let path_str = path.to_str().unwrap().to_string();

        let mut f = FilePort::new();
        for b in path_str.bytes() {
            f.send_value(b as i32).unwrap();
        }
        f.send_signal(FilePort::OPEN_WRITE);
        f.send_signal(FilePort::OPEN_READ);
        assert_eq!(f.recv_signal(), 4);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn file_port_open_missing_file_for_read_fails() {
        let mut f = FilePort::new();
        for b in "/nonexistent/path/for/tetracore/test".bytes() {
            f.send_value(b as i32).unwrap();
        }
        f.send_signal(FilePort::OPEN_READ);
        assert_eq!(f.recv_signal(), 3);
    }
}
