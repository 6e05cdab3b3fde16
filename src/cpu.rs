use colored::Colorize;
use log::{trace, warn};

use crate::error::EmuError;
use crate::memory::Memory;
use crate::opcodes;
use crate::port::{FilePort, PortUnit, TerminalPort};

const REG_FILE_SIZE: usize = 16;

pub type RegIndex = u8;

/// Whether the last `step()` left the machine able to execute another
/// instruction or brought it to a clean stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One instruction was fetched and executed; check `state()` to see
    /// whether it left the machine running, halted, or faulted.
    Executed,
    /// Nothing was fetched: the machine was already stopped, or the
    /// fetch precondition `IP + 3 < N` failed.
    NoFetch,
}

/// The three terminal states a machine can be in. `Halted` and
/// `Faulted` are both terminal; only `Running` can step again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Running,
    Halted,
    Faulted,
}

/// A register machine: sixteen registers, a comparison flag, a sticky
/// soft-error flag, an optional memory-protection window, a port table,
/// and RAM. Owns every one of those resources exclusively for its
/// lifetime.
pub struct Cpu {
    registers: [i32; REG_FILE_SIZE],
    cmp: i32,
    err: i32,
    win_lo: i32,
    win_hi: i32,
    prot: bool,
    ports: Vec<PortUnit>,
    memory: Memory,
    debug_mode: bool,
    state: CpuState,
}

impl Cpu {
    pub const IP: RegIndex = 14;
    pub const SYS: RegIndex = 13;
    pub const SP: RegIndex = 15;

    /// `port_index(0)` is always the terminal, `port_index(1)` is always
    /// the file unit; other indices are unbound.
    pub const PORT_TERMINAL: i32 = 0;
    pub const PORT_FILE: i32 = 1;

    pub fn new(image: Vec<i32>, ram_size: usize) -> Result<Cpu, EmuError> {
        if ram_size < Memory::MIN_SIZE {
            return Err(EmuError::RamTooSmall {
                got: ram_size,
                min: Memory::MIN_SIZE,
            });
        }
        let mut memory = Memory::new(ram_size);
        memory.load_image(&image)?;

        Ok(Cpu {
            registers: [0; REG_FILE_SIZE],
            cmp: 0,
            err: 0,
            win_lo: 0,
            win_hi: 0,
            prot: false,
            ports: vec![
                PortUnit::Terminal(TerminalPort::new()),
                PortUnit::File(FilePort::new()),
            ],
            memory,
            debug_mode: false,
            state: CpuState::Running,
        })
    }

    pub fn enable_debug(&mut self) {
        self.debug_mode = true;
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub(crate) fn halt(&mut self) {
        self.state = CpuState::Halted;
    }

    // --- register/flag access, used by the opcode handlers ---

    #[inline(always)]
    pub(crate) fn reg(&self, idx: RegIndex) -> i32 {
        self.registers[idx as usize]
    }

    #[inline(always)]
    pub(crate) fn set_reg(&mut self, idx: RegIndex, value: i32) {
        self.registers[idx as usize] = value;
    }

    pub fn registers(&self) -> &[i32; REG_FILE_SIZE] {
        &self.registers
    }

    #[inline(always)]
    pub(crate) fn ip(&self) -> i32 {
        self.reg(Self::IP)
    }

    #[inline(always)]
    pub(crate) fn set_ip(&mut self, value: i32) {
        self.set_reg(Self::IP, value);
    }

    #[inline(always)]
    pub(crate) fn advance_ip(&mut self) {
        self.set_ip(self.ip().wrapping_add(4));
    }

    #[inline(always)]
    pub(crate) fn cmp(&self) -> i32 {
        self.cmp
    }

    #[inline(always)]
    pub(crate) fn set_cmp(&mut self, value: i32) {
        self.cmp = value;
    }

    pub fn err(&self) -> i32 {
        self.err
    }

    #[inline(always)]
    pub(crate) fn set_err(&mut self, code: i32) {
        self.err = code;
    }

    #[inline(always)]
    pub(crate) fn set_window(&mut self, lo: i32, hi: i32) {
        self.win_lo = lo;
        self.win_hi = hi;
    }

    #[inline(always)]
    pub(crate) fn set_prot(&mut self, on: bool) {
        self.prot = on;
    }

    pub fn protection_window(&self) -> (i32, i32, bool) {
        (self.win_lo, self.win_hi, self.prot)
    }

    pub(crate) fn port_mut(&mut self, index: i32) -> Option<&mut PortUnit> {
        if index < 0 {
            return None;
        }
        self.ports.get_mut(index as usize)
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Load respecting the protection window: returns `Ok(None)` (ERR
    /// set to 1) if the window rejects the address, `Ok(Some(value))` on
    /// success, and an `Err` only for a genuine out-of-range RAM access
    /// (fatal regardless of the window).
    pub(crate) fn checked_load(&mut self, addr: i64) -> Result<Option<i32>, EmuError> {
        if self.prot && !self.in_window(addr) {
            self.set_err(1);
            return Ok(None);
        }
        Ok(Some(self.memory.load(addr)?))
    }

    /// Store respecting the protection window: a rejected address sets
    /// ERR to 3 and suppresses the write but is not itself fatal.
    pub(crate) fn checked_store(&mut self, addr: i64, value: i32) -> Result<(), EmuError> {
        if self.prot && !self.in_window(addr) {
            self.set_err(3);
            return Ok(());
        }
        self.memory.store(addr, value)
    }

    fn in_window(&self, addr: i64) -> bool {
        addr >= self.win_lo as i64 && addr <= self.win_hi as i64
    }

    /// `IP + 3 < N`: whether another four-cell instruction can be
    /// fetched in full. A negative IP, like any IP too close to the end
    /// of RAM, fails this and brings the machine to a clean halt.
    fn can_fetch(&self) -> bool {
        let ip = self.ip() as i64;
        ip >= 0 && ip + 3 < self.memory.len() as i64
    }

    fn fetch(&self) -> Result<(i32, i32, i32, i32), EmuError> {
        let ip = self.ip() as i64;
        let op = self.memory.load(ip)?;
        let a = self.memory.load(ip + 1)?;
        let b = self.memory.load(ip + 2)?;
        let c = self.memory.load(ip + 3)?;
        Ok((op, a, b, c))
    }

    /// Fetch, decode and execute exactly one instruction. Returns
    /// `Halted` without consuming an instruction if the machine was
    /// already at end-of-memory.
    pub fn step(&mut self) -> Result<StepOutcome, EmuError> {
        if self.state != CpuState::Running {
            return Ok(StepOutcome::NoFetch);
        }
        if !self.can_fetch() {
            self.halt();
            return Ok(StepOutcome::NoFetch);
        }

        let ip_before = self.ip();
        let (op, a, b, c) = self.fetch()?;
        trace!("ip={} op={} a={} b={} c={}", ip_before, op, a, b, c);
        let err_before = self.err;

        let result = opcodes::execute(self, op, a, b, c);
        if result.is_err() {
            self.state = CpuState::Faulted;
        }
        result?;

        if self.err != err_before {
            warn!("ERR set to {} at ip={}", self.err, ip_before);
        }

        if self.debug_mode {
            self.print_trace(op, a, b, c);
        }

        Ok(StepOutcome::Executed)
    }

    /// Run to completion, returning the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, EmuError> {
        let mut count: u64 = 0;
        loop {
            match self.step()? {
                StepOutcome::Executed => {
                    count += 1;
                    if self.state != CpuState::Running {
                        return Ok(count);
                    }
                }
                StepOutcome::NoFetch => return Ok(count),
            }
        }
    }

    /// The documented `-debug` trace: the decoded instruction, the
    /// sixteen registers as eight lines of two right-justified 4-wide
    /// fields, then a separator.
    fn print_trace(&self, op: i32, a: i32, b: i32, c: i32) {
        println!("Comand: {} {} {} {}", op, a, b, c);
        for pair in self.registers.chunks(2) {
            println!("{:>4}{:>4}", pair[0], pair[1]);
        }
        println!("--------");
    }

    pub fn dump_registers(&self) {
        println!("{}", "Register values".red());
        for (i, pair) in self.registers.chunks(2).enumerate() {
            println!(
                "{:>2}: {:>11}  {:>2}: {:>11}",
                i * 2,
                pair[0],
                i * 2 + 1,
                pair[1]
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_with(image: Vec<i32>, ram_size: usize) -> Cpu {
        Cpu::new(image, ram_size).unwrap()
    }

    #[test]
    fn halts_immediately_on_halt_opcode() {
        let mut cpu = cpu_with(vec![0, 0, 0, 0], 4);
        let count = cpu.run().unwrap();
        assert_eq!(count, 1);
        assert_eq!(cpu.state(), CpuState::Halted);
        assert_eq!(*cpu.registers(), [0; 16]);
    }

    #[test]
    fn loc_add_cmp_jmp_scenario() {
        let image = vec![
            22, 0, 7, 0, // loc r0, 7
            22, 1, 5, 0, // loc r1, 5
            20, 2, 0, 1, // add r2, r0, r1
            30, 2, 0, 0, // cmp r2, r0
            31, 1, 32, 0, // jmp >, 32
            22, 3, 1, 0, // r3 = 1 (skipped)
            0, 0, 0, 0, // halt (skipped)
            22, 3, 2, 0, // r3 = 2 (jump target)
            0, 0, 0, 0, // halt
        ];
        let mut cpu = cpu_with(image, 64);
        cpu.run().unwrap();
        assert_eq!(cpu.reg(0), 7);
        assert_eq!(cpu.reg(1), 5);
        assert_eq!(cpu.reg(2), 12);
        assert_eq!(cpu.reg(3), 2);
    }

    #[test]
    fn memory_protection_blocks_out_of_window_load() {
        let image = vec![
            22, 0, 100, 0, // loc r0, 100
            22, 1, 50, 0, // loc r1, 50
            22, 2, 60, 0, // loc r2, 60
            10, 1, 2, 0, // amin r1, r2
            11, 0, 0, 0, // setl
            5, 3, 100, 0, // lodi r3, 100  (outside window)
            5, 4, 55, 0, // lodi r4, 55   (inside window)
            0, 0, 0, 0,
        ];
        let mut cpu = cpu_with(image, 128);
        cpu.run().unwrap();
        assert_eq!(cpu.err(), 1);
        assert_eq!(cpu.reg(3), 0);
        assert_eq!(cpu.reg(4), 0);
    }

    #[test]
    fn protected_load_at_exact_bounds_succeeds() {
        let image = vec![
            22, 1, 2, 0, // loc r1, 2   (win_lo)
            22, 2, 3, 0, // loc r2, 3   (win_hi)
            10, 1, 2, 0, // amin r1, r2
            11, 0, 0, 0, // setl
            5, 5, 2, 0, // lodi r5, 2  (== win_lo)
            5, 6, 3, 0, // lodi r6, 3  (== win_hi)
            0, 0, 0, 0,
        ];
        let mut cpu = cpu_with(image, 64);
        cpu.run().unwrap();
        assert_eq!(cpu.err(), 0);
    }

    #[test]
    fn unknown_opcode_sets_err_and_halts() {
        let mut cpu = cpu_with(vec![99, 0, 0, 0], 4);
        cpu.run().unwrap();
        assert_eq!(cpu.err(), 5);
        assert_eq!(cpu.state(), CpuState::Halted);
    }

    #[test]
    fn division_by_zero_faults() {
        let image = vec![22, 0, 10, 0, 22, 1, 0, 0, 25, 2, 0, 1, 0, 0, 0, 0];
        let mut cpu = cpu_with(image, 64);
        let err = cpu.run().unwrap_err();
        assert!(matches!(err, EmuError::DivisionByZero { .. }));
        assert_eq!(cpu.state(), CpuState::Faulted);
    }

    #[test]
    fn modulo_by_zero_faults() {
        let image = vec![22, 0, 10, 0, 22, 1, 0, 0, 26, 2, 0, 1, 0, 0, 0, 0];
        let mut cpu = cpu_with(image, 64);
        assert!(matches!(
            cpu.run().unwrap_err(),
            EmuError::ModuloByZero { .. }
        ));
    }

    #[test]
    fn fetch_boundary_halts_cleanly_not_a_fault() {
        let mut cpu = cpu_with(vec![22, 0, 1, 0], 7);
        let count = cpu.run().unwrap();
        // loc r0, 1 executes (IP 0, 0+3 < 7), then IP=4: 4+3=7 is not < 7 -> clean halt, no second fetch.
        assert_eq!(count, 1);
        assert_eq!(cpu.state(), CpuState::Halted);
        assert_eq!(cpu.err(), 0);
        assert_eq!(cpu.reg(0), 1);
    }

    #[test]
    fn out_of_range_register_operand_is_a_no_op_and_ip_does_not_advance() {
        // add r20 (invalid), r0, r0 -- r20 is out of 0..=15
        let image = vec![20, 20, 0, 0];
        let mut cpu = cpu_with(image, 8);
        // Stepping a bounded number of times rather than calling run(),
        // which would loop forever per the documented semantics.
        for _ in 0..3 {
            cpu.step().unwrap();
            assert_eq!(cpu.reg(Cpu::IP), 0);
        }
    }

    #[test]
    fn mov_round_trip_is_idempotent() {
        let image = vec![
            22, 0, 11, 0, // loc r0, 11
            9, 1, 0, 0, // mov r1, r0
            9, 0, 1, 0, // mov r0, r1
            0, 0, 0, 0,
        ];
        let mut cpu = cpu_with(image, 32);
        cpu.run().unwrap();
        assert_eq!(cpu.reg(0), 11);
        assert_eq!(cpu.reg(1), 11);
    }

    #[test]
    fn setl_then_setf_returns_to_unprotected_mode() {
        let image = vec![
            11, 0, 0, 0, // setl
            12, 0, 0, 0, // setf
            0, 0, 0, 0,
        ];
        let mut cpu = cpu_with(image, 16);
        cpu.run().unwrap();
        let (_, _, prot) = cpu.protection_window();
        assert!(!prot);
    }
}
