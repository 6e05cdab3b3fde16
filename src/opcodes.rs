use crate::cpu::{Cpu, RegIndex};
use crate::error::EmuError;

/// The four-cell instruction set's opcode numbers, kept as associated
/// consts the way the instruction set of the original design enumerates
/// them.
pub struct OpCodes;
impl OpCodes {
    pub const HALT: i32 = 0;

    pub const LODI: i32 = 5;
    pub const LODR: i32 = 6;
    pub const STRI: i32 = 7;
    pub const STRR: i32 = 8;
    pub const MOV: i32 = 9;
    pub const AMIN: i32 = 10;
    pub const SETL: i32 = 11;
    pub const SETF: i32 = 12;

    pub const ADD: i32 = 20;
    pub const ADDC: i32 = 21;
    pub const LOC: i32 = 22;
    pub const SUB: i32 = 23;
    pub const MULT: i32 = 24;
    pub const DIV: i32 = 25;
    pub const MOD: i32 = 26;

    pub const CMP: i32 = 30;
    pub const JMP: i32 = 31;
    pub const GOTOP: i32 = 32;
    pub const LCMP: i32 = 33;

    pub const LOGOR: i32 = 40;
    pub const LOGAND: i32 = 41;
    pub const LOGNOT: i32 = 42;

    pub const PRTS: i32 = 50;
    pub const PRCS: i32 = 51;
    pub const PRTG: i32 = 52;
    pub const PRCG: i32 = 53;
}

/// A register operand must name one of the sixteen registers; anything
/// else is `None` and the caller treats the whole instruction as a no-op.
fn reg_index(raw: i32) -> Option<RegIndex> {
    if (0..=15).contains(&raw) {
        Some(raw as RegIndex)
    } else {
        None
    }
}

/// Decode one four-cell instruction and dispatch it to its handler.
/// Every arm either advances the instruction pointer (the common case),
/// leaves it untouched (an out-of-range register operand, or a taken
/// jump that set it directly), or halts the machine.
pub fn execute(cpu: &mut Cpu, op: i32, a: i32, b: i32, c: i32) -> Result<(), EmuError> {
    match op {
        OpCodes::HALT => {
            cpu.halt();
            Ok(())
        }
        OpCodes::LODI => mem::lodi(cpu, a, b),
        OpCodes::LODR => mem::lodr(cpu, a, b),
        OpCodes::STRI => mem::stri(cpu, a, b),
        OpCodes::STRR => mem::strr(cpu, a, b),
        OpCodes::MOV => mem::mov(cpu, a, b),
        OpCodes::AMIN => mem::amin(cpu, a, b),
        OpCodes::SETL => {
            cpu.set_prot(true);
            cpu.advance_ip();
            Ok(())
        }
        OpCodes::SETF => {
            cpu.set_prot(false);
            cpu.advance_ip();
            Ok(())
        }

        OpCodes::ADD => alu::add(cpu, a, b, c),
        OpCodes::ADDC => alu::addc(cpu, a, b, c),
        OpCodes::LOC => alu::loc(cpu, a, b),
        OpCodes::SUB => alu::sub(cpu, a, b, c),
        OpCodes::MULT => alu::mult(cpu, a, b, c),
        OpCodes::DIV => alu::div(cpu, a, b, c),
        OpCodes::MOD => alu::modulo(cpu, a, b, c),

        OpCodes::CMP => branch::cmp(cpu, a, b),
        OpCodes::JMP => branch::jmp(cpu, a, b),
        OpCodes::GOTOP => branch::gotop(cpu, a),
        OpCodes::LCMP => branch::lcmp(cpu, a),

        OpCodes::LOGOR => logic::logor(cpu, a, b, c),
        OpCodes::LOGAND => logic::logand(cpu, a, b, c),
        OpCodes::LOGNOT => logic::lognot(cpu, a, b),

        OpCodes::PRTS => port::prts(cpu, a, b),
        OpCodes::PRCS => port::prcs(cpu, a, b),
        OpCodes::PRTG => port::prtg(cpu, a, b),
        OpCodes::PRCG => port::prcg(cpu, a, b),

        _ => {
            cpu.set_err(5);
            cpu.halt();
            Ok(())
        }
    }
}

/// Memory-moving instructions: `lodi/lodr/stri/strr/mov/amin`.
mod mem {
    use super::reg_index;
    use crate::cpu::Cpu;
    use crate::error::EmuError;

    pub fn lodi(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let Some(dst) = reg_index(a) else { return Ok(()) };
        if let Some(v) = cpu.checked_load(b as i64)? {
            cpu.set_reg(dst, v);
        }
        cpu.advance_ip();
        Ok(())
    }

    pub fn lodr(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(addr_reg)) = (reg_index(a), reg_index(b)) else {
            return Ok(());
        };
        let addr = cpu.reg(addr_reg) as i64;
        if let Some(v) = cpu.checked_load(addr)? {
            cpu.set_reg(dst, v);
        }
        cpu.advance_ip();
        Ok(())
    }

    pub fn stri(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let Some(src) = reg_index(b) else { return Ok(()) };
        let value = cpu.reg(src);
        cpu.checked_store(a as i64, value)?;
        cpu.advance_ip();
        Ok(())
    }

    pub fn strr(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let (Some(addr_reg), Some(src)) = (reg_index(a), reg_index(b)) else {
            return Ok(());
        };
        let addr = cpu.reg(addr_reg) as i64;
        let value = cpu.reg(src);
        cpu.checked_store(addr, value)?;
        cpu.advance_ip();
        Ok(())
    }

    pub fn mov(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(src)) = (reg_index(a), reg_index(b)) else {
            return Ok(());
        };
        cpu.set_reg(dst, cpu.reg(src));
        cpu.advance_ip();
        Ok(())
    }

    pub fn amin(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let (Some(lo_reg), Some(hi_reg)) = (reg_index(a), reg_index(b)) else {
            return Ok(());
        };
        cpu.set_window(cpu.reg(lo_reg), cpu.reg(hi_reg));
        cpu.advance_ip();
        Ok(())
    }
}

/// Arithmetic instructions: `add/addc/loc/sub/mult/div/mod`.
mod alu {
    use super::reg_index;
    use crate::cpu::Cpu;
    use crate::error::EmuError;

    pub fn add(cpu: &mut Cpu, a: i32, b: i32, c: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(lhs), Some(rhs)) = (reg_index(a), reg_index(b), reg_index(c)) else {
            return Ok(());
        };
        cpu.set_reg(dst, cpu.reg(lhs).wrapping_add(cpu.reg(rhs)));
        cpu.advance_ip();
        Ok(())
    }

    pub fn addc(cpu: &mut Cpu, a: i32, b: i32, c: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(lhs)) = (reg_index(a), reg_index(b)) else {
            return Ok(());
        };
        cpu.set_reg(dst, cpu.reg(lhs).wrapping_add(c));
        cpu.advance_ip();
        Ok(())
    }

    pub fn loc(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let Some(dst) = reg_index(a) else { return Ok(()) };
        cpu.set_reg(dst, b);
        cpu.advance_ip();
        Ok(())
    }

    pub fn sub(cpu: &mut Cpu, a: i32, b: i32, c: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(lhs), Some(rhs)) = (reg_index(a), reg_index(b), reg_index(c)) else {
            return Ok(());
        };
        cpu.set_reg(dst, cpu.reg(lhs).wrapping_sub(cpu.reg(rhs)));
        cpu.advance_ip();
        Ok(())
    }

    pub fn mult(cpu: &mut Cpu, a: i32, b: i32, c: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(lhs), Some(rhs)) = (reg_index(a), reg_index(b), reg_index(c)) else {
            return Ok(());
        };
        cpu.set_reg(dst, cpu.reg(lhs).wrapping_mul(cpu.reg(rhs)));
        cpu.advance_ip();
        Ok(())
    }

    pub fn div(cpu: &mut Cpu, a: i32, b: i32, c: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(lhs), Some(rhs)) = (reg_index(a), reg_index(b), reg_index(c)) else {
            return Ok(());
        };
        let divisor = cpu.reg(rhs);
        if divisor == 0 {
            return Err(EmuError::DivisionByZero { ip: cpu.ip() });
        }
        cpu.set_reg(dst, cpu.reg(lhs).wrapping_div(divisor));
        cpu.advance_ip();
        Ok(())
    }

    pub fn modulo(cpu: &mut Cpu, a: i32, b: i32, c: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(lhs), Some(rhs)) = (reg_index(a), reg_index(b), reg_index(c)) else {
            return Ok(());
        };
        let divisor = cpu.reg(rhs);
        if divisor == 0 {
            return Err(EmuError::ModuloByZero { ip: cpu.ip() });
        }
        cpu.set_reg(dst, cpu.reg(lhs).wrapping_rem(divisor));
        cpu.advance_ip();
        Ok(())
    }
}

/// Comparison and control-flow instructions: `cmp/jmp/gotop/lcmp`.
mod branch {
    use super::reg_index;
    use crate::cpu::Cpu;
    use crate::error::EmuError;

    pub fn cmp(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let (Some(lhs), Some(rhs)) = (reg_index(a), reg_index(b)) else {
            return Ok(());
        };
        let diff = (cpu.reg(lhs) as i64) - (cpu.reg(rhs) as i64);
        cpu.set_cmp(diff.signum() as i32);
        cpu.advance_ip();
        Ok(())
    }

    pub fn jmp(cpu: &mut Cpu, cond: i32, target: i32) -> Result<(), EmuError> {
        let flag = cpu.cmp();
        let taken = match cond {
            -1 | 0 | 1 => flag == cond,
            2 => flag == 0 || flag == 1,
            -2 => flag == 0 || flag == -1,
            3 => flag != 0,
            _ => false,
        };
        if taken {
            cpu.set_ip(target);
        } else {
            cpu.advance_ip();
        }
        Ok(())
    }

    pub fn gotop(cpu: &mut Cpu, target: i32) -> Result<(), EmuError> {
        cpu.set_ip(target);
        Ok(())
    }

    pub fn lcmp(cpu: &mut Cpu, a: i32) -> Result<(), EmuError> {
        let Some(dst) = reg_index(a) else { return Ok(()) };
        cpu.set_reg(dst, cpu.cmp());
        cpu.advance_ip();
        Ok(())
    }
}

/// Boolean instructions: `logor/logand/lognot`.
mod logic {
    use super::reg_index;
    use crate::cpu::Cpu;
    use crate::error::EmuError;

    pub fn logor(cpu: &mut Cpu, a: i32, b: i32, c: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(lhs), Some(rhs)) = (reg_index(a), reg_index(b), reg_index(c)) else {
            return Ok(());
        };
        let result = (cpu.reg(lhs) != 0 || cpu.reg(rhs) != 0) as i32;
        cpu.set_reg(dst, result);
        cpu.advance_ip();
        Ok(())
    }

    pub fn logand(cpu: &mut Cpu, a: i32, b: i32, c: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(lhs), Some(rhs)) = (reg_index(a), reg_index(b), reg_index(c)) else {
            return Ok(());
        };
        let result = (cpu.reg(lhs) != 0 && cpu.reg(rhs) != 0) as i32;
        cpu.set_reg(dst, result);
        cpu.advance_ip();
        Ok(())
    }

    pub fn lognot(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let (Some(dst), Some(src)) = (reg_index(a), reg_index(b)) else {
            return Ok(());
        };
        let result = (cpu.reg(src) == 0) as i32;
        cpu.set_reg(dst, result);
        cpu.advance_ip();
        Ok(())
    }
}

/// Port I/O instructions: `prts/prcs/prtg/prcg`.
mod port {
    use super::reg_index;
    use crate::cpu::Cpu;
    use crate::error::EmuError;

    pub fn prts(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let Some(src) = reg_index(a) else { return Ok(()) };
        let value = cpu.reg(src);
        if let Some(p) = cpu.port_mut(b) {
            p.send_value(value)?;
        }
        cpu.advance_ip();
        Ok(())
    }

    pub fn prcs(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        if let Some(p) = cpu.port_mut(b) {
            p.send_signal(a);
        }
        cpu.advance_ip();
        Ok(())
    }

    pub fn prtg(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let Some(dst) = reg_index(a) else { return Ok(()) };
        if let Some(p) = cpu.port_mut(b) {
            let value = p.recv_value()?;
            cpu.set_reg(dst, value);
        }
        cpu.advance_ip();
        Ok(())
    }

    pub fn prcg(cpu: &mut Cpu, a: i32, b: i32) -> Result<(), EmuError> {
        let Some(dst) = reg_index(a) else { return Ok(()) };
        if let Some(p) = cpu.port_mut(b) {
            let value = p.recv_signal();
            cpu.set_reg(dst, value);
        }
        cpu.advance_ip();
        Ok(())
    }
}
