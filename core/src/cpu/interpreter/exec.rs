mod branch;
mod data;
mod media;
mod mem;
mod other;

use super::translate::{Op, Record};
use super::Interpreter;
use crate::cpu::psr::Cpsr;
use crate::cpu::bus::Bus;

/// What the dispatch loop does after a handler returns: fall through to the
/// next record, re-enter dispatch (the PC was rewritten), or end the run.
pub(super) enum Ctrl {
    Next,
    Jump,
    Exit,
}

impl Interpreter {
    /// Reads a register as an operand; R15 reads as PC + 2 * instruction
    /// size (the architectural pipeline offset).
    #[inline]
    pub(super) fn read_reg(&self, reg: u8, size: u32) -> u32 {
        if reg == 15 {
            self.regs.cur[15].wrapping_add(2 * size)
        } else {
            self.regs.cur[reg as usize]
        }
    }

    /// Like `read_reg`, but an R15 read is word-aligned; used by the
    /// addressing modes so that re-encoded Thumb PC-relative loads see the
    /// aligned base the ISA specifies.
    #[inline]
    pub(super) fn read_reg_wa(&self, reg: u8, size: u32) -> u32 {
        if reg == 15 {
            self.regs.cur[15].wrapping_add(2 * size) & !3
        } else {
            self.regs.cur[reg as usize]
        }
    }

    /// Writes a destination register; a PC write re-enters dispatch.
    #[inline]
    pub(super) fn write_reg(&mut self, reg: u8, value: u32) -> Ctrl {
        self.regs.cur[reg as usize] = value;
        if reg == 15 {
            Ctrl::Jump
        } else {
            Ctrl::Next
        }
    }

    /// CPSR <- SPSR on exception return, swapping register banks. Outside an
    /// exception mode there is no SPSR and the CPSR is left alone.
    pub(super) fn restore_cpsr_from_spsr(&mut self) {
        if !self.regs.is_in_exc_mode() {
            slog::warn!(
                self.logger,
                "Unpredictable SPSR restore in non-exception mode, ignoring"
            );
            return;
        }
        match Cpsr::try_from_spsr(self.regs.spsr) {
            Some(cpsr) => self.regs.set_cpsr(cpsr),
            None => {
                slog::warn!(
                    self.logger,
                    "Invalid mode in SPSR ({:#010X}) on exception return, CPSR unchanged",
                    self.regs.spsr.raw()
                );
            }
        }
    }
}

pub(super) fn execute<B: Bus>(cpu: &mut Interpreter, bus: &mut B, rec: &Record) -> Ctrl {
    let size = rec.size as u32;
    match rec.op {
        Op::Dp {
            op,
            set_flags,
            rn,
            rd,
            operand,
        } => data::dp(cpu, op, set_flags, rn, rd, operand, size),
        Op::Mul {
            acc,
            set_flags,
            rd,
            ra,
            rm,
            rs,
        } => data::mul(cpu, acc, set_flags, rd, ra, rm, rs),
        Op::MulLong {
            signed,
            acc,
            set_flags,
            rd_hi,
            rd_lo,
            rm,
            rs,
        } => data::mul_long(cpu, signed, acc, set_flags, rd_hi, rd_lo, rm, rs),
        Op::Umaal {
            rd_hi,
            rd_lo,
            rm,
            rs,
        } => data::umaal(cpu, rd_hi, rd_lo, rm, rs),
        Op::SmulXY {
            x,
            y,
            acc,
            rd,
            ra,
            rm,
            rs,
        } => data::smul_xy(cpu, x, y, acc, rd, ra, rm, rs),
        Op::SmulWy {
            y,
            acc,
            rd,
            ra,
            rm,
            rs,
        } => data::smul_wy(cpu, y, acc, rd, ra, rm, rs),
        Op::SmlalXY {
            x,
            y,
            rd_hi,
            rd_lo,
            rm,
            rs,
        } => data::smlal_xy(cpu, x, y, rd_hi, rd_lo, rm, rs),
        Op::SmDual {
            sub,
            cross,
            acc,
            rd,
            ra,
            rm,
            rs,
        } => media::sm_dual(cpu, sub, cross, acc, rd, ra, rm, rs),
        Op::SmDualLong {
            sub,
            cross,
            rd_hi,
            rd_lo,
            rm,
            rs,
        } => media::sm_dual_long(cpu, sub, cross, rd_hi, rd_lo, rm, rs),
        Op::SmMost {
            sub,
            round,
            acc,
            rd,
            ra,
            rm,
            rs,
        } => media::sm_most(cpu, sub, round, acc, rd, ra, rm, rs),
        Op::QArith {
            sub,
            doubled,
            rd,
            rm,
            rn,
        } => data::qarith(cpu, sub, doubled, rd, rm, rn),
        Op::Parallel {
            prefix,
            op,
            rd,
            rn,
            rm,
        } => media::parallel(cpu, prefix, op, rd, rn, rm),
        Op::Extend {
            unsigned,
            width,
            rotate,
            rd,
            rn,
            rm,
        } => media::extend(cpu, unsigned, width, rotate, rd, rn, rm),
        Op::Sat {
            unsigned,
            sat_imm,
            asr,
            shift_imm,
            rd,
            rm,
        } => media::sat(cpu, unsigned, sat_imm, asr, shift_imm, rd, rm),
        Op::Sat16 {
            unsigned,
            sat_imm,
            rd,
            rm,
        } => media::sat16(cpu, unsigned, sat_imm, rd, rm),
        Op::Rev { ty, rd, rm } => media::rev(cpu, ty, rd, rm),
        Op::Clz { rd, rm } => data::clz(cpu, rd, rm),
        Op::Sel { rd, rn, rm } => media::sel(cpu, rd, rn, rm),
        Op::Pkh {
            tb,
            shift_imm,
            rd,
            rn,
            rm,
        } => media::pkh(cpu, tb, shift_imm, rd, rn, rm),
        Op::Usad8 { rd, ra, rm, rs } => media::usad8(cpu, rd, ra, rm, rs),
        Op::Mrs { spsr, rd } => other::mrs(cpu, spsr, rd),
        Op::Msr {
            spsr,
            byte_mask,
            src,
        } => other::msr(cpu, spsr, byte_mask, src, size),
        Op::Branch { link, offset } => branch::branch(cpu, link, offset, size),
        Op::BlxImm { offset } => branch::blx_imm(cpu, offset, size),
        Op::BranchExchange { link, rm } => branch::branch_exchange(cpu, link, rm, size),
        Op::MemWb { op, rd, addr } => mem::mem_wb(cpu, bus, op, rd, addr, size),
        Op::MemMisc { op, rd, addr } => mem::mem_misc(cpu, bus, op, rd, addr, size),
        Op::MemBlock {
            load,
            user,
            list,
            addr,
        } => mem::mem_block(cpu, bus, load, user, list, addr, size),
        Op::Ldrex { width, rd, rn } => mem::ldrex(cpu, bus, width, rd, rn),
        Op::Strex { width, rd, rm, rn } => mem::strex(cpu, bus, width, rd, rm, rn),
        Op::Clrex => {
            cpu.exclusive_addr = None;
            Ctrl::Next
        }
        Op::Swp { byte, rd, rm, rn } => mem::swp(cpu, bus, byte, rd, rm, rn),
        Op::Swi { imm } => other::swi(cpu, bus, imm),
        Op::Bkpt { imm } => other::bkpt(cpu, imm),
        Op::Cps {
            imod,
            aif,
            change_mode,
            mode,
        } => other::cps(cpu, imod, aif, change_mode, mode),
        Op::Setend { big_endian } => other::setend(cpu, big_endian),
        Op::Hint { hint } => other::hint(cpu, hint),
        Op::Pld => Ctrl::Next,
        Op::Cp15Reg {
            load,
            rd,
            op1,
            crn,
            crm,
            op2,
        } => other::cp15_reg(cpu, bus, load, rd, op1, crn, crm, op2),
        Op::CpStub { kind, raw } => other::cp_stub(cpu, kind, raw),
        Op::Vfp { kind, raw } => other::vfp(cpu, bus, kind, raw),
        Op::Undefined { raw } => other::undefined(cpu, raw),
        Op::DecodeFailure { .. } => Ctrl::Exit,
        Op::ThumbB { offset } => branch::thumb_b(cpu, offset),
        Op::ThumbBCond { offset } => branch::thumb_b(cpu, offset),
        Op::ThumbBlSetup { offset } => branch::thumb_bl_setup(cpu, offset),
        Op::ThumbBl { offset } => branch::thumb_bl(cpu, offset),
        Op::ThumbBlx { offset } => branch::thumb_blx(cpu, offset),
    }
}
