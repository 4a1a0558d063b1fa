use super::super::translate::{CpStubKind, Hint, MsrSrc};
use super::super::Interpreter;
use super::Ctrl;
use crate::cpu::bus::{Bus, VfpDisp, VfpOp};
use crate::cpu::psr::{Cpsr, Spsr};

const USER_MASK: u32 = 0xF80F_0200;
const PRIV_MASK: u32 = 0x0000_01DF;
const STATE_MASK: u32 = 0x0100_0020;

pub(super) fn mrs(cpu: &mut Interpreter, spsr: bool, rd: u8) -> Ctrl {
    let value = if spsr {
        if cpu.regs.is_in_exc_mode() {
            cpu.regs.spsr.raw()
        } else {
            slog::warn!(
                cpu.logger,
                "Unpredictable SPSR read in non-exception mode, reading CPSR"
            );
            cpu.regs.cpsr().raw()
        }
    } else {
        cpu.regs.cpsr().raw()
    };
    cpu.write_reg(rd, value)
}

pub(super) fn msr(
    cpu: &mut Interpreter,
    spsr: bool,
    byte_mask: u32,
    src: MsrSrc,
    size: u32,
) -> Ctrl {
    let value = match src {
        MsrSrc::Imm(value) => value,
        MsrSrc::Reg(rm) => cpu.read_reg(rm, size),
    };
    if spsr {
        if cpu.regs.is_in_exc_mode() {
            let mask = byte_mask & (USER_MASK | PRIV_MASK | STATE_MASK);
            cpu.regs.spsr = Spsr::from_raw((cpu.regs.spsr.raw() & !mask) | (value & mask));
        } else {
            slog::warn!(
                cpu.logger,
                "Unpredictable SPSR write in non-exception mode, ignoring"
            );
        }
        return Ctrl::Next;
    }
    let mask = if cpu.regs.is_in_priv_mode() {
        if value & STATE_MASK != 0 {
            slog::warn!(
                cpu.logger,
                "Unpredictable MSR: attempt to set state bits, write ignored"
            );
            0
        } else {
            byte_mask & (USER_MASK | PRIV_MASK)
        }
    } else {
        byte_mask & USER_MASK
    };
    if mask == 0 {
        return Ctrl::Next;
    }
    let new_raw = (cpu.regs.cpsr().raw() & !mask) | (value & mask);
    match Cpsr::try_from_raw(new_raw) {
        Some(cpsr) => cpu.regs.set_cpsr(cpsr),
        None => {
            slog::warn!(
                cpu.logger,
                "MSR to invalid mode ({:#010X}), keeping current mode bits",
                new_raw
            );
            let fixed = (new_raw & !0x1F) | (cpu.regs.cpsr().raw() & 0x1F);
            cpu.regs.set_cpsr(Cpsr::from_raw(fixed));
        }
    }
    Ctrl::Next
}

pub(super) fn swi<B: Bus>(cpu: &mut Interpreter, bus: &mut B, imm: u32) -> Ctrl {
    let pc = cpu.regs.cur[15];
    bus.call_svc(imm, &mut cpu.regs);
    // The dispatcher may redirect control; otherwise fall through in-block.
    if cpu.regs.cur[15] == pc {
        Ctrl::Next
    } else {
        Ctrl::Jump
    }
}

pub(super) fn bkpt(cpu: &mut Interpreter, imm: u16) -> Ctrl {
    slog::debug!(cpu.logger, "Breakpoint instruction hit. Immediate: {:#06X}", imm);
    Ctrl::Next
}

pub(super) fn cps(
    cpu: &mut Interpreter,
    imod: u8,
    aif: u8,
    change_mode: bool,
    mode: u8,
) -> Ctrl {
    if !cpu.regs.is_in_priv_mode() {
        return Ctrl::Next;
    }
    let mut raw = cpu.regs.cpsr().raw();
    if imod == 0b10 {
        raw &= !((aif as u32) << 6);
    } else if imod == 0b11 {
        raw |= (aif as u32) << 6;
    }
    if change_mode {
        raw = (raw & !0x1F) | mode as u32;
    }
    match Cpsr::try_from_raw(raw) {
        Some(cpsr) => cpu.regs.set_cpsr(cpsr),
        None => {
            slog::warn!(cpu.logger, "CPS to invalid mode {:#04X} ignored", mode);
        }
    }
    Ctrl::Next
}

pub(super) fn setend(cpu: &mut Interpreter, big_endian: bool) -> Ctrl {
    cpu.regs.cpsr = cpu.regs.cpsr.with_big_endian(big_endian);
    slog::warn!(
        cpu.logger,
        "SETEND {} executed",
        if big_endian { "BE" } else { "LE" }
    );
    Ctrl::Next
}

pub(super) fn hint(cpu: &mut Interpreter, hint: Hint) -> Ctrl {
    match hint {
        Hint::Nop => {}
        Hint::Yield => slog::trace!(cpu.logger, "YIELD executed"),
        Hint::Wfe => slog::trace!(cpu.logger, "WFE executed"),
        Hint::Wfi => slog::trace!(cpu.logger, "WFI executed"),
        Hint::Sev => slog::trace!(cpu.logger, "SEV executed"),
    }
    Ctrl::Next
}

pub(super) fn cp15_reg<B: Bus>(
    cpu: &mut Interpreter,
    bus: &mut B,
    load: bool,
    rd: u8,
    op1: u8,
    crn: u8,
    crm: u8,
    op2: u8,
) -> Ctrl {
    if load {
        let value = bus.cp15_read(op1, crn, crm, op2);
        if rd == 15 {
            // MRC with Rt = 15 moves the top bits into the flags.
            let raw = (cpu.regs.cpsr().raw() & !0xF000_0000) | (value & 0xF000_0000);
            cpu.regs.cpsr = Cpsr::from_raw(raw);
            Ctrl::Next
        } else {
            cpu.regs.cur[rd as usize] = value;
            Ctrl::Next
        }
    } else {
        bus.cp15_write(cpu.regs.cur[rd as usize], op1, crn, crm, op2);
        Ctrl::Next
    }
}

pub(super) fn cp_stub(cpu: &mut Interpreter, kind: CpStubKind, raw: u32) -> Ctrl {
    match kind {
        CpStubKind::Mcrr | CpStubKind::Mrrc => {
            slog::warn!(
                cpu.logger,
                "Stubbed two-register coprocessor transfer: {:#010X}",
                raw
            );
            Ctrl::Next
        }
        CpStubKind::Cdp | CpStubKind::Ldc | CpStubKind::Stc => undefined(cpu, raw),
    }
}

pub(super) fn vfp<B: Bus>(cpu: &mut Interpreter, bus: &mut B, kind: VfpOp, raw: u32) -> Ctrl {
    match bus.vfp_op(kind, raw, &mut cpu.regs) {
        VfpDisp::Handled => Ctrl::Next,
        VfpDisp::Undefined => undefined(cpu, raw),
    }
}

pub(super) fn undefined(cpu: &mut Interpreter, raw: u32) -> Ctrl {
    slog::warn!(cpu.logger, "Undefined instruction {:#010X}, ending run", raw);
    Ctrl::Exit
}

#[cfg(test)]
mod tests {
    use super::super::super::translate::MsrSrc;
    use super::super::super::Interpreter;
    use crate::cpu::psr::{Cpsr, Mode};
    use slog::Logger;

    fn cpu() -> Interpreter {
        Interpreter::new(Logger::root(slog::Discard, slog::o!()))
    }

    #[test]
    fn user_mode_msr_cannot_touch_privileged_bits() {
        let mut cpu = cpu();
        cpu.regs.set_cpsr(Cpsr::from_raw(0x10));
        super::msr(
            &mut cpu,
            false,
            0xFFFF_FFFF,
            MsrSrc::Imm(0xF000_00DF),
            4,
        );
        // The flag byte takes, the control byte does not.
        assert_eq!(cpu.regs.cpsr().mode(), Mode::User);
        assert!(cpu.regs.cpsr().negative());
        assert!(!cpu.regs.cpsr().irqs_disabled());
    }

    #[test]
    fn user_mode_msr_to_spsr_is_ignored() {
        let mut cpu = cpu();
        cpu.regs.set_cpsr(Cpsr::from_raw(0x10));
        let before = cpu.regs.spsr;
        super::msr(&mut cpu, true, 0xFFFF_FFFF, MsrSrc::Imm(0xFFFF_FFFF), 4);
        assert_eq!(cpu.regs.spsr, before);
    }

    #[test]
    fn privileged_msr_switches_mode_and_banks() {
        let mut cpu = cpu();
        cpu.regs.set_cpsr(Cpsr::from_raw(0x1F));
        cpu.regs.cur[13] = 0x1234;
        super::msr(&mut cpu, false, 0xFFFF_FFFF, MsrSrc::Imm(0x12), 4);
        assert_eq!(cpu.regs.cpsr().mode(), Mode::Irq);
        assert_ne!(cpu.regs.cur[13], 0x1234);
        super::msr(&mut cpu, false, 0xFFFF_FFFF, MsrSrc::Imm(0x1F), 4);
        assert_eq!(cpu.regs.cur[13], 0x1234);
    }

    #[test]
    fn cps_adjusts_interrupt_masks() {
        let mut cpu = cpu();
        cpu.regs.set_cpsr(Cpsr::from_raw(0x1F));
        super::cps(&mut cpu, 0b11, 0b010, false, 0);
        assert!(cpu.regs.cpsr().irqs_disabled());
        super::cps(&mut cpu, 0b10, 0b010, false, 0);
        assert!(!cpu.regs.cpsr().irqs_disabled());
        // User mode: no effect
        cpu.regs.set_cpsr(Cpsr::from_raw(0x10));
        super::cps(&mut cpu, 0b11, 0b111, false, 0);
        assert!(!cpu.regs.cpsr().irqs_disabled());
    }
}
