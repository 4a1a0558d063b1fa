use super::super::alu_utils::shifts;
use super::super::common::ShiftTy;
use super::super::translate::{BlockAddr, ExWidth, MiscAddr, MiscOff, MiscOp, Wb, WbAddr, WbOff, WbOp};
use super::super::Interpreter;
use super::Ctrl;
use crate::cpu::bus::Bus;

// ARMv6K reservation granule: 8 bytes.
const GRANULE_MASK: u32 = !7;

/// Resolves a word/byte addressing mode, performing base writeback. Handlers
/// only run once their condition has passed, so writeback needs no extra
/// gating here.
fn wb_address(cpu: &mut Interpreter, addr: WbAddr, size: u32) -> u32 {
    let rn_val = cpu.read_reg_wa(addr.rn, size);
    let offset = match addr.off {
        WbOff::Imm(imm) => imm as u32,
        WbOff::Reg { rm, ty, imm } => {
            let value = cpu.read_reg_wa(rm, size);
            match ty {
                ShiftTy::Lsl => shifts::lsl_imm(value, imm),
                ShiftTy::Lsr => shifts::lsr_imm(value, imm),
                ShiftTy::Asr => shifts::asr_imm(value, imm),
                ShiftTy::Ror => shifts::ror_imm(value, imm, cpu.regs.cpsr().carry()),
            }
        }
    };
    let offset = if addr.up { offset } else { offset.wrapping_neg() };
    match addr.wb {
        Wb::Offset => rn_val.wrapping_add(offset),
        Wb::Pre => {
            let address = rn_val.wrapping_add(offset);
            cpu.regs.cur[addr.rn as usize] = address;
            address
        }
        Wb::Post | Wb::PostUser => {
            cpu.regs.cur[addr.rn as usize] = rn_val.wrapping_add(offset);
            rn_val
        }
    }
}

fn misc_address(cpu: &mut Interpreter, addr: MiscAddr, size: u32) -> u32 {
    let rn_val = cpu.read_reg_wa(addr.rn, size);
    let offset = match addr.off {
        MiscOff::Imm(imm) => imm as u32,
        MiscOff::Reg { rm } => cpu.read_reg_wa(rm, size),
    };
    let offset = if addr.up { offset } else { offset.wrapping_neg() };
    match addr.wb {
        Wb::Offset => rn_val.wrapping_add(offset),
        Wb::Pre => {
            let address = rn_val.wrapping_add(offset);
            cpu.regs.cur[addr.rn as usize] = address;
            address
        }
        Wb::Post | Wb::PostUser => {
            cpu.regs.cur[addr.rn as usize] = rn_val.wrapping_add(offset);
            rn_val
        }
    }
}

/// Loads a word into a register; a PC load exchanges to the state selected
/// by bit 0.
fn load_to_reg(cpu: &mut Interpreter, rd: u8, value: u32) -> Ctrl {
    if rd == 15 {
        cpu.regs.cpsr = cpu.regs.cpsr.with_thumb_state(value & 1 != 0);
        cpu.regs.cur[15] = value & !1;
        Ctrl::Jump
    } else {
        cpu.regs.cur[rd as usize] = value;
        Ctrl::Next
    }
}

pub(super) fn mem_wb<B: Bus>(
    cpu: &mut Interpreter,
    bus: &mut B,
    op: WbOp,
    rd: u8,
    addr: WbAddr,
    size: u32,
) -> Ctrl {
    let address = wb_address(cpu, addr, size);
    match op {
        WbOp::Ldr => {
            let value = bus.read_32(address);
            load_to_reg(cpu, rd, value)
        }
        WbOp::Ldrb => {
            let value = bus.read_8(address) as u32;
            load_to_reg(cpu, rd, value)
        }
        WbOp::Str => {
            let value = cpu.read_reg(rd, size);
            bus.write_32(address, value);
            Ctrl::Next
        }
        WbOp::Strb => {
            let value = cpu.read_reg(rd, size);
            bus.write_8(address, value as u8);
            Ctrl::Next
        }
    }
}

pub(super) fn mem_misc<B: Bus>(
    cpu: &mut Interpreter,
    bus: &mut B,
    op: MiscOp,
    rd: u8,
    addr: MiscAddr,
    size: u32,
) -> Ctrl {
    let address = misc_address(cpu, addr, size);
    match op {
        MiscOp::Ldrh => load_to_reg(cpu, rd, bus.read_16(address) as u32),
        MiscOp::Ldrsb => load_to_reg(cpu, rd, bus.read_8(address) as i8 as i32 as u32),
        MiscOp::Ldrsh => load_to_reg(cpu, rd, bus.read_16(address) as i16 as i32 as u32),
        MiscOp::Strh => {
            let value = cpu.read_reg(rd, size);
            bus.write_16(address, value as u16);
            Ctrl::Next
        }
        MiscOp::Ldrd => {
            cpu.regs.cur[rd as usize] = bus.read_32(address);
            cpu.regs.cur[(rd + 1) as usize & 0xF] = bus.read_32(address.wrapping_add(4));
            Ctrl::Next
        }
        MiscOp::Strd => {
            bus.write_32(address, cpu.regs.cur[rd as usize]);
            bus.write_32(
                address.wrapping_add(4),
                cpu.regs.cur[(rd + 1) as usize & 0xF],
            );
            Ctrl::Next
        }
    }
}

pub(super) fn mem_block<B: Bus>(
    cpu: &mut Interpreter,
    bus: &mut B,
    load: bool,
    user: bool,
    list: u16,
    addr: BlockAddr,
    size: u32,
) -> Ctrl {
    let old_base = cpu.read_reg_wa(addr.rn, size);
    let total = u32::from(list.count_ones()) * 4;
    let start = match (addr.up, addr.pre) {
        (true, false) => old_base,
        (true, true) => old_base.wrapping_add(4),
        (false, false) => old_base.wrapping_sub(total).wrapping_add(4),
        (false, true) => old_base.wrapping_sub(total),
    };
    if addr.writeback {
        let new_base = if addr.up {
            old_base.wrapping_add(total)
        } else {
            old_base.wrapping_sub(total)
        };
        cpu.regs.cur[addr.rn as usize] = new_base;
    }
    let mut address = start;
    if load {
        let user_bank = user && list & 0x8000 == 0;
        for i in 0..15 {
            if list & 1 << i != 0 {
                let value = bus.read_32(address);
                if user_bank {
                    cpu.regs.write_user_reg(i, value);
                } else {
                    cpu.regs.cur[i as usize] = value;
                }
                address = address.wrapping_add(4);
            }
        }
        if list & 0x8000 != 0 {
            let value = bus.read_32(address);
            if user {
                // Exception return: CPSR <- SPSR, then the PC loads raw (the
                // restored state selects the alignment at dispatch).
                cpu.restore_cpsr_from_spsr();
                cpu.regs.cur[15] = value;
                return Ctrl::Jump;
            }
            return load_to_reg(cpu, 15, value);
        }
        Ctrl::Next
    } else {
        for i in 0..15 {
            if list & 1 << i != 0 {
                let value = if i == addr.rn {
                    old_base
                } else if user {
                    cpu.regs.read_user_reg(i)
                } else {
                    cpu.regs.cur[i as usize]
                };
                bus.write_32(address, value);
                address = address.wrapping_add(4);
            }
        }
        if list & 0x8000 != 0 {
            bus.write_32(address, cpu.regs.cur[15].wrapping_add(2 * size));
        }
        Ctrl::Next
    }
}

pub(super) fn swp<B: Bus>(
    cpu: &mut Interpreter,
    bus: &mut B,
    byte: bool,
    rd: u8,
    rm: u8,
    rn: u8,
) -> Ctrl {
    let address = cpu.regs.cur[rn as usize];
    if byte {
        let value = bus.read_8(address) as u32;
        bus.write_8(address, cpu.regs.cur[rm as usize] as u8);
        cpu.regs.cur[rd as usize] = value;
    } else {
        let value = bus.read_32(address);
        bus.write_32(address, cpu.regs.cur[rm as usize]);
        cpu.regs.cur[rd as usize] = value;
    }
    Ctrl::Next
}

pub(super) fn ldrex<B: Bus>(
    cpu: &mut Interpreter,
    bus: &mut B,
    width: ExWidth,
    rd: u8,
    rn: u8,
) -> Ctrl {
    let address = cpu.regs.cur[rn as usize];
    cpu.exclusive_addr = Some(address & GRANULE_MASK);
    match width {
        ExWidth::Word => {
            let value = bus.read_32(address);
            load_to_reg(cpu, rd, value)
        }
        ExWidth::Byte => load_to_reg(cpu, rd, bus.read_8(address) as u32),
        ExWidth::Half => load_to_reg(cpu, rd, bus.read_16(address) as u32),
        ExWidth::Double => {
            cpu.regs.cur[rd as usize] = bus.read_32(address);
            cpu.regs.cur[(rd + 1) as usize & 0xF] = bus.read_32(address.wrapping_add(4));
            Ctrl::Next
        }
    }
}

pub(super) fn strex<B: Bus>(
    cpu: &mut Interpreter,
    bus: &mut B,
    width: ExWidth,
    rd: u8,
    rm: u8,
    rn: u8,
) -> Ctrl {
    let address = cpu.regs.cur[rn as usize];
    // Any store-exclusive attempt clears the monitor, matching or not.
    let matched = cpu.exclusive_addr == Some(address & GRANULE_MASK);
    cpu.exclusive_addr = None;
    if matched {
        match width {
            ExWidth::Word => bus.write_32(address, cpu.regs.cur[rm as usize]),
            ExWidth::Byte => bus.write_8(address, cpu.regs.cur[rm as usize] as u8),
            ExWidth::Half => bus.write_16(address, cpu.regs.cur[rm as usize] as u16),
            ExWidth::Double => {
                let lo = cpu.regs.cur[rm as usize];
                let hi = cpu.regs.cur[(rm + 1) as usize & 0xF];
                let value = if cpu.regs.cpsr().big_endian() {
                    (lo as u64) << 32 | hi as u64
                } else {
                    (hi as u64) << 32 | lo as u64
                };
                bus.write_64(address, value);
            }
        }
        cpu.regs.cur[rd as usize] = 0;
    } else {
        cpu.regs.cur[rd as usize] = 1;
    }
    Ctrl::Next
}
