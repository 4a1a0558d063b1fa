use super::super::Interpreter;
use super::Ctrl;

pub(super) fn branch(cpu: &mut Interpreter, link: bool, offset: i32, size: u32) -> Ctrl {
    let pc = cpu.regs.cur[15];
    if link {
        cpu.regs.cur[14] = pc.wrapping_add(size);
    }
    cpu.regs.cur[15] = pc.wrapping_add(2 * size).wrapping_add(offset as u32);
    Ctrl::Jump
}

/// BLX (immediate): always links, always exchanges to Thumb.
pub(super) fn blx_imm(cpu: &mut Interpreter, offset: i32, size: u32) -> Ctrl {
    let pc = cpu.regs.cur[15];
    cpu.regs.cur[14] = pc.wrapping_add(size);
    cpu.regs.cpsr = cpu.regs.cpsr.with_thumb_state(true);
    cpu.regs.cur[15] = pc.wrapping_add(2 * size).wrapping_add(offset as u32);
    Ctrl::Jump
}

pub(super) fn branch_exchange(cpu: &mut Interpreter, link: bool, rm: u8, size: u32) -> Ctrl {
    let address = cpu.read_reg(rm, size);
    if link {
        let mut lr = cpu.regs.cur[15].wrapping_add(size);
        if cpu.regs.cpsr().thumb_state() {
            lr |= 1;
        }
        cpu.regs.cur[14] = lr;
    }
    cpu.regs.cpsr = cpu.regs.cpsr.with_thumb_state(address & 1 != 0);
    cpu.regs.cur[15] = address & !1;
    Ctrl::Jump
}

pub(super) fn thumb_b(cpu: &mut Interpreter, offset: i32) -> Ctrl {
    cpu.regs.cur[15] = cpu.regs.cur[15].wrapping_add(4).wrapping_add(offset as u32);
    Ctrl::Jump
}

/// First half of a Thumb BL/BLX pair: stages the upper offset bits in LR.
pub(super) fn thumb_bl_setup(cpu: &mut Interpreter, offset: i32) -> Ctrl {
    cpu.regs.cur[14] = cpu.regs.cur[15].wrapping_add(4).wrapping_add(offset as u32);
    Ctrl::Next
}

/// Second half of Thumb BL: branches through LR and leaves the return
/// address with bit 0 set.
pub(super) fn thumb_bl(cpu: &mut Interpreter, offset: i32) -> Ctrl {
    let ret = cpu.regs.cur[15].wrapping_add(2) | 1;
    cpu.regs.cur[15] = cpu.regs.cur[14].wrapping_add(offset as u32);
    cpu.regs.cur[14] = ret;
    Ctrl::Jump
}

/// Second half of Thumb BLX: as BL, but the target is word-aligned and the
/// core exchanges to ARM state.
pub(super) fn thumb_blx(cpu: &mut Interpreter, offset: i32) -> Ctrl {
    let ret = cpu.regs.cur[15].wrapping_add(2) | 1;
    cpu.regs.cur[15] = cpu.regs.cur[14].wrapping_add(offset as u32) & !3;
    cpu.regs.cur[14] = ret;
    cpu.regs.cpsr = cpu.regs.cpsr.with_thumb_state(false);
    Ctrl::Jump
}
