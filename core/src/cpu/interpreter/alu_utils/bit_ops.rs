use super::super::Regs;

pub fn set_nz(regs: &mut Regs, value: u32) {
    regs.cpsr = regs
        .cpsr
        .with_negative(value >> 31 != 0)
        .with_zero(value == 0);
}

pub fn set_nz_64(regs: &mut Regs, value: u64) {
    regs.cpsr = regs
        .cpsr
        .with_negative(value >> 63 != 0)
        .with_zero(value == 0);
}
