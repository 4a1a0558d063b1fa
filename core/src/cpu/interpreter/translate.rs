pub(super) mod arm;
pub(super) mod thumb;

use super::common::ShiftTy;
use super::Interpreter;
use crate::cpu::bus::{Bus, VfpOp};
use bitflags::bitflags;

bitflags! {
    /// Control-flow classification of a translated record.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(super) struct Flow: u8 {
        const NON_BRANCH = 1 << 0;
        const DIRECT_BRANCH = 1 << 1;
        const INDIRECT_BRANCH = 1 << 2;
        const CALL = 1 << 3;
        const END_OF_PAGE = 1 << 4;
        const EXCEPTION = 1 << 5;
        const CONDITIONAL = 1 << 6;
    }
}

impl Flow {
    #[inline]
    pub fn is_block_end(self) -> bool {
        self.intersects(
            Flow::DIRECT_BRANCH | Flow::INDIRECT_BRANCH | Flow::END_OF_PAGE | Flow::EXCEPTION,
        )
    }
}

/// One pre-translated instruction. `size` is the guest encoding size (2 for
/// re-encoded Thumb, 4 for ARM); `cond` holds bits 28-31 of the (possibly
/// synthesized) ARM word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Record {
    pub cond: u8,
    pub size: u8,
    pub flow: Flow,
    pub op: Op,
}

impl Record {
    pub(super) fn new(cond: u8, mut flow: Flow, op: Op) -> Self {
        if cond < 0xE {
            flow |= Flow::CONDITIONAL;
        }
        Record {
            cond,
            size: 4,
            flow,
            op,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum DpOp {
    And,
    Eor,
    Sub,
    Rsb,
    Add,
    Adc,
    Sbc,
    Rsc,
    Tst,
    Teq,
    Cmp,
    Cmn,
    Orr,
    Mov,
    Bic,
    Mvn,
}

impl DpOp {
    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0xF {
            0x0 => DpOp::And,
            0x1 => DpOp::Eor,
            0x2 => DpOp::Sub,
            0x3 => DpOp::Rsb,
            0x4 => DpOp::Add,
            0x5 => DpOp::Adc,
            0x6 => DpOp::Sbc,
            0x7 => DpOp::Rsc,
            0x8 => DpOp::Tst,
            0x9 => DpOp::Teq,
            0xA => DpOp::Cmp,
            0xB => DpOp::Cmn,
            0xC => DpOp::Orr,
            0xD => DpOp::Mov,
            0xE => DpOp::Bic,
            _ => DpOp::Mvn,
        }
    }

    /// TST/TEQ/CMP/CMN: flags only, no destination write.
    #[inline]
    pub fn is_test(self) -> bool {
        matches!(self, DpOp::Tst | DpOp::Teq | DpOp::Cmp | DpOp::Cmn)
    }
}

/// The second operand of a data-processing instruction; evaluation produces
/// the shifter carry-out as a side effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Operand {
    Imm { value: u8, rotate: u8 },
    Reg { rm: u8 },
    ShiftImm { ty: ShiftTy, rm: u8, imm: u8 },
    ShiftReg { ty: ShiftTy, rm: u8, rs: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum WbOp {
    Ldr,
    Str,
    Ldrb,
    Strb,
}

/// Writeback discipline for the word/byte addressing modes. `PostUser` is
/// the translation form (LDRT/STRT/LDRBT/STRBT): post-indexed with a
/// user-privilege access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Wb {
    Offset,
    Pre,
    Post,
    PostUser,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum WbOff {
    Imm(u16),
    Reg { rm: u8, ty: ShiftTy, imm: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct WbAddr {
    pub rn: u8,
    pub up: bool,
    pub wb: Wb,
    pub off: WbOff,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum MiscOp {
    Ldrh,
    Strh,
    Ldrsb,
    Ldrsh,
    Ldrd,
    Strd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum MiscOff {
    Imm(u8),
    Reg { rm: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct MiscAddr {
    pub rn: u8,
    pub up: bool,
    pub wb: Wb,
    pub off: MiscOff,
}

/// LDM/STM addressing: increment/decrement, before/after, writeback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct BlockAddr {
    pub rn: u8,
    pub up: bool,
    pub pre: bool,
    pub writeback: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ExWidth {
    Word,
    Byte,
    Half,
    Double,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ParPrefix {
    S,
    Q,
    Sh,
    U,
    Uq,
    Uh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum LaneOp {
    Add16,
    Asx,
    Sax,
    Sub16,
    Add8,
    Sub8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ExtWidth {
    Byte,
    Byte16,
    Half,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum RevTy {
    Word,
    HalfPacked,
    SignedHalf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Hint {
    Nop,
    Yield,
    Wfe,
    Wfi,
    Sev,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum CpStubKind {
    Cdp,
    Ldc,
    Stc,
    Mcrr,
    Mrrc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum MsrSrc {
    Imm(u32),
    Reg(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Op {
    Dp {
        op: DpOp,
        set_flags: bool,
        rn: u8,
        rd: u8,
        operand: Operand,
    },
    Mul {
        acc: bool,
        set_flags: bool,
        rd: u8,
        ra: u8,
        rm: u8,
        rs: u8,
    },
    MulLong {
        signed: bool,
        acc: bool,
        set_flags: bool,
        rd_hi: u8,
        rd_lo: u8,
        rm: u8,
        rs: u8,
    },
    Umaal {
        rd_hi: u8,
        rd_lo: u8,
        rm: u8,
        rs: u8,
    },
    SmulXY {
        x: bool,
        y: bool,
        acc: bool,
        rd: u8,
        ra: u8,
        rm: u8,
        rs: u8,
    },
    SmulWy {
        y: bool,
        acc: bool,
        rd: u8,
        ra: u8,
        rm: u8,
        rs: u8,
    },
    SmlalXY {
        x: bool,
        y: bool,
        rd_hi: u8,
        rd_lo: u8,
        rm: u8,
        rs: u8,
    },
    SmDual {
        sub: bool,
        cross: bool,
        acc: bool,
        rd: u8,
        ra: u8,
        rm: u8,
        rs: u8,
    },
    SmDualLong {
        sub: bool,
        cross: bool,
        rd_hi: u8,
        rd_lo: u8,
        rm: u8,
        rs: u8,
    },
    SmMost {
        sub: bool,
        round: bool,
        acc: bool,
        rd: u8,
        ra: u8,
        rm: u8,
        rs: u8,
    },
    QArith {
        sub: bool,
        doubled: bool,
        rd: u8,
        rm: u8,
        rn: u8,
    },
    Parallel {
        prefix: ParPrefix,
        op: LaneOp,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    Extend {
        unsigned: bool,
        width: ExtWidth,
        rotate: u8,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    Sat {
        unsigned: bool,
        sat_imm: u8,
        asr: bool,
        shift_imm: u8,
        rd: u8,
        rm: u8,
    },
    Sat16 {
        unsigned: bool,
        sat_imm: u8,
        rd: u8,
        rm: u8,
    },
    Rev {
        ty: RevTy,
        rd: u8,
        rm: u8,
    },
    Clz {
        rd: u8,
        rm: u8,
    },
    Sel {
        rd: u8,
        rn: u8,
        rm: u8,
    },
    Pkh {
        tb: bool,
        shift_imm: u8,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    Usad8 {
        rd: u8,
        ra: u8,
        rm: u8,
        rs: u8,
    },
    Mrs {
        spsr: bool,
        rd: u8,
    },
    Msr {
        spsr: bool,
        byte_mask: u32,
        src: MsrSrc,
    },
    Branch {
        link: bool,
        offset: i32,
    },
    BlxImm {
        offset: i32,
    },
    BranchExchange {
        link: bool,
        rm: u8,
    },
    MemWb {
        op: WbOp,
        rd: u8,
        addr: WbAddr,
    },
    MemMisc {
        op: MiscOp,
        rd: u8,
        addr: MiscAddr,
    },
    MemBlock {
        load: bool,
        user: bool,
        list: u16,
        addr: BlockAddr,
    },
    Ldrex {
        width: ExWidth,
        rd: u8,
        rn: u8,
    },
    Strex {
        width: ExWidth,
        rd: u8,
        rm: u8,
        rn: u8,
    },
    Clrex,
    Swp {
        byte: bool,
        rd: u8,
        rm: u8,
        rn: u8,
    },
    Swi {
        imm: u32,
    },
    Bkpt {
        imm: u16,
    },
    Cps {
        imod: u8,
        aif: u8,
        change_mode: bool,
        mode: u8,
    },
    Setend {
        big_endian: bool,
    },
    Hint {
        hint: Hint,
    },
    Pld,
    Cp15Reg {
        load: bool,
        rd: u8,
        op1: u8,
        crn: u8,
        crm: u8,
        op2: u8,
    },
    CpStub {
        kind: CpStubKind,
        raw: u32,
    },
    Vfp {
        kind: VfpOp,
        raw: u32,
    },
    Undefined {
        raw: u32,
    },
    DecodeFailure {
        raw: u32,
    },
    ThumbB {
        offset: i32,
    },
    ThumbBCond {
        offset: i32,
    },
    ThumbBlSetup {
        offset: i32,
    },
    ThumbBl {
        offset: i32,
    },
    ThumbBlx {
        offset: i32,
    },
}

/// Append-only storage for translated records. Offsets are stable handles;
/// nothing is ever freed during a run.
pub(super) struct Arena {
    records: Vec<Record>,
}

impl Arena {
    const CAPACITY: usize = 1 << 22;

    pub fn new() -> Self {
        Arena {
            records: Vec::with_capacity(0x1000),
        }
    }

    pub fn alloc(&mut self, record: Record) -> u32 {
        assert!(
            self.records.len() < Self::CAPACITY,
            "translation arena exhausted"
        );
        let offset = self.records.len() as u32;
        self.records.push(record);
        offset
    }

    #[inline]
    pub fn get(&self, offset: u32) -> Record {
        self.records[offset as usize]
    }

    pub fn next_offset(&self) -> u32 {
        self.records.len() as u32
    }

    fn last_mut(&mut self) -> Option<&mut Record> {
        self.records.last_mut()
    }
}

pub(super) struct FetchExc;

impl Interpreter {
    /// Translates the basic block starting at `pc` and caches its arena
    /// offset. The block ends at the first branch-class or exception record,
    /// or when the next fetch would cross a 4 KiB page boundary.
    pub(super) fn translate_block<B: Bus>(
        &mut self,
        bus: &mut B,
        pc: u32,
        thumb: bool,
    ) -> Result<u32, FetchExc> {
        let start = self.arena.next_offset();
        let mut addr = pc;
        loop {
            let Some(word) = bus.fetch_32(addr & !3) else {
                if self.arena.next_offset() == start {
                    return Err(FetchExc);
                }
                // Terminate the block before the faulting fetch; re-entry at
                // this address will surface the exception to the run loop.
                if let Some(last) = self.arena.last_mut() {
                    last.flow.remove(Flow::NON_BRANCH);
                    last.flow.insert(Flow::END_OF_PAGE);
                }
                break;
            };
            let mut record = if thumb {
                let half = if addr & 2 != 0 {
                    (word >> 16) as u16
                } else {
                    word as u16
                };
                match thumb::reencode(half) {
                    thumb::Reencoded::Arm(arm_word) => arm::translate(arm_word, &self.logger),
                    thumb::Reencoded::Branch(record) => record,
                    thumb::Reencoded::Undefined => {
                        slog::error!(
                            self.logger,
                            "Undefined Thumb instruction {:#06X} at {:#010X}",
                            half,
                            addr
                        );
                        Record::new(0xE, Flow::EXCEPTION, Op::Undefined { raw: half as u32 })
                    }
                }
            } else {
                arm::translate(word, &self.logger)
            };
            record.size = if thumb { 2 } else { 4 };
            addr = addr.wrapping_add(record.size as u32);
            if addr & 0xFFF == 0 && !record.flow.is_block_end() {
                record.flow.remove(Flow::NON_BRANCH);
                record.flow.insert(Flow::END_OF_PAGE);
            }
            let flow = record.flow;
            self.arena.alloc(record);
            if flow.is_block_end() {
                break;
            }
        }
        self.blocks.insert(pc | thumb as u32, start);
        Ok(start)
    }
}
