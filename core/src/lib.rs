#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::struct_excessive_bools,
    clippy::too_many_lines,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::verbose_bit_mask,
    clippy::wildcard_imports,
    clippy::must_use_candidate,
    clippy::match_same_arms,
    clippy::too_many_arguments,
    clippy::unreadable_literal,
    clippy::if_not_else,
    clippy::similar_names
)]

pub mod cpu;

pub use cpu::{
    bus::{Bus, VfpDisp, VfpOp},
    interpreter::{Interpreter, Regs},
    psr::{Cpsr, Mode, Spsr},
};
