//! DAG-addressed memory access. Word addresses are converted to host byte
//! addresses here: `<< 1` for data memory, `<< 2` for program memory.

use super::super::status::MSTAT_REVERSE;
use super::super::Adsp21xx;
use crate::isa::{DagRef, MemSpace};
use crate::memory::DspMemory;

/// Effective address of a DAG access, then post-modify I by M.
/// DAG1 addresses are bit-reversed when MSTAT enables it.
pub(crate) fn dag_address(cpu: &mut Adsp21xx, dag: DagRef) -> u16 {
    let n = dag.index_reg();
    let index = cpu.state.dag[n].i;
    let addr = if !dag.dag2 && cpu.state.mstat & MSTAT_REVERSE != 0 {
        cpu.tables().reverse(index)
    } else {
        index
    };
    modify(cpu, dag);
    addr
}

/// MODIFY (I, M) without a memory access.
pub(crate) fn modify(cpu: &mut Adsp21xx, dag: DagRef) {
    let m = cpu.state.dag[dag.modify_reg()].m;
    cpu.state.dag[dag.index_reg()].post_modify(m);
}

#[inline]
pub(crate) fn data_byte_addr(addr: u16) -> u32 {
    ((addr & 0x3fff) as u32) << 1
}

#[inline]
pub(crate) fn program_byte_addr(addr: u16) -> u32 {
    ((addr & 0x3fff) as u32) << 2
}

/// Read a 16-bit value. Program-memory reads return the upper 16 bits of
/// the 24-bit word and latch the low 8 bits into PX.
pub(crate) fn read(
    cpu: &mut Adsp21xx,
    mem: &mut dyn DspMemory,
    space: MemSpace,
    dag: DagRef,
) -> u16 {
    let addr = dag_address(cpu, dag);
    match space {
        MemSpace::Data => mem.read_data(data_byte_addr(addr)),
        MemSpace::Program => {
            let word = mem.read_program(program_byte_addr(addr));
            cpu.state.px = (word & 0xff) as u16;
            (word >> 8) as u16
        }
    }
}

/// Write a 16-bit value. Program-memory writes take the low 8 bits from PX.
pub(crate) fn write(
    cpu: &mut Adsp21xx,
    mem: &mut dyn DspMemory,
    space: MemSpace,
    dag: DagRef,
    value: u16,
) {
    let addr = dag_address(cpu, dag);
    match space {
        MemSpace::Data => mem.write_data(data_byte_addr(addr), value),
        MemSpace::Program => {
            let word = ((value as u32) << 8) | (cpu.state.px & 0xff) as u32;
            mem.write_program(program_byte_addr(addr), word);
        }
    }
}
