//! Interrupt controller, chip variants and host hook traits.

use log::{debug, warn};

use super::Adsp21xx;

/// Chip variant, chosen at construction. It fixes the interrupt priority
/// order, vectors, reset PC and which group-3 registers exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChipVariant {
    /// IRQ3 > IRQ2 > IRQ1 > IRQ0, vectors 0..=3.
    #[default]
    Adsp2100,
    /// IRQ2 > IRQ1 > IRQ0 > timer; serial ports, IFC and OWRCNTR registers.
    Adsp2105,
}

impl ChipVariant {
    /// Parse a variant name. Unknown names fall back to the ADSP-2100.
    pub fn from_name(name: &str) -> Self {
        let norm: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match norm.trim_start_matches("adsp") {
            "2100" | "2100a" => ChipVariant::Adsp2100,
            "2105" | "2101" | "2115" => ChipVariant::Adsp2105,
            _ => {
                warn!("unknown chip variant {name:?}, falling back to ADSP-2100");
                ChipVariant::Adsp2100
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChipVariant::Adsp2100 => "ADSP-2100",
            ChipVariant::Adsp2105 => "ADSP-2105",
        }
    }

    pub fn reset_pc(self) -> u16 {
        match self {
            ChipVariant::Adsp2100 => 0x0004,
            ChipVariant::Adsp2105 => 0x0000,
        }
    }

    /// Writable IMASK bits.
    pub fn imask_bits(self) -> u16 {
        match self {
            ChipVariant::Adsp2100 => 0x0f,
            ChipVariant::Adsp2105 => 0x3f,
        }
    }

    /// Writable MSTAT bits.
    pub fn mstat_bits(self) -> u16 {
        match self {
            ChipVariant::Adsp2100 => 0x0f,
            ChipVariant::Adsp2105 => 0x1f,
        }
    }

    /// Serial ports, IFC and OWRCNTR.
    pub fn has_peripherals(self) -> bool {
        matches!(self, ChipVariant::Adsp2105)
    }

    /// Interrupt sources, highest priority first.
    pub fn sources(self) -> &'static [IrqSource] {
        match self {
            ChipVariant::Adsp2100 => &ADSP2100_SOURCES,
            ChipVariant::Adsp2105 => &ADSP2105_SOURCES,
        }
    }

    /// Source attached to an external line, if any.
    pub fn source_for_line(self, line: usize) -> Option<&'static IrqSource> {
        self.sources().iter().find(|src| src.line == line)
    }
}

/// One interrupt source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqSource {
    /// Host-visible line number (0..=3).
    pub line: usize,
    /// Enable bit in IMASK.
    pub imask_bit: u16,
    /// ICNTL bit selecting edge-sensitive mode; `None` means always latched.
    pub edge_bit: Option<u16>,
    /// Default vector address.
    pub vector: u16,
}

const fn source(line: usize, imask_bit: u16, edge_bit: Option<u16>, vector: u16) -> IrqSource {
    IrqSource { line, imask_bit, edge_bit, vector }
}

static ADSP2100_SOURCES: [IrqSource; 4] = [
    source(3, 0x08, Some(0x08), 0x0003),
    source(2, 0x04, Some(0x04), 0x0002),
    source(1, 0x02, Some(0x02), 0x0001),
    source(0, 0x01, Some(0x01), 0x0000),
];

static ADSP2105_SOURCES: [IrqSource; 4] = [
    source(2, 0x20, Some(0x04), 0x0004),
    source(1, 0x04, Some(0x02), 0x0010),
    source(0, 0x02, Some(0x01), 0x0014),
    source(3, 0x01, None, 0x0018),
];

/// ICNTL bit enabling interrupt nesting.
pub const ICNTL_NESTING: u16 = 0x10;

/// Level of an external interrupt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLineState {
    Clear,
    Asserted,
}

/// Host strategy for interrupt acknowledge.
///
/// Called when the core takes an interrupt on `line`; returning `Some`
/// overrides the vector address.
pub trait IrqCallback {
    fn acknowledge(&mut self, line: usize) -> Option<u16>;
}

impl<F> IrqCallback for F
where
    F: FnMut(usize) -> Option<u16>,
{
    fn acknowledge(&mut self, line: usize) -> Option<u16> {
        self(line)
    }
}

/// Serial port hooks for the RX0/TX0/RX1/TX1 registers.
pub trait SerialPort {
    /// Read of RX0 (`port` 0) or RX1 (`port` 1).
    fn receive(&mut self, port: usize) -> u16;
    /// Write of TX0 or TX1.
    fn transmit(&mut self, port: usize, value: u16);
}

impl Adsp21xx {
    /// Drive an external interrupt line.
    ///
    /// A rising edge sets the latch when the line is edge-sensitive; the
    /// level is always recorded. Arbitration runs afterwards.
    pub fn set_irq_line(&mut self, line: usize, state: IrqLineState) {
        if line >= self.state.irq_state.len() {
            warn!("ignoring IRQ line {line}");
            return;
        }
        let asserted = state == IrqLineState::Asserted;
        if asserted && !self.state.irq_state[line] {
            if let Some(src) = self.variant.source_for_line(line) {
                let edge = src.edge_bit.is_none_or(|bit| self.state.icntl & bit != 0);
                if edge {
                    self.state.irq_latch[line] = true;
                }
            }
        }
        self.state.irq_state[line] = asserted;
        self.check_irqs();
    }

    /// Arbitration pass: take the highest-priority active, unmasked source.
    /// At most one interrupt is taken per pass.
    pub(crate) fn check_irqs(&mut self) {
        for src in self.variant.sources() {
            let active = match src.edge_bit {
                Some(bit) if self.state.icntl & bit == 0 => self.state.irq_state[src.line],
                _ => self.state.irq_latch[src.line],
            };
            if active && self.state.imask & src.imask_bit != 0 {
                self.take_interrupt(src);
                return;
            }
        }
    }

    fn take_interrupt(&mut self, src: &IrqSource) {
        self.state.irq_latch[src.line] = false;
        self.state.push_pc();
        self.state.push_status();

        let vector = self
            .irq_callback
            .as_mut()
            .and_then(|cb| cb.acknowledge(src.line))
            .unwrap_or(src.vector);
        debug!(
            "IRQ{} taken at PC 0x{:04x}, vector 0x{:04x}",
            src.line, self.state.pc, vector
        );
        self.state.pc = vector & 0x3fff;
        self.state.idle = false;

        if self.state.icntl & ICNTL_NESTING != 0 {
            self.state.imask &= !((src.imask_bit << 1) - 1);
        } else {
            self.state.imask &= !self.variant.imask_bits();
        }
        self.state.interrupt_cycles += 1;
    }

    /// Write IFC: the low byte clears latches, the high byte forces them.
    pub(crate) fn write_ifc(&mut self, value: u16) {
        for src in self.variant.sources() {
            if value & src.imask_bit != 0 {
                self.state.irq_latch[src.line] = false;
            }
            if (value >> 8) & src.imask_bit != 0 {
                self.state.irq_latch[src.line] = true;
            }
        }
        self.check_irqs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_from_name() {
        assert_eq!(ChipVariant::from_name("ADSP-2105"), ChipVariant::Adsp2105);
        assert_eq!(ChipVariant::from_name("adsp2100"), ChipVariant::Adsp2100);
        assert_eq!(ChipVariant::from_name("2105"), ChipVariant::Adsp2105);
        assert_eq!(ChipVariant::from_name("z80"), ChipVariant::Adsp2100);
    }

    #[test]
    fn test_priority_tables_are_descending() {
        for variant in [ChipVariant::Adsp2100, ChipVariant::Adsp2105] {
            let bits: Vec<u16> = variant.sources().iter().map(|s| s.imask_bit).collect();
            assert!(bits.windows(2).all(|w| w[0] > w[1]), "{variant:?}");
            for src in variant.sources() {
                assert_eq!(src.imask_bit & !variant.imask_bits(), 0);
            }
        }
    }

    #[test]
    fn test_closure_as_callback() {
        let mut cb = |line: usize| if line == 1 { Some(0x100) } else { None };
        assert_eq!(IrqCallback::acknowledge(&mut cb, 1), Some(0x100));
        assert_eq!(IrqCallback::acknowledge(&mut cb, 0), None);
    }
}
