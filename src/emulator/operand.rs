//! Operand addressing for the `copy` and `jump` control primitives.
//!
//! A single operand token is one of:
//!
//! | prefix | form | meaning                                         |
//! |--------|------|-------------------------------------------------|
//! | `@`    | `@v` | immediate: the value is literally `v`           |
//! | `*`    | `*N` | indirect: `RAM[N]` supplies the effective token |
//! | none   | `N`  | direct: the effective address is `N`            |
//!
//! Indirection through a cell that does not hold a valid integer is
//! emulator-fatal.

use crate::emulator::errors::EmuError;
use crate::emulator::ram::{Addr, Ram};

/// A parsed operand token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// `@v` - a literal value. Valid only as a source.
    Immediate(String),
    /// `N` - an address.
    Direct(Addr),
    /// `*N` - the cell at `N` names the effective address or token.
    Indirect(Addr),
}

impl Operand {
    /// Parses a single operand token.
    pub fn parse(token: &str) -> Result<Operand, EmuError> {
        if let Some(value) = token.strip_prefix('@') {
            return Ok(Operand::Immediate(value.to_string()));
        }
        if let Some(addr) = token.strip_prefix('*') {
            return Ok(Operand::Indirect(Addr::parse(addr)?));
        }
        Ok(Operand::Direct(Addr::parse(token)?))
    }
}

/// Resolves a `copy` source operand to the value to store.
///
/// An indirect source is replaced by the cell it names, which is then
/// interpreted as an operand token itself: either an immediate (`@v`) or a
/// direct address.
pub fn source_value(ram: &Ram, src: &Operand) -> Result<String, EmuError> {
    match src {
        Operand::Immediate(value) => Ok(value.clone()),
        Operand::Direct(addr) => Ok(ram.read(*addr)?.to_string()),
        Operand::Indirect(cell) => {
            let token = ram.read(*cell)?.to_string();
            if let Some(value) = token.strip_prefix('@') {
                return Ok(value.to_string());
            }
            let addr = Addr::parse(&token)?;
            Ok(ram.read(addr)?.to_string())
        }
    }
}

/// Resolves a `copy` destination operand to the address to write.
///
/// An indirect destination must name a cell holding a direct address.
/// Immediates are rejected (the assembler refuses them too; this is the
/// run-time backstop).
pub fn dest_address(ram: &Ram, dst: &Operand) -> Result<Addr, EmuError> {
    match dst {
        Operand::Immediate(_) => Err(EmuError::ImmediateDestination),
        Operand::Direct(addr) => Ok(*addr),
        Operand::Indirect(cell) => Addr::parse(ram.read(*cell)?),
    }
}

/// Resolves a jump operand to the target address.
///
/// For jumps the direct form denotes the target itself: `jump 42` jumps to
/// cell 42; `jump *5` jumps to the address stored in cell 5.
pub fn jump_target(ram: &Ram, target: &Operand) -> Result<Addr, EmuError> {
    match target {
        Operand::Immediate(_) => Err(EmuError::ImmediateDestination),
        Operand::Direct(addr) => Ok(*addr),
        Operand::Indirect(cell) => Addr::parse(ram.read(*cell)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_forms() {
        assert_eq!(
            Operand::parse("@hello").unwrap(),
            Operand::Immediate("hello".to_string())
        );
        assert_eq!(Operand::parse("7").unwrap(), Operand::Direct(Addr(7)));
        assert_eq!(Operand::parse("*7").unwrap(), Operand::Indirect(Addr(7)));
        // An empty immediate is a legal way to write the empty string.
        assert_eq!(
            Operand::parse("@").unwrap(),
            Operand::Immediate(String::new())
        );
    }

    #[test]
    fn parse_rejects_non_numeric_addresses() {
        assert!(matches!(
            Operand::parse("seven"),
            Err(EmuError::NotAnAddress { .. })
        ));
        assert!(matches!(
            Operand::parse("*seven"),
            Err(EmuError::NotAnAddress { .. })
        ));
    }

    #[test]
    fn source_resolution() {
        let mut ram = Ram::new(32);
        ram.write(Addr(20), "payload").unwrap();
        ram.write(Addr(21), "20").unwrap();

        let imm = Operand::parse("@literal").unwrap();
        assert_eq!(source_value(&ram, &imm).unwrap(), "literal");

        let direct = Operand::parse("20").unwrap();
        assert_eq!(source_value(&ram, &direct).unwrap(), "payload");

        let indirect = Operand::parse("*21").unwrap();
        assert_eq!(source_value(&ram, &indirect).unwrap(), "payload");
    }

    #[test]
    fn indirect_source_can_name_an_immediate() {
        let mut ram = Ram::new(32);
        ram.write(Addr(21), "@inline value").unwrap();
        let indirect = Operand::parse("*21").unwrap();
        assert_eq!(source_value(&ram, &indirect).unwrap(), "inline value");
    }

    #[test]
    fn indirect_through_non_integer_is_fatal() {
        let mut ram = Ram::new(32);
        ram.write(Addr(21), "not-a-number").unwrap();
        let indirect = Operand::parse("*21").unwrap();
        assert!(matches!(
            source_value(&ram, &indirect),
            Err(EmuError::NotAnAddress { .. })
        ));
        assert!(matches!(
            dest_address(&ram, &indirect),
            Err(EmuError::NotAnAddress { .. })
        ));
    }

    #[test]
    fn destination_resolution() {
        let mut ram = Ram::new(32);
        ram.write(Addr(21), "25").unwrap();

        let direct = Operand::parse("25").unwrap();
        assert_eq!(dest_address(&ram, &direct).unwrap(), Addr(25));

        let indirect = Operand::parse("*21").unwrap();
        assert_eq!(dest_address(&ram, &indirect).unwrap(), Addr(25));

        let imm = Operand::parse("@25").unwrap();
        assert!(matches!(
            dest_address(&ram, &imm),
            Err(EmuError::ImmediateDestination)
        ));
    }

    #[test]
    fn jump_target_resolution() {
        let mut ram = Ram::new(64);
        ram.write(Addr(5), "42").unwrap();

        let direct = Operand::parse("42").unwrap();
        assert_eq!(jump_target(&ram, &direct).unwrap(), Addr(42));

        let indirect = Operand::parse("*5").unwrap();
        assert_eq!(jump_target(&ram, &indirect).unwrap(), Addr(42));
    }
}
