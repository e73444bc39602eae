//! The sticky exception-flag register.
//!
//! Arithmetic operations report the exceptional conditions they encounter
//! as a set of flags. By default a fired flag is unioned into a
//! thread-local sticky register, where it stays until explicitly cleared,
//! so a whole block of computation can be audited afterwards. A context
//! may instead *trap* a flag kind, turning that condition into an error.

use core::cell::RefCell;
use core::fmt::{self, Display};

use bitflags::bitflags;
use tracing::{debug, trace};

use crate::error::EvalError;

bitflags! {
    /// The exception-flag kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(
        feature = "serde",
        derive(serde::Serialize, serde::Deserialize),
        serde(transparent)
    )]
    pub struct Flags: u8 {
        /// The rounded result differs from the exact result.
        const INEXACT = 1;
        /// The rounded exponent exceeded the maximum exponent.
        const OVERFLOW = 1 << 1;
        /// An inexact result fell strictly below the smallest normal value.
        const UNDERFLOW = 1 << 2;
        /// A finite nonzero value was divided by zero.
        const DIVISION_BY_ZERO = 1 << 3;
        /// The operation has no meaningful result (0/0, inf-inf, 0*inf,
        /// sqrt of a negative number).
        const INVALID_OPERATION = 1 << 4;
    }
}

impl Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(none)");
        }
        let mut sep = "";
        for (name, _) in self.iter_names() {
            write!(f, "{}{}", sep, name)?;
            sep = "|";
        }
        Ok(())
    }
}

/// The sticky flag state owned by one logical thread of control. Flags
/// only accumulate; no arithmetic operation ever clears one.
#[derive(Debug, Default)]
pub struct FlagRegister {
    flags: Flags,
}

impl FlagRegister {
    pub const fn new() -> Self {
        FlagRegister {
            flags: Flags::empty(),
        }
    }

    /// Returns the currently set flags.
    pub fn get(&self) -> Flags {
        self.flags
    }

    /// Replaces the register wholesale. Passing `Flags::empty()` clears
    /// it; passing a previously saved snapshot restores it.
    pub fn set(&mut self, flags: Flags) {
        self.flags = flags;
    }

    /// Union `kinds` into the register.
    pub fn raise(&mut self, kinds: Flags) {
        self.flags |= kinds;
    }

    /// Remove `kinds` from the register.
    pub fn clear(&mut self, kinds: Flags) {
        self.flags &= !kinds;
    }

    /// Returns true if every flag in `kinds` is set.
    pub fn test(&self, kinds: Flags) -> bool {
        self.flags.contains(kinds)
    }

    /// Folds the flags fired by one operation into the register. If any
    /// fired kind is in `traps`, the whole result is discarded: nothing is
    /// recorded and the most severe trapped kind is returned as an error.
    pub fn record_operation(
        &mut self,
        fired: Flags,
        traps: Flags,
    ) -> Result<(), EvalError> {
        let trapped = fired & traps;
        if !trapped.is_empty() {
            debug!(fired = %fired, trapped = %trapped, "trapped exception");
            return Err(trap_error(trapped));
        }
        self.flags |= fired;
        Ok(())
    }
}

/// Maps the most severe kind in `trapped` to its error. Severity order:
/// invalid operation, division by zero, overflow, underflow, inexact.
fn trap_error(trapped: Flags) -> EvalError {
    if trapped.contains(Flags::INVALID_OPERATION) {
        EvalError::InvalidOperation
    } else if trapped.contains(Flags::DIVISION_BY_ZERO) {
        EvalError::DivisionByZero
    } else if trapped.contains(Flags::OVERFLOW) {
        EvalError::Overflow
    } else if trapped.contains(Flags::UNDERFLOW) {
        EvalError::Underflow
    } else {
        EvalError::Inexact
    }
}

thread_local! {
    static REGISTER: RefCell<FlagRegister> =
        const { RefCell::new(FlagRegister::new()) };
}

/// Returns the flags set in this thread's sticky register.
pub fn get_flags() -> Flags {
    REGISTER.with(|r| r.borrow().get())
}

/// Replaces this thread's sticky register wholesale.
pub fn set_flags(flags: Flags) {
    trace!(flags = %flags, "set flag register");
    REGISTER.with(|r| r.borrow_mut().set(flags));
}

/// Union `kinds` into this thread's sticky register.
pub fn raise_flag(kinds: Flags) {
    REGISTER.with(|r| r.borrow_mut().raise(kinds));
}

/// Remove `kinds` from this thread's sticky register.
pub fn clear_flag(kinds: Flags) {
    trace!(kinds = %kinds, "clear flags");
    REGISTER.with(|r| r.borrow_mut().clear(kinds));
}

/// Returns true if every flag in `kinds` is set in this thread's register.
pub fn test_flag(kinds: Flags) -> bool {
    REGISTER.with(|r| r.borrow().test(kinds))
}

/// Trap-or-record against this thread's register. See
/// [`FlagRegister::record_operation`].
pub(crate) fn record_operation(
    fired: Flags,
    traps: Flags,
) -> Result<(), EvalError> {
    REGISTER.with(|r| r.borrow_mut().record_operation(fired, traps))
}

#[test]
fn test_register_stickiness() {
    let mut reg = FlagRegister::new();
    reg.record_operation(Flags::INEXACT, Flags::empty()).unwrap();
    reg.record_operation(Flags::empty(), Flags::empty()).unwrap();
    assert_eq!(reg.get(), Flags::INEXACT);
    reg.record_operation(Flags::OVERFLOW | Flags::INEXACT, Flags::empty())
        .unwrap();
    assert_eq!(reg.get(), Flags::INEXACT | Flags::OVERFLOW);
}

#[test]
fn test_register_set_and_clear() {
    let mut reg = FlagRegister::new();
    reg.raise(Flags::UNDERFLOW | Flags::INEXACT);
    assert!(reg.test(Flags::UNDERFLOW));
    assert!(!reg.test(Flags::UNDERFLOW | Flags::OVERFLOW));
    reg.clear(Flags::UNDERFLOW);
    assert_eq!(reg.get(), Flags::INEXACT);
    reg.set(Flags::empty());
    assert_eq!(reg.get(), Flags::empty());
}

#[test]
fn test_trap_replaces_recording() {
    let mut reg = FlagRegister::new();
    // Overflow always comes with inexact; trapping overflow must leave the
    // register untouched, inexact included.
    let err = reg
        .record_operation(Flags::OVERFLOW | Flags::INEXACT, Flags::OVERFLOW)
        .unwrap_err();
    assert_eq!(err, EvalError::Overflow);
    assert_eq!(reg.get(), Flags::empty());
}

#[test]
fn test_trap_severity_order() {
    let fired = Flags::INVALID_OPERATION | Flags::INEXACT;
    let mut reg = FlagRegister::new();
    let err = reg.record_operation(fired, Flags::all()).unwrap_err();
    assert_eq!(err, EvalError::InvalidOperation);
    let mut reg = FlagRegister::new();
    let err = reg
        .record_operation(
            Flags::UNDERFLOW | Flags::INEXACT,
            Flags::UNDERFLOW | Flags::INEXACT,
        )
        .unwrap_err();
    assert_eq!(err, EvalError::Underflow);
}

#[test]
fn test_flags_display() {
    assert_eq!(format!("{}", Flags::empty()), "(none)");
    assert_eq!(format!("{}", Flags::INEXACT), "INEXACT");
    assert_eq!(
        format!("{}", Flags::INEXACT | Flags::OVERFLOW),
        "INEXACT|OVERFLOW"
    );
}
