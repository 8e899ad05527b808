//! Define/data mode state machine.
//!
//! A file is either in define mode (dimensions, variables and attributes may
//! change) or in data mode (values may be read and written). All schema
//! changes go through [`transaction`], which is the only place the mode is
//! toggled.

use tracing::debug;

use crate::backend::StorageBackend;
use crate::error::{NcError, NcResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineState {
    Define,
    Data,
}

/// File-owned mode tracker.
///
/// Nested transactions share the outermost one's define phase; only the
/// outermost exit returns the file to data mode.
#[derive(Debug, Clone)]
pub struct ModeMachine {
    state: DefineState,
    depth: usize,
}

impl ModeMachine {
    pub fn new(state: DefineState) -> Self {
        Self { state, depth: 0 }
    }

    pub fn state(&self) -> DefineState {
        self.state
    }

    /// Fail unless the file is in data mode.
    pub fn require_data(&self, operation: &str) -> NcResult<()> {
        match self.state {
            DefineState::Data => Ok(()),
            DefineState::Define => Err(NcError::backend(format!(
                "NC_EINDEFINE: {} requires data mode",
                operation
            ))),
        }
    }

    fn enter(&mut self, backend: &mut dyn StorageBackend) -> NcResult<()> {
        if self.state == DefineState::Data {
            backend.redef()?;
            self.state = DefineState::Define;
            debug!("Entered define mode");
        }
        self.depth += 1;
        Ok(())
    }

    fn exit(&mut self, backend: &mut dyn StorageBackend) -> NcResult<()> {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 && self.state == DefineState::Define {
            // leave the state as Data even if enddef fails; the handle is
            // unusable for definitions either way
            self.state = DefineState::Data;
            backend.enddef()?;
            debug!("Entered data mode");
        }
        Ok(())
    }
}

/// Access to the mode tracker and backend of a file.
pub trait ModeControl {
    fn mode_parts(&mut self) -> (&mut ModeMachine, &mut dyn StorageBackend);
}

/// Run `body` in define mode.
///
/// Enters define mode if the file is in data mode, runs the body and always
/// returns to data mode afterwards, whether the body succeeded or failed.
/// Attribute writes already applied by a failing body are kept. A body error
/// takes precedence over a failure to leave define mode.
pub fn transaction<C, T>(ctx: &mut C, body: impl FnOnce(&mut C) -> NcResult<T>) -> NcResult<T>
where
    C: ModeControl + ?Sized,
{
    {
        let (mode, backend) = ctx.mode_parts();
        mode.enter(backend)?;
    }
    let result = body(ctx);
    let (mode, backend) = ctx.mode_parts();
    let restored = mode.exit(backend);
    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    struct Harness {
        mode: ModeMachine,
        backend: MemoryBackend,
    }

    impl ModeControl for Harness {
        fn mode_parts(&mut self) -> (&mut ModeMachine, &mut dyn StorageBackend) {
            (&mut self.mode, &mut self.backend)
        }
    }

    fn harness() -> Harness {
        let mut backend = MemoryBackend::in_memory();
        backend.enddef().unwrap();
        Harness {
            mode: ModeMachine::new(DefineState::Data),
            backend,
        }
    }

    #[test]
    fn test_transaction_returns_to_data_mode() {
        let mut h = harness();
        transaction(&mut h, |h| {
            assert_eq!(h.mode.state(), DefineState::Define);
            h.backend.def_dim("x", 2).map(|_| ())
        })
        .unwrap();
        assert_eq!(h.mode.state(), DefineState::Data);
        assert!(!h.backend.in_define_mode());
    }

    #[test]
    fn test_failed_body_still_restores_mode() {
        let mut h = harness();
        let result: NcResult<()> = transaction(&mut h, |_| Err(NcError::InvalidSchema("boom".into())));
        assert!(matches!(result, Err(NcError::InvalidSchema(_))));
        assert_eq!(h.mode.state(), DefineState::Data);
        assert!(!h.backend.in_define_mode());
    }

    #[test]
    fn test_nested_transaction_keeps_define_mode() {
        let mut h = harness();
        transaction(&mut h, |h| {
            transaction(h, |_| Ok(()))?;
            assert_eq!(h.mode.state(), DefineState::Define);
            h.backend.def_dim("y", 1).map(|_| ())
        })
        .unwrap();
        assert_eq!(h.mode.state(), DefineState::Data);
    }

    #[test]
    fn test_starting_in_define_mode_skips_redef() {
        let mut h = Harness {
            mode: ModeMachine::new(DefineState::Define),
            backend: MemoryBackend::in_memory(),
        };
        transaction(&mut h, |_| Ok(())).unwrap();
        assert_eq!(h.mode.state(), DefineState::Data);
        assert!(h.mode.require_data("put").is_ok());
    }
}
