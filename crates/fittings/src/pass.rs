//! Pass module - emit every input unchanged
//!
//! The identity fitting. Useful for wiring tests, measuring substrate
//! overhead, and as a placeholder stage during development.

use plumb_protocol::{Arg, Item};

use crate::{Emit, Fitting, FittingModule, FittingResult, InitCtx};

/// A fitting that emits every input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassFitting;

impl Fitting for PassFitting {
    fn init(&mut self, _ctx: &InitCtx<'_>) -> FittingResult<()> {
        Ok(())
    }

    fn process(&mut self, item: Item, out: &mut dyn Emit) -> FittingResult<()> {
        out.emit(item);
        Ok(())
    }

    fn done(&mut self, _out: &mut dyn Emit) -> FittingResult<()> {
        Ok(())
    }
}

/// Factory for [`PassFitting`]
pub struct PassModule;

impl FittingModule for PassModule {
    fn create(&self, _arg: &Arg) -> FittingResult<Box<dyn Fitting>> {
        Ok(Box::new(PassFitting))
    }

    fn name(&self) -> &'static str {
        "pass"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plumb_protocol::{PartitionId, PipelineOptions};

    #[derive(Default)]
    struct Collected(Vec<Item>);

    impl Emit for Collected {
        fn emit(&mut self, item: Item) {
            self.0.push(item);
        }
    }

    #[test]
    fn test_pass_through() {
        let mut fitting = PassFitting;
        let options = PipelineOptions::default();
        let ctx = InitCtx {
            stage: "t",
            partition: PartitionId::new(0),
            options: &options,
        };
        fitting.init(&ctx).unwrap();

        let mut out = Collected::default();
        for n in [1i64, 2, 3] {
            fitting.process(Item::from(n), &mut out).unwrap();
        }
        fitting.done(&mut out).unwrap();

        assert_eq!(out.0, vec![Item::from(1i64), Item::from(2i64), Item::from(3i64)]);
    }

    #[test]
    fn test_no_archive_exported() {
        let mut fitting = PassFitting;
        assert!(fitting.archive().is_none());
        // Incoming archives are discarded silently
        assert!(!fitting.handoff(plumb_protocol::Archive::Undefined));
    }
}
