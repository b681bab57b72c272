//! Sum module - stateful accumulator
//!
//! Accumulates numeric inputs and emits a single total when its inputs
//! end. The running total is exported on archive and adopted on handoff,
//! so a relocated worker picks up exactly where its predecessor stopped.

use plumb_protocol::{Arg, Archive, Item};
use serde_json::Value;

use crate::{Emit, Fitting, FittingError, FittingModule, FittingResult, InitCtx};

/// A fitting that sums numeric inputs and emits the total on done
#[derive(Debug, Default)]
pub struct SumFitting {
    total: i64,
}

impl Fitting for SumFitting {
    fn init(&mut self, ctx: &InitCtx<'_>) -> FittingResult<()> {
        tracing::debug!(stage = ctx.stage, partition = %ctx.partition, "sum ready");
        Ok(())
    }

    fn process(&mut self, item: Item, _out: &mut dyn Emit) -> FittingResult<()> {
        let n = item
            .as_i64()
            .ok_or_else(|| FittingError::failed(format!("non-numeric input: {}", item)))?;
        self.total += n;
        Ok(())
    }

    fn done(&mut self, out: &mut dyn Emit) -> FittingResult<()> {
        out.emit(Item::from(self.total));
        Ok(())
    }

    fn archive(&mut self) -> Option<Archive> {
        Some(Archive::new(self.total))
    }

    fn handoff(&mut self, archive: Archive) -> bool {
        match archive.value().and_then(Value::as_i64) {
            Some(carried) => {
                self.total += carried;
                true
            }
            None => false,
        }
    }
}

/// Factory for [`SumFitting`]
///
/// Accepts an optional numeric argument as the starting total.
pub struct SumModule;

impl FittingModule for SumModule {
    fn create(&self, arg: &Arg) -> FittingResult<Box<dyn Fitting>> {
        let total = match arg {
            Arg::None => 0,
            _ => arg
                .as_value()
                .and_then(Value::as_i64)
                .ok_or_else(|| FittingError::bad_arg("sum takes an optional integer start"))?,
        };
        Ok(Box::new(SumFitting { total }))
    }

    fn name(&self) -> &'static str {
        "sum"
    }

    fn validate_arg(&self, arg: &Arg) -> Result<(), String> {
        match arg {
            Arg::None => Ok(()),
            _ if arg.as_value().and_then(Value::as_i64).is_some() => Ok(()),
            _ => Err("expected an optional integer start".to_string()),
        }
    }
}
